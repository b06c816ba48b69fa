use eframe::egui::{Color32, ColorImage};
use palette::{LinSrgb, Mix, Srgb};
use serde::{Deserialize, Serialize};

use crate::data::model::{PickerImage, SelectionMask};

// ---------------------------------------------------------------------------
// Normalization: data values -> [0, 1]
// ---------------------------------------------------------------------------

/// Stretch applied after the percentile cuts, as in the usual astronomical
/// display normalizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stretch {
    Linear,
    Sqrt,
    Log,
}

impl Stretch {
    pub const ALL: [Stretch; 3] = [Stretch::Linear, Stretch::Sqrt, Stretch::Log];

    pub fn label(&self) -> &'static str {
        match self {
            Stretch::Linear => "linear",
            Stretch::Sqrt => "sqrt",
            Stretch::Log => "log",
        }
    }

    /// Map a clipped fraction in [0, 1] through the stretch curve.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Stretch::Linear => t,
            Stretch::Sqrt => t.sqrt(),
            // a = 1000, the astropy LogStretch default.
            Stretch::Log => (1000.0 * t + 1.0).ln() / 1001.0_f64.ln(),
        }
    }
}

/// Value cuts plus stretch for the picker display.
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub vmin: f64,
    pub vmax: f64,
    pub stretch: Stretch,
}

impl Normalization {
    /// Percentile-based cuts over the finite values of `image`.
    pub fn from_image(image: &PickerImage, percentiles: (f64, f64), stretch: Stretch) -> Self {
        let (vmin, vmax) = percentile_cuts(&image.data, percentiles.0, percentiles.1);
        Normalization {
            vmin,
            vmax,
            stretch,
        }
    }

    /// Normalize one value; `None` for non-finite input.
    pub fn normalize(&self, v: f64) -> Option<f64> {
        if !v.is_finite() {
            return None;
        }
        let range = self.vmax - self.vmin;
        let t = if range > 0.0 {
            (v - self.vmin) / range
        } else {
            0.5
        };
        Some(self.stretch.apply(t))
    }
}

/// Interpolated percentile cuts (`lo`, `hi` in percent) over the finite
/// entries of `data`. An all-non-finite input falls back to (0, 1).
pub fn percentile_cuts(data: &[f64], lo: f64, hi: f64) -> (f64, f64) {
    let mut finite: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (0.0, 1.0);
    }
    finite.sort_unstable_by(f64::total_cmp);
    (percentile_of_sorted(&finite, lo), percentile_of_sorted(&finite, hi))
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let p = p.clamp(0.0, 100.0);
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

// ---------------------------------------------------------------------------
// Colormaps
// ---------------------------------------------------------------------------

/// Continuous colormaps for the picker image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Plain grayscale, the classic continuum-picking map.
    Gray,
    /// Black -> red -> yellow -> white.
    Heat,
    /// Black -> blue -> cyan -> white.
    Cool,
}

impl Colormap {
    pub const ALL: [Colormap; 3] = [Colormap::Gray, Colormap::Heat, Colormap::Cool];

    pub fn label(&self) -> &'static str {
        match self {
            Colormap::Gray => "gray",
            Colormap::Heat => "heat",
            Colormap::Cool => "cool",
        }
    }

    fn stops(&self) -> [LinSrgb; 4] {
        match self {
            Colormap::Gray => [
                LinSrgb::new(0.0, 0.0, 0.0),
                LinSrgb::new(0.15, 0.15, 0.15),
                LinSrgb::new(0.5, 0.5, 0.5),
                LinSrgb::new(1.0, 1.0, 1.0),
            ],
            Colormap::Heat => [
                LinSrgb::new(0.0, 0.0, 0.0),
                LinSrgb::new(0.6, 0.03, 0.0),
                LinSrgb::new(0.9, 0.7, 0.05),
                LinSrgb::new(1.0, 1.0, 1.0),
            ],
            Colormap::Cool => [
                LinSrgb::new(0.0, 0.0, 0.0),
                LinSrgb::new(0.0, 0.1, 0.6),
                LinSrgb::new(0.05, 0.7, 0.9),
                LinSrgb::new(1.0, 1.0, 1.0),
            ],
        }
    }

    /// Sample the map at `t` in [0, 1].
    pub fn sample(&self, t: f64) -> Color32 {
        let stops = self.stops();
        let t = (t.clamp(0.0, 1.0) * (stops.len() - 1) as f64) as f32;
        let seg = (t.floor() as usize).min(stops.len() - 2);
        let frac = t - seg as f32;
        let rgb: Srgb = Srgb::from_linear(stops[seg].mix(stops[seg + 1], frac));
        Color32::from_rgb(
            (rgb.red * 255.0) as u8,
            (rgb.green * 255.0) as u8,
            (rgb.blue * 255.0) as u8,
        )
    }
}

// ---------------------------------------------------------------------------
// Picker rendering
// ---------------------------------------------------------------------------

/// Tint blended over selected spaxels.
const SELECTION_TINT: Color32 = Color32::from_rgb(235, 60, 50);
/// Display colour for spaxels with no finite picker value.
const BAD_PIXEL: Color32 = Color32::from_rgb(25, 25, 30);

/// Rasterize the picker image (plus selection tint) into an `egui` texture
/// image. Row 0 of the output is the *top* row, so data row `ny - 1` comes
/// first: the plot draws with the origin at the lower left, matching the
/// astronomical convention.
pub fn render_picker(
    image: &PickerImage,
    mask: &SelectionMask,
    norm: &Normalization,
    cmap: Colormap,
) -> ColorImage {
    let mut out = ColorImage::new([image.nx, image.ny], Color32::BLACK);
    for row in 0..image.ny {
        let y = image.ny - 1 - row;
        for x in 0..image.nx {
            let base = match norm.normalize(image.at(y, x)) {
                Some(t) => cmap.sample(t),
                None => BAD_PIXEL,
            };
            let color = if mask.contains(y, x) {
                blend(base, SELECTION_TINT, 0.55)
            } else {
                base
            };
            out.pixels[row * image.nx + x] = color;
        }
    }
    out
}

fn blend(a: Color32, b: Color32, t: f32) -> Color32 {
    let lerp = |x: u8, y: u8| (x as f32 * (1.0 - t) + y as f32 * t) as u8;
    Color32::from_rgb(lerp(a.r(), b.r()), lerp(a.g(), b.g()), lerp(a.b(), b.b()))
}
