use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::error::{ExtractError, Result};

// ---------------------------------------------------------------------------
// Datacube
// ---------------------------------------------------------------------------

/// Cube dimensions: `nw` spectral channels over an `ny` x `nx` spatial grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeShape {
    pub nw: usize,
    pub ny: usize,
    pub nx: usize,
}

impl CubeShape {
    pub fn spatial(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn len(&self) -> usize {
        self.nw * self.ny * self.nx
    }
}

impl std::fmt::Display for CubeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.nw, self.ny, self.nx)
    }
}

/// Linear celestial WCS, enough for a sky-coordinate readout on the picker.
#[derive(Debug, Clone, Copy)]
pub struct CelestialWcs {
    pub crval1: f64,
    pub crval2: f64,
    pub crpix1: f64,
    pub crpix2: f64,
    pub cdelt1: f64,
    pub cdelt2: f64,
}

impl CelestialWcs {
    /// Approximate (RA, Dec) in degrees of a zero-based pixel position.
    /// Linear expansion around the reference pixel; display-only.
    pub fn pix_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let dec = self.crval2 + (y + 1.0 - self.crpix2) * self.cdelt2;
        let cos_dec = self.crval2.to_radians().cos().max(1e-9);
        let ra = self.crval1 + (x + 1.0 - self.crpix1) * self.cdelt1 / cos_dec;
        (ra, dec)
    }
}

/// An IFU datacube: flux and standard-error arrays over (spectral, y, x),
/// plus the derived wavelength axis. Read-only once loaded.
///
/// Storage is flat in FITS element order, x fastest:
/// index `(w * ny + y) * nx + x`.
#[derive(Debug, Clone)]
pub struct Datacube {
    flux: Vec<f64>,
    err: Vec<f64>,
    shape: CubeShape,
    wavelength: Vec<f64>,
    pub wave_unit: String,
    pub celestial: Option<CelestialWcs>,
}

impl Datacube {
    pub fn new(
        flux: Vec<f64>,
        err: Vec<f64>,
        shape: CubeShape,
        wavelength: Vec<f64>,
    ) -> Result<Datacube> {
        if flux.len() != shape.len() {
            return Err(ExtractError::shape(
                format!("{} flux values for shape {shape}", shape.len()),
                format!("{}", flux.len()),
            ));
        }
        if err.len() != flux.len() {
            return Err(ExtractError::shape(
                format!("error array of {} values", flux.len()),
                format!("{}", err.len()),
            ));
        }
        if wavelength.len() != shape.nw {
            return Err(ExtractError::shape(
                format!("wavelength axis of {} values", shape.nw),
                format!("{}", wavelength.len()),
            ));
        }
        Ok(Datacube {
            flux,
            err,
            shape,
            wavelength,
            wave_unit: "um".to_string(),
            celestial: None,
        })
    }

    pub fn shape(&self) -> CubeShape {
        self.shape
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    #[inline]
    fn idx(&self, w: usize, y: usize, x: usize) -> usize {
        (w * self.shape.ny + y) * self.shape.nx + x
    }

    #[inline]
    pub fn flux_at(&self, w: usize, y: usize, x: usize) -> f64 {
        self.flux[self.idx(w, y, x)]
    }

    #[inline]
    pub fn err_at(&self, w: usize, y: usize, x: usize) -> f64 {
        self.err[self.idx(w, y, x)]
    }
}

// ---------------------------------------------------------------------------
// Picker image
// ---------------------------------------------------------------------------

/// The 2D image shown on the picker display. Guides selection only; it never
/// feeds the reduction.
#[derive(Debug, Clone)]
pub struct PickerImage {
    pub data: Vec<f64>,
    pub ny: usize,
    pub nx: usize,
}

impl PickerImage {
    pub fn new(data: Vec<f64>, ny: usize, nx: usize) -> Result<PickerImage> {
        if data.len() != ny * nx {
            return Err(ExtractError::shape(
                format!("{} values for a {ny} x {nx} image", ny * nx),
                format!("{}", data.len()),
            ));
        }
        Ok(PickerImage { data, ny, nx })
    }

    #[inline]
    pub fn at(&self, y: usize, x: usize) -> f64 {
        self.data[y * self.nx + x]
    }
}

// ---------------------------------------------------------------------------
// Selection mask
// ---------------------------------------------------------------------------

/// The set of selected spaxels, always a subset of the valid spatial grid.
/// Mutated only by toggling and reset.
#[derive(Debug, Clone)]
pub struct SelectionMask {
    selected: BTreeSet<(usize, usize)>,
    ny: usize,
    nx: usize,
}

impl SelectionMask {
    pub fn new(ny: usize, nx: usize) -> SelectionMask {
        SelectionMask {
            selected: BTreeSet::new(),
            ny,
            nx,
        }
    }

    /// Flip membership of spaxel `(y, x)`. Out-of-grid positions are a no-op.
    /// Returns whether the spaxel is selected afterwards.
    pub fn toggle(&mut self, y: usize, x: usize) -> bool {
        if y >= self.ny || x >= self.nx {
            return false;
        }
        if !self.selected.remove(&(y, x)) {
            self.selected.insert((y, x));
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, y: usize, x: usize) -> bool {
        self.selected.contains(&(y, x))
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected spaxels in deterministic (y, x) order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.selected.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Extracted spectrum
// ---------------------------------------------------------------------------

/// The committed coadded spectrum: one row per spectral channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub wavelength: Vec<f64>,
    pub rest_wavelength: Vec<f64>,
    pub flux: Vec<f64>,
    pub error: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
