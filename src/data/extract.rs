//! Spaxel selection state machine and spectrum coaddition.
//!
//! The selection/commit cycle is a plain state object so the mask and
//! reduction logic can be exercised without any display surface; the UI layer
//! only calls into it and draws the results.

use log::info;

use crate::config::ExtractorConfig;

use super::error::{ExtractError, Result};
use super::model::{Datacube, PickerImage, SelectionMask, Spectrum};
use super::picker;

/// Where the selector is in its extraction cycle. `Committed` is sticky only
/// until the next mask mutation; the session keeps running either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Selecting,
    Committed,
}

/// Owns the loaded cube, the picker image, the live selection mask and the
/// most recently committed spectrum.
pub struct Extractor {
    cube: Datacube,
    picker: PickerImage,
    mask: SelectionMask,
    phase: Phase,
    spectrum: Option<Spectrum>,
    redshift: f64,
}

impl Extractor {
    /// Build a selector over `cube`. `picker_override`, if given, replaces the
    /// default median projection and must match the cube's spatial shape.
    pub fn new(
        cube: Datacube,
        config: &ExtractorConfig,
        picker_override: Option<Vec<f64>>,
    ) -> Result<Extractor> {
        let picker = match picker_override {
            Some(data) => picker::supplied_image(&cube, data)?,
            None => picker::median_image(&cube),
        };
        let (ny, nx) = cube.shape().spatial();
        Ok(Extractor {
            cube,
            picker,
            mask: SelectionMask::new(ny, nx),
            phase: Phase::Selecting,
            spectrum: None,
            redshift: config.redshift,
        })
    }

    pub fn cube(&self) -> &Datacube {
        &self.cube
    }

    pub fn picker_image(&self) -> &PickerImage {
        &self.picker
    }

    pub fn mask(&self) -> &SelectionMask {
        &self.mask
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    pub fn set_redshift(&mut self, redshift: f64) {
        self.redshift = redshift.max(0.0);
    }

    /// Toggle the spaxel at integer grid position `(y, x)`; outside the grid
    /// this is a no-op. Any toggle resumes the `Selecting` phase.
    pub fn toggle(&mut self, y: usize, x: usize) -> bool {
        self.phase = Phase::Selecting;
        self.mask.toggle(y, x)
    }

    /// Resolve a display-space position (pixel (0, 0) spans `[0, 1)` on both
    /// axes) to the enclosing spaxel and toggle it. Clicks outside the grid
    /// are ignored.
    pub fn toggle_at(&mut self, px: f64, py: f64) -> bool {
        if px < 0.0 || py < 0.0 {
            return false;
        }
        self.toggle(py.floor() as usize, px.floor() as usize)
    }

    /// Empty the mask unconditionally.
    pub fn reset(&mut self) {
        self.phase = Phase::Selecting;
        self.mask.clear();
    }

    /// Reduce the current selection into a spectrum and store it. An empty
    /// selection is rejected and leaves the previous spectrum untouched.
    pub fn commit(&mut self) -> Result<&Spectrum> {
        if self.mask.is_empty() {
            return Err(ExtractError::Selection);
        }
        let (flux, error) = coadd_spectrum(&self.cube, &self.mask);
        let wavelength = self.cube.wavelength().to_vec();
        let rest_wavelength = wavelength
            .iter()
            .map(|&w| w / (1.0 + self.redshift))
            .collect();
        self.spectrum = Some(Spectrum {
            wavelength,
            rest_wavelength,
            flux,
            error,
        });
        self.phase = Phase::Committed;
        info!(
            "committed spectrum from {} spaxels over {} channels",
            self.mask.len(),
            self.cube.shape().nw
        );
        Ok(self.spectrum.as_ref().expect("just committed"))
    }

    /// The most recently committed spectrum.
    pub fn spectrum(&self) -> Result<&Spectrum> {
        self.spectrum.as_ref().ok_or(ExtractError::NoSpectrum)
    }

    /// Write the committed spectrum to `path`; the table format is inferred
    /// from the file extension.
    pub fn save_spectrum(&self, path: &std::path::Path) -> Result<()> {
        let spectrum = self.spectrum()?;
        super::writer::save_spectrum(path, spectrum, self.redshift)?;
        info!("saved spectrum to {}", path.display());
        Ok(())
    }
}

/// Coadd the masked spaxels channel by channel: plain sum for flux,
/// quadrature sum for errors. Non-finite samples are excluded from their
/// respective sums. Pure function of its inputs; mask iteration order is
/// fixed, so repeated calls are bit-identical.
pub fn coadd_spectrum(cube: &Datacube, mask: &SelectionMask) -> (Vec<f64>, Vec<f64>) {
    let nw = cube.shape().nw;
    let mut flux = vec![0.0; nw];
    let mut var = vec![0.0; nw];

    for (y, x) in mask.iter() {
        for w in 0..nw {
            let f = cube.flux_at(w, y, x);
            if f.is_finite() {
                flux[w] += f;
            }
            let e = cube.err_at(w, y, x);
            if e.is_finite() {
                var[w] += e * e;
            }
        }
    }

    let error = var.into_iter().map(f64::sqrt).collect();
    (flux, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CubeShape;

    fn cube(flux: Vec<f64>, err: Vec<f64>, shape: CubeShape) -> Datacube {
        let wavelength = (0..shape.nw).map(|i| 1.0 + 0.1 * i as f64).collect();
        Datacube::new(flux, err, shape, wavelength).unwrap()
    }

    fn extractor(cube: Datacube) -> Extractor {
        Extractor::new(cube, &ExtractorConfig::default(), None).unwrap()
    }

    /// The worked example: 3 channels over 2x2 spaxels, flux[:, 0, 0] =
    /// [1, 2, 3] and flux[:, 0, 1] = [10, 20, 30], all errors 1. Selecting
    /// both pixels must give flux [11, 22, 33] and error sqrt(2) throughout.
    #[test]
    fn two_spaxel_coadd_end_to_end() {
        let shape = CubeShape { nw: 3, ny: 2, nx: 2 };
        let mut flux = vec![0.0; shape.len()];
        for (w, (a, b)) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)].iter().enumerate() {
            flux[(w * 2) * 2] = *a; // (w, 0, 0)
            flux[(w * 2) * 2 + 1] = *b; // (w, 0, 1)
        }
        let mut ex = extractor(cube(flux, vec![1.0; shape.len()], shape));

        ex.toggle(0, 0);
        ex.toggle(0, 1);
        let spec = ex.commit().unwrap();

        assert_eq!(spec.flux, vec![11.0, 22.0, 33.0]);
        for &e in &spec.error {
            assert!((e - 2.0_f64.sqrt()).abs() < 1e-12);
        }
        assert_eq!(spec.len(), 3);
    }

    #[test]
    fn quadrature_sum_is_exact_for_3_4_5() {
        let shape = CubeShape { nw: 1, ny: 1, nx: 2 };
        let c = cube(vec![0.0, 0.0], vec![3.0, 4.0], shape);
        let mut mask = SelectionMask::new(1, 2);
        mask.toggle(0, 0);
        mask.toggle(0, 1);

        let (_, error) = coadd_spectrum(&c, &mask);
        assert_eq!(error, vec![5.0]);
    }

    #[test]
    fn reduction_is_deterministic() {
        let shape = CubeShape { nw: 5, ny: 3, nx: 3 };
        let flux = (0..shape.len()).map(|i| (i as f64).sin() * 1e3).collect();
        let err = (0..shape.len()).map(|i| (i as f64).cos().abs()).collect();
        let c = cube(flux, err, shape);
        let mut mask = SelectionMask::new(3, 3);
        mask.toggle(2, 1);
        mask.toggle(0, 0);
        mask.toggle(1, 2);

        let first = coadd_spectrum(&c, &mask);
        for _ in 0..10 {
            assert_eq!(coadd_spectrum(&c, &mask), first);
        }
    }

    #[test]
    fn non_finite_samples_are_excluded() {
        let shape = CubeShape { nw: 2, ny: 1, nx: 2 };
        // Channel 0: 5.0 and NaN -> 5.0. Channel 1: inf and 7.0 -> 7.0.
        let flux = vec![5.0, f64::NAN, f64::INFINITY, 7.0];
        let err = vec![1.0, f64::NAN, f64::NAN, 2.0];
        let c = cube(flux, err, shape);
        let mut mask = SelectionMask::new(1, 2);
        mask.toggle(0, 0);
        mask.toggle(0, 1);

        let (f, e) = coadd_spectrum(&c, &mask);
        assert_eq!(f, vec![5.0, 7.0]);
        assert_eq!(e, vec![1.0, 2.0]);
    }

    #[test]
    fn commit_with_empty_mask_is_rejected() {
        let shape = CubeShape { nw: 2, ny: 2, nx: 2 };
        let mut ex = extractor(cube(
            vec![1.0; shape.len()],
            vec![1.0; shape.len()],
            shape,
        ));
        assert!(matches!(ex.commit(), Err(ExtractError::Selection)));
        assert!(matches!(ex.spectrum(), Err(ExtractError::NoSpectrum)));
    }

    #[test]
    fn failed_commit_keeps_previous_spectrum() {
        let shape = CubeShape { nw: 2, ny: 1, nx: 2 };
        let mut ex = extractor(cube(vec![1.0, 2.0, 3.0, 4.0], vec![1.0; 4], shape));

        ex.toggle(0, 0);
        let committed = ex.commit().unwrap().clone();
        assert_eq!(ex.phase(), Phase::Committed);

        ex.reset();
        assert!(matches!(ex.commit(), Err(ExtractError::Selection)));
        assert_eq!(ex.spectrum().unwrap(), &committed);
    }

    #[test]
    fn spectrum_accessor_before_commit_fails() {
        let shape = CubeShape { nw: 1, ny: 1, nx: 1 };
        let ex = extractor(cube(vec![1.0], vec![1.0], shape));
        assert!(matches!(ex.spectrum(), Err(ExtractError::NoSpectrum)));
    }

    #[test]
    fn rest_wavelength_scales_with_redshift() {
        let shape = CubeShape { nw: 3, ny: 1, nx: 1 };
        let mut config = ExtractorConfig::default();
        config.redshift = 1.5;
        let mut ex = Extractor::new(
            cube(vec![1.0; 3], vec![1.0; 3], shape),
            &config,
            None,
        )
        .unwrap();

        ex.toggle(0, 0);
        let spec = ex.commit().unwrap();
        for (w, r) in spec.wavelength.iter().zip(&spec.rest_wavelength) {
            assert!((r - w / 2.5).abs() < 1e-15);
        }
    }

    #[test]
    fn zero_redshift_keeps_rest_wavelength_equal() {
        let shape = CubeShape { nw: 2, ny: 1, nx: 1 };
        let mut ex = extractor(cube(vec![1.0; 2], vec![1.0; 2], shape));
        ex.toggle(0, 0);
        let spec = ex.commit().unwrap();
        assert_eq!(spec.wavelength, spec.rest_wavelength);
    }

    #[test]
    fn display_coordinates_map_to_enclosing_pixel() {
        let shape = CubeShape { nw: 1, ny: 2, nx: 3 };
        let mut ex = extractor(cube(
            vec![0.0; shape.len()],
            vec![1.0; shape.len()],
            shape,
        ));

        // Anywhere inside [2, 3) x [1, 2) lands on spaxel (1, 2).
        assert!(ex.toggle_at(2.7, 1.1));
        assert!(ex.mask().contains(1, 2));

        // Clicks outside the grid are ignored.
        assert!(!ex.toggle_at(-0.3, 0.5));
        assert!(!ex.toggle_at(3.2, 0.5));
        assert_eq!(ex.mask().len(), 1);
    }

    #[test]
    fn toggling_after_commit_resumes_selecting() {
        let shape = CubeShape { nw: 1, ny: 2, nx: 2 };
        let mut ex = extractor(cube(
            vec![1.0; shape.len()],
            vec![1.0; shape.len()],
            shape,
        ));
        ex.toggle(0, 0);
        ex.commit().unwrap();
        assert_eq!(ex.phase(), Phase::Committed);
        ex.toggle(1, 1);
        assert_eq!(ex.phase(), Phase::Selecting);
        assert!(ex.spectrum().is_ok());
    }
}
