//! Cube loading: named SCI/ERR extensions, spectral-axis derivation,
//! surface-brightness scaling, celestial metadata.

use std::path::Path;

use log::{info, warn};

use crate::config::ExtractorConfig;

use super::error::{ExtractError, Result};
use super::fits::{FitsFile, Hdu};
use super::model::{CelestialWcs, CubeShape, Datacube};

/// Load a flux/error datacube from the FITS file at `path`.
///
/// The flux and error arrays come from the extensions named by the config
/// (SCI/ERR by default) and must be 3D with identical shapes. The wavelength
/// axis follows the linear FITS WCS convention with 1-based CRPIX:
/// `wavelength[i] = CRVAL3 + ((i + 1) - CRPIX3) * CDELT3`.
pub fn load_cube(path: &Path, config: &ExtractorConfig) -> Result<Datacube> {
    let fits = FitsFile::open(path)?;

    let sci = named_extension(&fits, &config.sci_extension, path)?;
    let err = named_extension(&fits, &config.err_extension, path)?;

    let shape = cube_shape(sci, &config.sci_extension)?;
    let err_shape = cube_shape(err, &config.err_extension)?;
    if shape != err_shape {
        return Err(ExtractError::shape(
            format!("'{}' shape {shape}", config.sci_extension),
            format!("'{}' shape {err_shape}", config.err_extension),
        ));
    }

    let mut flux = sci.data.clone();
    let mut errs = err.data.clone();

    // JWST cubes are in surface-brightness units; PIXAR_SR converts each
    // spaxel to a flux density.
    if let Some(pixar_sr) = sci.f64_value("PIXAR_SR") {
        for v in flux.iter_mut().chain(errs.iter_mut()) {
            *v *= pixar_sr;
        }
    }

    let (wavelength, wave_unit) = wavelength_axis(sci, shape.nw)?;

    let mut cube = Datacube::new(flux, errs, shape, wavelength)?;
    cube.wave_unit = wave_unit;
    cube.celestial = celestial_wcs(sci);
    if config.celestial_coordinates && cube.celestial.is_none() {
        warn!(
            "{}: no celestial WCS keywords; sky-coordinate readout disabled",
            path.display()
        );
    }

    info!(
        "loaded cube {} from {} ({} channels, {}x{} spaxels)",
        shape,
        path.display(),
        shape.nw,
        shape.ny,
        shape.nx
    );
    Ok(cube)
}

fn named_extension<'f>(fits: &'f FitsFile, name: &str, path: &Path) -> Result<&'f Hdu> {
    fits.by_name(name).ok_or_else(|| {
        ExtractError::data(format!(
            "{}: no extension named '{}'",
            path.display(),
            name
        ))
    })
}

/// FITS reports shape as [NAXIS1, NAXIS2, NAXIS3] = [nx, ny, nw].
fn cube_shape(hdu: &Hdu, name: &str) -> Result<CubeShape> {
    match hdu.shape.as_slice() {
        [nx, ny, nw] => Ok(CubeShape {
            nw: *nw,
            ny: *ny,
            nx: *nx,
        }),
        other => Err(ExtractError::shape(
            format!("3 axes in extension '{name}'"),
            format!("{} axes", other.len()),
        )),
    }
}

fn wavelength_axis(hdu: &Hdu, nw: usize) -> Result<(Vec<f64>, String)> {
    let crval3 = header_f64(hdu, "CRVAL3")?;
    let crpix3 = header_f64(hdu, "CRPIX3")?;
    let cdelt3 = hdu
        .f64_value("CDELT3")
        .or_else(|| hdu.f64_value("CD3_3"))
        .ok_or_else(|| ExtractError::data("missing spectral step (CDELT3 or CD3_3)"))?;

    let mut wavelength: Vec<f64> = (0..nw)
        .map(|i| crval3 + (i as f64 + 1.0 - crpix3) * cdelt3)
        .collect();

    // Meters to microns, matching NIRSpec convention elsewhere in the header.
    let unit = hdu.str_value("CUNIT3").unwrap_or("um").trim().to_string();
    let unit = if unit == "m" {
        for w in &mut wavelength {
            *w *= 1e6;
        }
        "um".to_string()
    } else {
        unit
    };

    Ok((wavelength, unit))
}

fn header_f64(hdu: &Hdu, key: &str) -> Result<f64> {
    hdu.f64_value(key)
        .ok_or_else(|| ExtractError::data(format!("missing header keyword {key}")))
}

fn celestial_wcs(hdu: &Hdu) -> Option<CelestialWcs> {
    Some(CelestialWcs {
        crval1: hdu.f64_value("CRVAL1")?,
        crval2: hdu.f64_value("CRVAL2")?,
        crpix1: hdu.f64_value("CRPIX1")?,
        crpix2: hdu.f64_value("CRPIX2")?,
        cdelt1: hdu
            .f64_value("CDELT1")
            .or_else(|| hdu.f64_value("CD1_1"))?,
        cdelt2: hdu
            .f64_value("CDELT2")
            .or_else(|| hdu.f64_value("CD2_2"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fits::FitsFile;

    fn write_cube(
        path: &Path,
        nx: usize,
        ny: usize,
        nw: usize,
        sci_cards: &[(&str, f64)],
        err_name: &str,
    ) {
        let n = nx * ny * nw;
        let flux: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let errs: Vec<f64> = vec![0.5; n];

        let mut sci = Hdu::image(&[nx, ny, nw], flux).unwrap();
        sci.insert("EXTNAME", "SCI");
        for (k, v) in sci_cards {
            sci.insert(k, *v);
        }

        let mut err = Hdu::image(&[nx, ny, nw], errs).unwrap();
        err.insert("EXTNAME", err_name);

        FitsFile::write(path, &[Hdu::empty(), sci, err]).unwrap();
    }

    fn wcs_cards() -> Vec<(&'static str, f64)> {
        vec![("CRVAL3", 1.0), ("CRPIX3", 1.0), ("CDELT3", 0.05)]
    }

    #[test]
    fn loads_shapes_and_wavelength() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        write_cube(&path, 4, 3, 5, &wcs_cards(), "ERR");

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        let shape = cube.shape();
        assert_eq!((shape.nw, shape.ny, shape.nx), (5, 3, 4));

        let wave = cube.wavelength();
        assert_eq!(wave.len(), 5);
        assert!((wave[0] - 1.0).abs() < 1e-12);
        // Strictly monotonic with the configured positive step.
        for pair in wave.windows(2) {
            assert!((pair[1] - pair[0] - 0.05).abs() < 1e-12);
        }
    }

    #[test]
    fn negative_step_gives_decreasing_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        write_cube(
            &path,
            2,
            2,
            4,
            &[("CRVAL3", 5.0), ("CRPIX3", 1.0), ("CDELT3", -0.1)],
            "ERR",
        );

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        for pair in cube.wavelength().windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn cd3_3_is_accepted_as_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        write_cube(
            &path,
            2,
            2,
            3,
            &[("CRVAL3", 2.0), ("CRPIX3", 1.0), ("CD3_3", 0.25)],
            "ERR",
        );

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        assert!((cube.wavelength()[2] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn missing_extension_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        write_cube(&path, 2, 2, 2, &wcs_cards(), "UNCERT");

        assert!(matches!(
            load_cube(&path, &ExtractorConfig::default()),
            Err(ExtractError::Data(_))
        ));
    }

    #[test]
    fn mismatched_error_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");

        let mut sci = Hdu::image(&[2, 2, 3], vec![1.0; 12]).unwrap();
        sci.insert("EXTNAME", "SCI");
        for (k, v) in wcs_cards() {
            sci.insert(k, v);
        }
        let mut err = Hdu::image(&[2, 2, 2], vec![1.0; 8]).unwrap();
        err.insert("EXTNAME", "ERR");
        FitsFile::write(&path, &[Hdu::empty(), sci, err]).unwrap();

        assert!(matches!(
            load_cube(&path, &ExtractorConfig::default()),
            Err(ExtractError::Shape { .. })
        ));
    }

    #[test]
    fn missing_spectral_keywords_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        write_cube(&path, 2, 2, 2, &[("CRVAL3", 1.0)], "ERR");

        assert!(matches!(
            load_cube(&path, &ExtractorConfig::default()),
            Err(ExtractError::Data(_))
        ));
    }

    #[test]
    fn pixar_sr_scales_flux_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        let mut cards = wcs_cards();
        cards.push(("PIXAR_SR", 2.0));
        write_cube(&path, 1, 1, 2, &cards, "ERR");

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        // Raw flux was [0, 1] and error 0.5 everywhere.
        assert_eq!(cube.flux_at(1, 0, 0), 2.0);
        assert_eq!(cube.err_at(0, 0, 0), 1.0);
    }

    #[test]
    fn meters_convert_to_microns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");

        let mut sci = Hdu::image(&[1, 1, 2], vec![0.0, 0.0]).unwrap();
        sci.insert("EXTNAME", "SCI");
        sci.insert("CRVAL3", 1.0e-6);
        sci.insert("CRPIX3", 1.0);
        sci.insert("CDELT3", 1.0e-7);
        sci.insert("CUNIT3", "m");
        let mut err = Hdu::image(&[1, 1, 2], vec![0.0, 0.0]).unwrap();
        err.insert("EXTNAME", "ERR");
        FitsFile::write(&path, &[Hdu::empty(), sci, err]).unwrap();

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        assert_eq!(cube.wave_unit, "um");
        assert!((cube.wavelength()[0] - 1.0).abs() < 1e-9);
        assert!((cube.wavelength()[1] - 1.1).abs() < 1e-9);
    }

    #[test]
    fn celestial_keywords_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        let mut cards = wcs_cards();
        cards.extend([
            ("CRVAL1", 150.1),
            ("CRVAL2", 2.2),
            ("CRPIX1", 10.0),
            ("CRPIX2", 12.0),
            ("CDELT1", -2.8e-5),
            ("CDELT2", 2.8e-5),
        ]);
        write_cube(&path, 2, 2, 2, &cards, "ERR");

        let cube = load_cube(&path, &ExtractorConfig::default()).unwrap();
        let wcs = cube.celestial.expect("celestial WCS");
        assert_eq!(wcs.crval1, 150.1);
        assert_eq!(wcs.cdelt2, 2.8e-5);
    }
}
