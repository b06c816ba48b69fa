//! Writes `sample_cube.fits`: a synthetic NIRSpec-like datacube with a
//! compact source (continuum plus a few emission lines) on a noisy
//! background, for trying the picker without real data.

// The FITS codec is shared with the main binary.
#![allow(dead_code)]

#[path = "../data/error.rs"]
mod error;
#[path = "../data/fits.rs"]
mod fits;

use fits::{FitsFile, Hdu};

const NX: usize = 24;
const NY: usize = 24;
const NW: usize = 300;

const CRVAL3: f64 = 1.0; // microns
const CDELT3: f64 = 0.004;
const NOISE: f64 = 0.02;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Source spectrum at redshift 1: flat continuum plus [O III] and H-alpha.
fn source_spectrum(wavelength: f64) -> f64 {
    let lines = [
        (1.0014, 0.002, 2.5), // [O III] 5007
        (0.9923, 0.002, 0.8), // [O III] 4959
        (1.3126, 0.003, 4.0), // H-alpha
    ];
    let continuum = 0.5 + 0.1 * (wavelength - CRVAL3);
    continuum
        + lines
            .iter()
            .map(|&(mu, sigma, amp)| gaussian(wavelength, mu, sigma, amp))
            .sum::<f64>()
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let wavelengths: Vec<f64> = (0..NW).map(|i| CRVAL3 + i as f64 * CDELT3).collect();

    // Compact source centered on the grid.
    let (x0, y0, radius) = ((NX / 2) as f64, (NY / 2) as f64, 3.0);

    let mut flux = Vec::with_capacity(NW * NY * NX);
    let mut errs = Vec::with_capacity(NW * NY * NX);
    for &wavelength in &wavelengths {
        let line = source_spectrum(wavelength);
        for y in 0..NY {
            for x in 0..NX {
                let r2 = (x as f64 - x0).powi(2) + (y as f64 - y0).powi(2);
                let profile = (-r2 / (2.0 * radius * radius)).exp();
                flux.push(line * profile + rng.gauss(0.0, NOISE));
                errs.push(NOISE * (1.0 + 0.5 * profile));
            }
        }
    }

    let wcs_cards: &[(&str, f64)] = &[
        ("CRVAL3", CRVAL3),
        ("CRPIX3", 1.0),
        ("CDELT3", CDELT3),
        ("CRVAL1", 150.123),
        ("CRVAL2", 2.456),
        ("CRPIX1", (NX / 2 + 1) as f64),
        ("CRPIX2", (NY / 2 + 1) as f64),
        ("CDELT1", -2.8e-5),
        ("CDELT2", 2.8e-5),
    ];

    let mut sci = Hdu::image(&[NX, NY, NW], flux).expect("flux shape");
    sci.insert("EXTNAME", "SCI");
    sci.insert("CUNIT3", "um");
    sci.insert("BUNIT", "MJy/sr");
    for &(key, value) in wcs_cards {
        sci.insert(key, value);
    }

    let mut err = Hdu::image(&[NX, NY, NW], errs).expect("error shape");
    err.insert("EXTNAME", "ERR");
    err.insert("CUNIT3", "um");
    for &(key, value) in wcs_cards {
        err.insert(key, value);
    }

    let mut primary = Hdu::empty();
    primary.insert("TELESCOP", "SYNTH");
    primary.insert("INSTRUME", "CUBEPICK");

    let output_path = "sample_cube.fits";
    FitsFile::write(std::path::Path::new(output_path), &[primary, sci, err])
        .expect("Failed to write cube");

    println!("Wrote {NW}x{NY}x{NX} cube ({} µm to {} µm) to {output_path}",
        wavelengths[0],
        wavelengths[NW - 1]
    );
}
