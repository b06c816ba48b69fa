//! Data layer: the headless extraction core, testable without a display.
//!
//! Architecture:
//! ```text
//!  cube.fits (SCI + ERR extensions)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  fits codec → Datacube (flux, err, wavelength, WCS)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  picker   │  median projection → PickerImage
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ extract   │  SelectionMask + commit → Spectrum
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  writer   │  spectrum table → .csv / .json / .parquet / .fits
//!   └──────────┘
//! ```
pub mod error;
pub mod extract;
pub mod fits;
pub mod loader;
pub mod model;
pub mod picker;
pub mod writer;
