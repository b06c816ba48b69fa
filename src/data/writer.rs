//! Spectrum table persistence. The format is inferred from the path
//! extension; every writer has a matching reader so saved tables round-trip.
//!
//! Supported formats:
//! * `.csv` – plain-text table, one header row
//! * `.json` – single record with one array per column
//! * `.parquet` / `.pq` – four Float64 columns
//! * `.fits` / `.fit` – primary HDU plus four 1-D image extensions
//!   (WAVE, RESTWAVE, FLUX, ERR)

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::error::{ExtractError, Result};
use super::fits::{FitsFile, Hdu};
use super::model::Spectrum;

const COLUMNS: [&str; 4] = ["wavelength", "rest_wavelength", "flux", "error"];

/// Write `spectrum` to `path`, dispatching on the extension.
pub fn save_spectrum(path: &Path, spectrum: &Spectrum, redshift: f64) -> Result<()> {
    match extension(path).as_str() {
        "csv" => save_csv(path, spectrum),
        "json" => save_json(path, spectrum),
        "parquet" | "pq" => save_parquet(path, spectrum),
        "fits" | "fit" => save_fits(path, spectrum, redshift),
        _ => Err(ExtractError::Format(path.to_path_buf())),
    }
}

/// Read a spectrum table previously written by [`save_spectrum`].
pub fn load_spectrum(path: &Path) -> Result<Spectrum> {
    match extension(path).as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        "fits" | "fit" => load_fits(path),
        _ => Err(ExtractError::Format(path.to_path_buf())),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn save_csv(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(COLUMNS).map_err(csv_err)?;
    for i in 0..spectrum.len() {
        writer
            .write_record([
                format_cell(spectrum.wavelength[i]),
                format_cell(spectrum.rest_wavelength[i]),
                format_cell(spectrum.flux[i]),
                format_cell(spectrum.error[i]),
            ])
            .map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

/// `{:?}` is the shortest representation that parses back to the same f64.
fn format_cell(v: f64) -> String {
    format!("{v:?}")
}

fn load_csv(path: &Path) -> Result<Spectrum> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut indices = Vec::with_capacity(COLUMNS.len());
    for col in COLUMNS {
        let idx = headers
            .iter()
            .position(|h| h == col)
            .ok_or_else(|| ExtractError::data(format!("CSV missing '{col}' column")))?;
        indices.push(idx);
    }

    let mut columns: [Vec<f64>; 4] = Default::default();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        for (slot, &idx) in columns.iter_mut().zip(&indices) {
            let cell = record.get(idx).unwrap_or("");
            let v = cell.parse::<f64>().map_err(|_| {
                ExtractError::data(format!("CSV row {row}: '{cell}' is not a number"))
            })?;
            slot.push(v);
        }
    }

    let [wavelength, rest_wavelength, flux, error] = columns;
    Ok(Spectrum {
        wavelength,
        rest_wavelength,
        flux,
        error,
    })
}

fn csv_err(e: csv::Error) -> ExtractError {
    ExtractError::data(format!("CSV table: {e}"))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn save_json(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, spectrum)
        .map_err(|e| ExtractError::data(format!("JSON table: {e}")))
}

fn load_json(path: &Path) -> Result<Spectrum> {
    let file = std::fs::File::open(path)?;
    serde_json::from_reader(file).map_err(|e| ExtractError::data(format!("JSON table: {e}")))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn table_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ))
}

fn save_parquet(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let schema = table_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(spectrum.wavelength.clone())),
            Arc::new(Float64Array::from(spectrum.rest_wavelength.clone())),
            Arc::new(Float64Array::from(spectrum.flux.clone())),
            Arc::new(Float64Array::from(spectrum.error.clone())),
        ],
    )
    .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;
    writer
        .close()
        .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Spectrum> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?
        .build()
        .map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;

    let mut columns: [Vec<f64>; 4] = Default::default();
    for batch in reader {
        let batch = batch.map_err(|e| ExtractError::data(format!("parquet table: {e}")))?;
        for (slot, name) in columns.iter_mut().zip(COLUMNS) {
            let col = batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                .ok_or_else(|| {
                    ExtractError::data(format!("parquet table missing Float64 column '{name}'"))
                })?;
            slot.extend((0..col.len()).map(|i| col.value(i)));
        }
    }

    let [wavelength, rest_wavelength, flux, error] = columns;
    Ok(Spectrum {
        wavelength,
        rest_wavelength,
        flux,
        error,
    })
}

// ---------------------------------------------------------------------------
// FITS
// ---------------------------------------------------------------------------

const FITS_EXTNAMES: [&str; 4] = ["WAVE", "RESTWAVE", "FLUX", "ERR"];

fn save_fits(path: &Path, spectrum: &Spectrum, redshift: f64) -> Result<()> {
    let mut primary = Hdu::empty();
    primary.insert("REDSHIFT", redshift);

    let columns = [
        &spectrum.wavelength,
        &spectrum.rest_wavelength,
        &spectrum.flux,
        &spectrum.error,
    ];
    let mut hdus = vec![primary];
    for (name, column) in FITS_EXTNAMES.iter().zip(columns) {
        let mut hdu = Hdu::image(&[column.len()], column.clone())?;
        hdu.insert("EXTNAME", *name);
        hdus.push(hdu);
    }
    FitsFile::write(path, &hdus)
}

fn load_fits(path: &Path) -> Result<Spectrum> {
    let fits = FitsFile::open(path)?;
    let mut columns: [Vec<f64>; 4] = Default::default();
    for (slot, name) in columns.iter_mut().zip(FITS_EXTNAMES) {
        let hdu = fits.by_name(name).ok_or_else(|| {
            ExtractError::data(format!("{}: no '{name}' extension", path.display()))
        })?;
        *slot = hdu.data.clone();
    }

    let [wavelength, rest_wavelength, flux, error] = columns;
    Ok(Spectrum {
        wavelength,
        rest_wavelength,
        flux,
        error,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Spectrum {
        let wavelength: Vec<f64> = (0..16).map(|i| 1.0 + 0.05 * i as f64).collect();
        let rest_wavelength = wavelength.iter().map(|w| w / 1.3).collect();
        let flux = wavelength.iter().map(|w| (w * 7.0).sin() * 1e-3).collect();
        let error = wavelength.iter().map(|w| w * 1e-5).collect();
        Spectrum {
            wavelength,
            rest_wavelength,
            flux,
            error,
        }
    }

    fn round_trip(name: &str) -> (Spectrum, Spectrum) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let spectrum = sample();
        save_spectrum(&path, &spectrum, 0.3).unwrap();
        let back = load_spectrum(&path).unwrap();
        (spectrum, back)
    }

    #[test]
    fn csv_round_trip() {
        let (original, back) = round_trip("spec.csv");
        assert_eq!(original, back);
    }

    #[test]
    fn json_round_trip() {
        let (original, back) = round_trip("spec.json");
        assert_eq!(original, back);
    }

    #[test]
    fn parquet_round_trip() {
        let (original, back) = round_trip("spec.parquet");
        assert_eq!(original, back);
    }

    #[test]
    fn fits_round_trip() {
        let (original, back) = round_trip("spec.fits");
        assert_eq!(original, back);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.xlsx");
        assert!(matches!(
            save_spectrum(&path, &sample(), 0.0),
            Err(ExtractError::Format(_))
        ));
    }

    #[test]
    fn unwritable_path_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("spec.json");
        assert!(matches!(
            save_spectrum(&path, &sample(), 0.0),
            Err(ExtractError::Io(_))
        ));
    }

    #[test]
    fn csv_rejects_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "wavelength,flux\n1.0,2.0\n").unwrap();
        assert!(matches!(load_spectrum(&path), Err(ExtractError::Data(_))));
    }

    #[test]
    fn redshift_is_recorded_in_fits_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.fits");
        save_spectrum(&path, &sample(), 0.42).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.hdus[0].f64_value("REDSHIFT"), Some(0.42));
    }
}
