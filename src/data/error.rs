use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the data layer. Each failure is atomic: the state that
/// existed before the offending call (mask, committed spectrum) is unchanged.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Missing or malformed extension, header keyword, or file content.
    #[error("data error: {0}")]
    Data(String),

    /// Array dimensions do not agree.
    #[error("shape mismatch: expected {expected}, got {got}")]
    Shape { expected: String, got: String },

    /// Commit requested with nothing selected.
    #[error("no spaxels selected; click pixels on the picker before pressing OK")]
    Selection,

    /// Spectrum accessor or writer called before any commit.
    #[error("no spectrum has been extracted yet")]
    NoSpectrum,

    /// Table format not recognised from the file extension.
    #[error("unsupported table format for '{0}'")]
    Format(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn data(msg: impl Into<String>) -> Self {
        ExtractError::Data(msg.into())
    }

    pub fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        ExtractError::Shape {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
