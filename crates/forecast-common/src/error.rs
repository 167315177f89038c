//! Error types for the forecast map pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Primary error type shared by the library crates.
#[derive(Debug, Error)]
pub enum ForecastError {
    // === Acquisition Errors ===
    #[error("Retrieval failed: {0}")]
    Acquisition(String),

    // === Input Errors ===
    #[error("No files matching '{pattern}' in {folder}")]
    NoMatchingFiles { folder: PathBuf, pattern: String },

    #[error("Cannot parse run timestamp from file name: {0}")]
    InvalidFileName(String),

    #[error("Invalid GRIB2 data: {0}")]
    Decode(String),

    // === Data Errors ===
    #[error("Field not found in dataset: {0}")]
    MissingField(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot convert {from} to {to}")]
    UnitConversion { from: String, to: String },

    // === Styling Errors ===
    #[error("Projection not defined: {0}")]
    UnknownProjection(String),

    #[error("Colormap not defined: {0}")]
    UnknownColormap(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Geocoding failed: {0}")]
    Geocoding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ForecastError {
    /// Short category name used in aggregated batch reports.
    pub fn category(&self) -> &'static str {
        match self {
            ForecastError::Acquisition(_) => "acquisition",
            ForecastError::NoMatchingFiles { .. }
            | ForecastError::InvalidFileName(_)
            | ForecastError::Decode(_) => "input",
            ForecastError::MissingField(_)
            | ForecastError::ShapeMismatch { .. }
            | ForecastError::InvalidInput(_)
            | ForecastError::UnitConversion { .. } => "data",
            ForecastError::UnknownProjection(_)
            | ForecastError::UnknownColormap(_)
            | ForecastError::Render(_) => "render",
            ForecastError::Io(_) | ForecastError::Csv(_) => "io",
            ForecastError::Geocoding(_) => "geocoding",
            ForecastError::Config(_) => "config",
        }
    }

    pub fn shape_mismatch(expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        ForecastError::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

impl From<serde_yaml::Error> for ForecastError {
    fn from(err: serde_yaml::Error) -> Self {
        ForecastError::Config(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ForecastError::MissingField("tp".into()).category(), "data");
        assert_eq!(
            ForecastError::NoMatchingFiles {
                folder: PathBuf::from("/tmp"),
                pattern: "x".into()
            }
            .category(),
            "input"
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(ForecastError::from(io).category(), "io");
    }

    #[test]
    fn test_display() {
        let err = ForecastError::shape_mismatch((2, 3), (3, 3));
        assert_eq!(err.to_string(), "Shape mismatch: expected (2, 3), got (3, 3)");
    }
}
