//! Rendering errors.

use forecast_common::ForecastError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("Invalid palette '{name}': {reason}")]
    Palette { name: String, reason: String },

    #[error("Colormap not defined: {0}")]
    UnknownColormap(String),

    #[error("Invalid levels: {0}")]
    Levels(String),

    #[error("Data does not match the grid: expected {expected} values, got {actual}")]
    GridMismatch { expected: usize, actual: usize },

    #[error("Invalid GeoJSON in {path}: {reason}")]
    GeoJson { path: String, reason: String },

    #[error("Invalid shapefile {path}: {reason}")]
    Shapefile { path: String, reason: String },

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for ForecastError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Io(e) => ForecastError::Io(e),
            RenderError::Csv(e) => ForecastError::Csv(e.to_string()),
            RenderError::UnknownColormap(name) => ForecastError::UnknownColormap(name),
            other => ForecastError::Render(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_category() {
        let err: ForecastError = RenderError::UnknownColormap("jet".into()).into();
        assert!(matches!(err, ForecastError::UnknownColormap(ref n) if n == "jet"));

        let err: ForecastError = RenderError::Pixmap { width: 0, height: 10 }.into();
        assert_eq!(err.category(), "render");
        assert_eq!(err.to_string(), "Rendering failed: Cannot allocate a 0x10 pixmap");
    }
}
