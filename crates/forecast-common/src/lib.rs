//! Common types and utilities shared across the forecast map pipeline.

pub mod bbox;
pub mod config;
pub mod error;
pub mod time;
pub mod units;

pub use bbox::BoundingBox;
pub use config::ForecastConfig;
pub use error::{ForecastError, ForecastResult};
pub use time::{format_elapsed, parse_run_from_filename, ValidTime};
pub use units::{UnitTransform, Units};
