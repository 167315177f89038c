//! Derived meteorological fields.
//!
//! Every `compute_*` function reads fields from a [`grib_loader::Dataset`]
//! and returns a new dataset with the derived field added. Inputs are never
//! modified and untouched fields are shared with the input.

pub mod accumulation;
pub mod constants;
pub mod derivative;
pub mod kinematics;
pub mod spacing;
pub mod thermo;

pub use accumulation::{
    combine_sources, compute_rain_snow_change, compute_rate, compute_snow_change,
    integrate_rate, Accumulation, AccumulationSource,
};
pub use kinematics::{compute_pv, compute_wind_speed};
pub use spacing::{compute_spacing, great_circle_distance, GridSpacing};
pub use thermo::{compute_theta, compute_thetae, dewpoint_from_relative_humidity};
