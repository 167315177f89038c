//! Map projections for the forecast charts.
//!
//! Every named map is a [`ProjectionDef`] in [`PROJ_DEFS`]; building it gives
//! a [`MapProjection`] that takes degrees to projected meters (plain degrees
//! for the equidistant maps). [`get_projection`] fits the map to the figure
//! and places a dataset's grid on it.

pub mod cylindrical;
pub mod defs;
pub mod grid;
pub mod kavrayskiy;
pub mod perspective;
pub mod polar;
pub mod setup;
pub mod traits;
pub mod viewport;

/// Sphere radius of the map projections (meters)
pub const SPHERE_RADIUS_M: f64 = 6_370_997.0;

pub use cylindrical::{Miller, PlateCarree};
pub use defs::{
    lookup, names, CoastlineResolution, ProjectionDef, ProjectionFamily, DEFAULT_PROJECTION,
    PROJ_DEFS,
};
pub use grid::ProjectedGrid;
pub use kavrayskiy::Kavrayskiy7;
pub use perspective::Perspective;
pub use polar::PolarAzimuthalEqualArea;
pub use setup::{get_projection, MapSetup};
pub use traits::{Extent, MapProjection};
pub use viewport::{Margins, PixelRect, Viewport};
