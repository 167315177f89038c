//! Everything a plot needs to know about its map.

use forecast_common::{ForecastError, ForecastResult};
use grib_loader::{Dataset, GridWindow};
use tracing::{debug, info};

use crate::defs::{lookup, ProjectionDef};
use crate::grid::ProjectedGrid;
use crate::traits::MapProjection;
use crate::viewport::{Margins, Viewport};

/// A named map fitted to the figure, with the dataset's grid placed on it.
///
/// `grid` is already cut to the rows and columns that reach the map; cut
/// the data the same way with [`MapSetup::apply`].
pub struct MapSetup {
    pub def: &'static ProjectionDef,
    pub projection: Box<dyn MapProjection>,
    pub viewport: Viewport,
    pub grid: ProjectedGrid,
    /// Visibility on the uncut grid
    pub mask: Vec<bool>,
    pub window: GridWindow,
}

impl std::fmt::Debug for MapSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSetup")
            .field("def", &self.def.name)
            .field("viewport", &self.viewport)
            .field("window", &self.window)
            .finish()
    }
}

impl MapSetup {
    /// Blank off-map points in every field and cut to the same window as
    /// the grid.
    pub fn apply(&self, dataset: &Dataset) -> ForecastResult<Dataset> {
        dataset.apply_mask(&self.mask, &self.window)
    }

    /// Pixel position of a geographic point, if it is on the map.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        self.viewport.locate(self.projection.as_ref(), lon, lat)
    }
}

/// Set up map `name` for `dataset` on a `width` x `height` figure.
pub fn get_projection(
    dataset: &Dataset,
    name: &str,
    width: u32,
    height: u32,
) -> ForecastResult<MapSetup> {
    let def = lookup(name)?;
    let projection = def.build();
    let viewport = Viewport::fit(projection.extent(), width, height, Margins::figure());

    let coords = &dataset.coords;
    let full = ProjectedGrid::project(
        projection.as_ref(),
        &viewport,
        &coords.lon,
        &coords.lat,
        coords.nx,
        coords.ny,
    );
    let window = full.crop_to_mask().ok_or_else(|| {
        ForecastError::InvalidInput(format!("no grid point of the dataset falls on map {}", name))
    })?;
    debug!(projection = name, ?window, visible = full.visible(), "Projected grid");

    let grid = full.crop(&window);
    info!(
        projection = name,
        nx = grid.nx,
        ny = grid.ny,
        scale = viewport.scale,
        "Map ready"
    );

    Ok(MapSetup {
        def,
        projection,
        viewport,
        grid,
        mask: full.mask,
        window,
    })
}
