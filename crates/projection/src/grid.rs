//! Forecast grid points in pixel space.

use grib_loader::{mask_window, GridWindow};
use rayon::prelude::*;

use crate::traits::MapProjection;
use crate::viewport::Viewport;

/// Pixel positions of every grid point and whether it is on the map.
///
/// Points with `mask == false` hold NaN in both `x` and `y`.
#[derive(Debug, Clone)]
pub struct ProjectedGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mask: Vec<bool>,
    pub nx: usize,
    pub ny: usize,
}

impl ProjectedGrid {
    /// Project `lon`/`lat` (both `ny * nx`, row-major) onto the image.
    pub fn project(
        projection: &dyn MapProjection,
        viewport: &Viewport,
        lon: &[f64],
        lat: &[f64],
        nx: usize,
        ny: usize,
    ) -> Self {
        let points: Vec<Option<(f64, f64)>> = lon
            .par_iter()
            .zip(lat.par_iter())
            .map(|(&lon, &lat)| {
                let (x, y) = projection.forward_in_region(lon, lat)?;
                Some(viewport.to_pixel(x, y))
            })
            .collect();

        let mut x = Vec::with_capacity(points.len());
        let mut y = Vec::with_capacity(points.len());
        let mut mask = Vec::with_capacity(points.len());
        for point in points {
            let (px, py) = point.unwrap_or((f64::NAN, f64::NAN));
            x.push(px);
            y.push(py);
            mask.push(point.is_some());
        }

        Self { x, y, mask, nx, ny }
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Number of grid points on the map.
    pub fn visible(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// Smallest row/column window holding every visible point.
    pub fn crop_to_mask(&self) -> Option<GridWindow> {
        mask_window(&self.mask, self.nx, self.ny)
    }

    /// The grid cut to `window`.
    pub fn crop(&self, window: &GridWindow) -> Self {
        Self {
            x: window.extract(&self.x, self.nx),
            y: window.extract(&self.y, self.nx),
            mask: window.extract(&self.mask, self.nx),
            nx: window.nx(),
            ny: window.ny(),
        }
    }

    #[inline]
    pub fn pixel(&self, j: usize, i: usize) -> Option<(f64, f64)> {
        let idx = j * self.nx + i;
        self.mask[idx].then(|| (self.x[idx], self.y[idx]))
    }
}
