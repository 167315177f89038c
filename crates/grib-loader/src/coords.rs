//! Horizontal coordinates of a forecast grid.

use std::collections::BTreeMap;

use forecast_common::{ForecastError, ForecastResult};

/// Candidate (latitude, longitude) variable names, in resolution order.
pub const COORDINATE_NAMES: &[(&str, &str)] = &[
    ("lat", "lon"),
    ("latitude", "longitude"),
    ("lat2d", "lon2d"),
];

/// Pick the first coordinate-name pair present in `available`.
pub fn resolve_coordinate_names<S: AsRef<str>>(
    available: &[S],
) -> ForecastResult<(&'static str, &'static str)> {
    let has = |name: &str| available.iter().any(|a| a.as_ref() == name);
    COORDINATE_NAMES
        .iter()
        .find(|(lat, lon)| has(lat) && has(lon))
        .copied()
        .ok_or_else(|| ForecastError::MissingField("lat/lon coordinates".to_string()))
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to 360 for inputs just below -180
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Index window over a grid, `[y0, y1) x [x0, x1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub y0: usize,
    pub y1: usize,
    pub x0: usize,
    pub x1: usize,
}

impl GridWindow {
    pub fn full(nx: usize, ny: usize) -> Self {
        Self { y0: 0, y1: ny, x0: 0, x1: nx }
    }

    pub fn nx(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn ny(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.nx() == 0 || self.ny() == 0
    }

    /// Copy the window out of one row-major `ny * nx` plane.
    pub fn extract<T: Copy>(&self, plane: &[T], nx: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(self.nx() * self.ny());
        for j in self.y0..self.y1 {
            out.extend_from_slice(&plane[j * nx + self.x0..j * nx + self.x1]);
        }
        out
    }
}

/// 2-D latitude/longitude arrays of a grid, row-major `ny * nx`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
    /// True when the arrays are the meshgrid of 1-D axes
    pub regular: bool,
}

impl Coordinates {
    /// Meshgrid of 1-D latitude and longitude axes.
    pub fn from_axes(lat_axis: &[f64], lon_axis: &[f64]) -> Self {
        let ny = lat_axis.len();
        let nx = lon_axis.len();
        let mut lat = Vec::with_capacity(nx * ny);
        let mut lon = Vec::with_capacity(nx * ny);
        for &la in lat_axis {
            for &lo in lon_axis {
                lat.push(la);
                lon.push(lo);
            }
        }
        Self { lat, lon, nx, ny, regular: true }
    }

    /// Wrap 2-D arrays, detecting whether they form a regular grid.
    pub fn from_2d(lat: Vec<f64>, lon: Vec<f64>, nx: usize, ny: usize) -> ForecastResult<Self> {
        if lat.len() != nx * ny || lon.len() != nx * ny {
            return Err(ForecastError::shape_mismatch(
                nx * ny,
                (lat.len(), lon.len()),
            ));
        }
        let regular = is_meshgrid(&lat, &lon, nx, ny);
        Ok(Self { lat, lon, nx, ny, regular })
    }

    /// Build coordinates from named arrays, accepting any of the
    /// [`COORDINATE_NAMES`] variants.
    ///
    /// Without `shape` the arrays are 1-D axes and get meshgridded; with
    /// `shape = (nx, ny)` they are already 2-D.
    pub fn from_named(
        arrays: &BTreeMap<String, Vec<f64>>,
        shape: Option<(usize, usize)>,
    ) -> ForecastResult<Self> {
        let names: Vec<&str> = arrays.keys().map(String::as_str).collect();
        let (lat_name, lon_name) = resolve_coordinate_names(&names)?;
        let lat = &arrays[lat_name];
        let lon = &arrays[lon_name];

        match shape {
            None => Ok(Self::from_axes(lat, lon)),
            Some((nx, ny)) => Self::from_2d(lat.clone(), lon.clone(), nx, ny),
        }
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lat_at(&self, j: usize, i: usize) -> f64 {
        self.lat[j * self.nx + i]
    }

    pub fn lon_at(&self, j: usize, i: usize) -> f64 {
        self.lon[j * self.nx + i]
    }

    /// 1-D latitude axis of a regular grid.
    pub fn lat_axis(&self) -> Option<Vec<f64>> {
        self.regular
            .then(|| (0..self.ny).map(|j| self.lat_at(j, 0)).collect())
    }

    /// 1-D longitude axis of a regular grid.
    pub fn lon_axis(&self) -> Option<Vec<f64>> {
        self.regular
            .then(|| (0..self.nx).map(|i| self.lon_at(0, i)).collect())
    }

    pub fn crop(&self, window: &GridWindow) -> Self {
        Self {
            lat: window.extract(&self.lat, self.nx),
            lon: window.extract(&self.lon, self.nx),
            nx: window.nx(),
            ny: window.ny(),
            regular: self.regular,
        }
    }

    /// Normalize longitudes into [-180, 180).
    ///
    /// For regular grids the columns are rolled so the axis stays ascending;
    /// the returned shift must be applied to every field sharing the grid.
    pub fn normalize_longitudes(&mut self) -> usize {
        for lon in self.lon.iter_mut() {
            *lon = normalize_longitude(*lon);
        }
        if !self.regular || self.nx == 0 {
            return 0;
        }

        let first_row = &self.lon[..self.nx];
        let shift = first_row
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);

        if shift > 0 {
            roll_columns(&mut self.lon, self.nx, shift);
            roll_columns(&mut self.lat, self.nx, shift);
        }
        shift
    }
}

/// Rotate every row left by `shift` columns.
pub fn roll_columns<T>(data: &mut [T], nx: usize, shift: usize) {
    if nx == 0 || shift % nx == 0 {
        return;
    }
    for row in data.chunks_mut(nx) {
        row.rotate_left(shift % nx);
    }
}

fn is_meshgrid(lat: &[f64], lon: &[f64], nx: usize, ny: usize) -> bool {
    const EPS: f64 = 1e-6;
    for j in 0..ny {
        let row_lat = lat[j * nx];
        for i in 0..nx {
            if (lat[j * nx + i] - row_lat).abs() > EPS || (lon[j * nx + i] - lon[i]).abs() > EPS {
                return false;
            }
        }
    }
    true
}
