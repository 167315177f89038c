//! Common test fixtures for forecast-maps tests.
//!
//! Map regions, model grids and run times that show up across the test
//! suites.

/// Regional map extents as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Euro-Atlantic Miller map
    pub const EURATL: (f64, f64, f64, f64) = (-23.5, 29.5, 45.0, 70.5);

    /// Italy
    pub const ITALY: (f64, f64, f64, f64) = (6.0, 36.0, 19.0, 48.0);

    /// Germany
    pub const GERMANY: (f64, f64, f64, f64) = (5.0, 46.5, 16.0, 56.0);

    /// Mexico
    pub const MEXICO: (f64, f64, f64, f64) = (-102.66, 20.84, -77.61, 36.74);

    /// Whole globe in the -180..180 convention
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Lies entirely in the southern ocean, away from every regional map
    pub const SOUTHERN_OCEAN: (f64, f64, f64, f64) = (100.0, -70.0, 120.0, -60.0);
}

/// Common grid specifications for testing.
pub mod grid {
    /// ECMWF open-data grid, 0.25 degree, north to south, 0..360
    pub const ECMWF_0P25: GridSpec = GridSpec {
        width: 1440,
        height: 721,
        min_lon: 0.0,
        max_lon: 359.75,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// One degree global grid in the 0..360 convention
    pub const GLOBAL_1DEG: GridSpec = GridSpec {
        width: 360,
        height: 181,
        min_lon: 0.0,
        max_lon: 359.0,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// Half degree grid over the Euro-Atlantic map
    pub const EURATL_0P5: GridSpec = GridSpec {
        width: 138,
        height: 83,
        min_lon: -23.5,
        max_lon: 45.0,
        min_lat: 29.5,
        max_lat: 70.5,
    };

    /// Simple 10x10 grid over central Europe
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: 5.0,
        max_lon: 14.0,
        min_lat: 42.0,
        max_lat: 51.0,
    };

    /// A regular lat/lon grid. Both ends of each axis are grid points.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Returns the resolution in degrees.
        pub fn resolution(&self) -> (f64, f64) {
            let dx = (self.max_lon - self.min_lon) / (self.width.max(2) - 1) as f64;
            let dy = (self.max_lat - self.min_lat) / (self.height.max(2) - 1) as f64;
            (dx, dy)
        }

        /// Latitudes from north to south, as GRIB2 files store them.
        pub fn lat_axis(&self) -> Vec<f64> {
            let (_, dy) = self.resolution();
            (0..self.height)
                .map(|j| self.max_lat - j as f64 * dy)
                .collect()
        }

        /// Longitudes from west to east.
        pub fn lon_axis(&self) -> Vec<f64> {
            let (dx, _) = self.resolution();
            (0..self.width)
                .map(|i| self.min_lon + i as f64 * dx)
                .collect()
        }

        /// Returns the bounding box as (min_lon, min_lat, max_lon, max_lat).
        pub fn bbox(&self) -> (f64, f64, f64, f64) {
            (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
        }
    }
}

/// Model runs and forecast steps.
pub mod time {
    /// Run of the reference fixtures, as found in file names
    pub const REFERENCE_RUN: &str = "2023121800";

    /// Cycles published with the full step range
    pub const MAIN_CYCLES: [u32; 2] = [0, 12];

    /// Cycles published with the short step range
    pub const OFF_CYCLES: [u32; 2] = [6, 18];

    /// A few steps spanning both the 3-hourly and 6-hourly parts
    pub const SAMPLE_STEPS: [u32; 6] = [0, 3, 6, 9, 144, 150];
}

/// Downloaded file names.
pub mod files {
    pub const SURFACE: &str = "2023121800_2D.grib2";
    pub const LEVEL_850: &str = "2023121800_3D_850.grib2";
    pub const LEVEL_500: &str = "2023121800_3D_500.grib2";
    pub const LEVEL_250: &str = "2023121800_3D_250.grib2";
    pub const SURFACE_OLDER: &str = "2023121712_2D.grib2";
}
