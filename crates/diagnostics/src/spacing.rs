//! Grid spacing in metres.

use grib_loader::{normalize_longitude, Dataset};

use crate::constants::EARTH_RADIUS_M;

/// Signed distances between neighbouring grid points.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpacing {
    /// `ny * (nx - 1)`, from column `i` to `i + 1`
    pub dx: Vec<f64>,
    /// `(ny - 1) * nx`, from row `j` to `j + 1`
    pub dy: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
}

/// Haversine distance between two points given in degrees.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Grid spacing of a dataset.
///
/// `dx` is positive eastwards and `dy` positive northwards, so a grid
/// stored north to south has negative `dy`. Only valid as input to the
/// potential-vorticity computation on a single time slice.
pub fn compute_spacing(dataset: &Dataset) -> GridSpacing {
    let coords = &dataset.coords;
    let (nx, ny) = (coords.nx, coords.ny);

    let mut dx = Vec::with_capacity(ny * nx.saturating_sub(1));
    for j in 0..ny {
        for i in 0..nx.saturating_sub(1) {
            let (lat1, lon1) = (coords.lat_at(j, i), coords.lon_at(j, i));
            let (lat2, lon2) = (coords.lat_at(j, i + 1), coords.lon_at(j, i + 1));
            let dist = great_circle_distance(lat1, lon1, lat2, lon2);
            dx.push(dist.copysign(normalize_longitude(lon2 - lon1)));
        }
    }

    let mut dy = Vec::with_capacity(ny.saturating_sub(1) * nx);
    for j in 0..ny.saturating_sub(1) {
        for i in 0..nx {
            let (lat1, lon1) = (coords.lat_at(j, i), coords.lon_at(j, i));
            let (lat2, lon2) = (coords.lat_at(j + 1, i), coords.lon_at(j + 1, i));
            let dist = great_circle_distance(lat1, lon1, lat2, lon2);
            dy.push(dist.copysign(lat2 - lat1));
        }
    }

    GridSpacing { dx, dy, nx, ny }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use grib_loader::Coordinates;

    #[test]
    fn test_shapes_and_signs() {
        let coords = Coordinates::from_axes(&[50.0, 49.0, 48.0], &[10.0, 11.0, 12.0, 13.0]);
        let run = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let ds = Dataset::new(run, vec![0], vec![], coords);
        let spacing = compute_spacing(&ds);

        assert_eq!(spacing.dx.len(), 3 * 3);
        assert_eq!(spacing.dy.len(), 2 * 4);
        assert!(spacing.dx.iter().all(|d| *d > 0.0));
        assert!(spacing.dy.iter().all(|d| *d < 0.0));
        // one degree of latitude
        assert!((spacing.dy[0].abs() - 111_195.0).abs() < 10.0);
        // meridians converge northwards
        assert!(spacing.dx[0] < spacing.dx[6]);
    }

    #[test]
    fn test_dateline_crossing_is_short_and_eastward() {
        let d = great_circle_distance(0.0, 179.5, 0.0, -179.5);
        assert!((d - 111_195.0).abs() < 10.0);
        assert!(normalize_longitude(-179.5 - 179.5) > 0.0);
    }
}
