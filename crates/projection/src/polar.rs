//! North polar Lambert azimuthal equal-area projection.

use std::f64::consts::FRAC_PI_2;

use crate::traits::{Extent, MapProjection};
use crate::SPHERE_RADIUS_M;

/// Polar azimuthal equal-area view of the northern hemisphere.
///
/// `lon_0` points straight down on the map and the square map region just
/// encloses the `bounding_lat` parallel, so the corners reach a little
/// further south.
#[derive(Debug, Clone)]
pub struct PolarAzimuthalEqualArea {
    pub bounding_lat: f64,
    pub lon_0: f64,
    pub radius: f64,
}

impl PolarAzimuthalEqualArea {
    pub fn new(bounding_lat: f64, lon_0: f64) -> Self {
        Self {
            bounding_lat,
            lon_0,
            radius: SPHERE_RADIUS_M,
        }
    }

    /// Distance from the pole on the map.
    fn rho(&self, lat_deg: f64) -> f64 {
        2.0 * self.radius * ((FRAC_PI_2 - lat_deg.to_radians()) / 2.0).sin()
    }
}

impl MapProjection for PolarAzimuthalEqualArea {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        // the south pole spreads over the whole outer circle
        if lat <= -90.0 {
            return None;
        }
        let rho = self.rho(lat);
        let dlam = (lon - self.lon_0).to_radians();
        Some((rho * dlam.sin(), -rho * dlam.cos()))
    }

    fn extent(&self) -> Extent {
        let r = self.rho(self.bounding_lat);
        Extent::symmetric(r, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pole_is_centre() {
        let proj = PolarAzimuthalEqualArea::new(30.0, 10.0);
        let (x, y) = proj.forward(123.0, 90.0).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
    }

    #[test]
    fn test_central_meridian_points_down() {
        let proj = PolarAzimuthalEqualArea::new(30.0, 10.0);
        let (x, y) = proj.forward(10.0, 60.0).unwrap();
        assert!(x.abs() < 1e-6);
        assert!(y < 0.0);
        let (x, _) = proj.forward(100.0, 60.0).unwrap();
        assert!(x > 0.0);
    }

    #[test]
    fn test_bounding_parallel_touches_edges() {
        let proj = PolarAzimuthalEqualArea::new(30.0, 10.0);
        let extent = proj.extent();
        let (_, y) = proj.forward(10.0, 30.0).unwrap();
        assert!((y - extent.min_y).abs() < 1e-6);
        // corners reach below the bounding latitude, the equator does not fit
        assert!(proj.forward_in_region(55.0, 25.0).is_some());
        assert!(proj.forward_in_region(10.0, 0.0).is_none());
    }
}
