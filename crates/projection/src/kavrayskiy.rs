//! Kavrayskiy VII pseudocylindrical world projection.

use std::f64::consts::PI;

use grib_loader::normalize_longitude;

use crate::traits::{Extent, MapProjection};
use crate::SPHERE_RADIUS_M;

/// Kavrayskiy VII centred on `lon_0`.
///
/// `x = R 3λ/(2π) sqrt(π²/3 - φ²)`, `y = R φ`
#[derive(Debug, Clone)]
pub struct Kavrayskiy7 {
    pub lon_0: f64,
    pub radius: f64,
}

impl Kavrayskiy7 {
    pub fn new(lon_0: f64) -> Self {
        Self {
            lon_0,
            radius: SPHERE_RADIUS_M,
        }
    }

    fn project_rad(&self, lam: f64, phi: f64) -> (f64, f64) {
        let x = self.radius * 3.0 * lam / (2.0 * PI) * (PI * PI / 3.0 - phi * phi).sqrt();
        (x, self.radius * phi)
    }
}

impl MapProjection for Kavrayskiy7 {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let dlon = normalize_longitude(lon - self.lon_0);
        // the antimeridian itself belongs to the eastern edge
        let dlon = if dlon == -180.0 && lon - self.lon_0 > 0.0 { 180.0 } else { dlon };
        Some(self.project_rad(dlon.to_radians(), lat.to_radians()))
    }

    fn extent(&self) -> Extent {
        let (x, _) = self.project_rad(PI, 0.0);
        Extent::symmetric(x, self.radius * PI / 2.0)
    }

    fn boundary(&self) -> Vec<(f64, f64)> {
        let east = (-90..=90).map(|lat| self.project_rad(PI, (lat as f64).to_radians()));
        let west = (-90..=90)
            .rev()
            .map(|lat| self.project_rad(-PI, (lat as f64).to_radians()));
        let mut outline: Vec<(f64, f64)> = east.chain(west).collect();
        if let Some(&first) = outline.first() {
            outline.push(first);
        }
        outline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_and_meridian() {
        let proj = Kavrayskiy7::new(0.0);
        let (x, y) = proj.forward(0.0, 0.0).unwrap();
        assert_eq!((x, y), (0.0, 0.0));

        let (x, y) = proj.forward(0.0, 45.0).unwrap();
        assert_eq!(x, 0.0);
        assert!((y - SPHERE_RADIUS_M * PI / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_edge_width() {
        let proj = Kavrayskiy7::new(0.0);
        let extent = proj.extent();
        // x at λ = π on the equator is R π √3 / 2
        let expected = SPHERE_RADIUS_M * PI * 3f64.sqrt() / 2.0;
        assert!((extent.max_x - expected).abs() < 1e-3);
        // the poles are lines, narrower than the equator
        let (x_pole, _) = proj.forward(180.0, 90.0).unwrap();
        assert!(x_pole > 0.0 && x_pole < expected);
    }

    #[test]
    fn test_every_point_is_inside() {
        let proj = Kavrayskiy7::new(0.0);
        for lat in (-90..=90).step_by(15) {
            for lon in (-180..=180).step_by(15) {
                assert!(proj.forward_in_region(lon as f64, lat as f64).is_some());
            }
        }
    }
}
