//! Near-sided perspective projection.
//!
//! The globe as seen from a point `height` metres above the surface,
//! straight above (`lon_0`, `lat_0`). Only the cap of the sphere facing the
//! viewer is visible; everything beyond the horizon has no projected
//! position.
//!
//! Reference: Snyder, Map Projections - A Working Manual (1987), p. 169-173

use nalgebra::{Matrix3, Vector3};

use crate::traits::{Extent, MapProjection};
use crate::SPHERE_RADIUS_M;

/// Unit vector of a geographic point on the sphere.
fn unit_vector(lon_rad: f64, lat_rad: f64) -> Vector3<f64> {
    Vector3::new(
        lat_rad.cos() * lon_rad.cos(),
        lat_rad.cos() * lon_rad.sin(),
        lat_rad.sin(),
    )
}

/// Near-sided perspective parameters.
#[derive(Debug, Clone)]
pub struct Perspective {
    /// Longitude of the point below the viewer (degrees)
    pub lon_0: f64,
    /// Latitude of the point below the viewer (degrees)
    pub lat_0: f64,
    /// Viewer height above the surface (meters)
    pub height: f64,
    /// Sphere radius (meters)
    pub radius: f64,
    /// Viewer distance from the centre in sphere radii, `1 + height / radius`
    p: f64,
    /// Rows: east, north and up unit vectors at (`lon_0`, `lat_0`)
    frame: Matrix3<f64>,
}

impl Perspective {
    pub fn new(lon_0: f64, lat_0: f64, height: f64) -> Self {
        Self::with_radius(lon_0, lat_0, height, SPHERE_RADIUS_M)
    }

    pub fn with_radius(lon_0: f64, lat_0: f64, height: f64, radius: f64) -> Self {
        let (lam, phi) = (lon_0.to_radians(), lat_0.to_radians());
        let east = Vector3::new(-lam.sin(), lam.cos(), 0.0);
        let north = Vector3::new(-phi.sin() * lam.cos(), -phi.sin() * lam.sin(), phi.cos());
        let up = unit_vector(lam, phi);
        let frame = Matrix3::from_rows(&[east.transpose(), north.transpose(), up.transpose()]);

        Self {
            lon_0,
            lat_0,
            height,
            radius,
            p: 1.0 + height / radius,
            frame,
        }
    }

    /// Radius of the visible disk in projected meters.
    pub fn horizon_radius(&self) -> f64 {
        self.radius * ((self.p - 1.0) / (self.p + 1.0)).sqrt()
    }

    /// Angular distance from the centre beyond which points are hidden.
    pub fn horizon_angle(&self) -> f64 {
        (1.0 / self.p).acos()
    }
}

impl MapProjection for Perspective {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let local = self.frame * unit_vector(lon.to_radians(), lat.to_radians());
        let cos_c = local.z;
        if cos_c < 1.0 / self.p {
            return None;
        }
        let k = (self.p - 1.0) / (self.p - cos_c);
        Some((self.radius * k * local.x, self.radius * k * local.y))
    }

    fn extent(&self) -> Extent {
        let r = self.horizon_radius();
        Extent::symmetric(r, r)
    }

    fn boundary(&self) -> Vec<(f64, f64)> {
        let r = self.horizon_radius();
        let mut outline: Vec<(f64, f64)> = (0..360)
            .map(|deg| {
                let a = (deg as f64).to_radians();
                (r * a.cos(), r * a.sin())
            })
            .collect();
        outline.push((r, 0.0));
        outline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nh() -> Perspective {
        Perspective::new(-15.0, 50.0, 4.0e6)
    }

    #[test]
    fn test_centre_maps_to_origin() {
        let (x, y) = nh().forward(-15.0, 50.0).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
    }

    #[test]
    fn test_orientation() {
        let proj = nh();
        let (x_east, _) = proj.forward(0.0, 50.0).unwrap();
        let (_, y_north) = proj.forward(-15.0, 60.0).unwrap();
        assert!(x_east > 0.0);
        assert!(y_north > 0.0);
    }

    #[test]
    fn test_far_side_is_hidden() {
        let proj = nh();
        // antipode of the centre
        assert!(proj.forward(165.0, -50.0).is_none());
        assert!(proj.forward(120.0, -30.0).is_none());
    }

    #[test]
    fn test_visible_points_lie_within_horizon() {
        let proj = nh();
        let r = proj.horizon_radius();
        for lat in (-90..=90).step_by(5) {
            for lon in (-180..180).step_by(5) {
                if let Some((x, y)) = proj.forward(lon as f64, lat as f64) {
                    assert!(x.hypot(y) <= r * (1.0 + 1e-9), "({}, {})", lon, lat);
                }
            }
        }
    }

    #[test]
    fn test_matches_snyder_formulas() {
        let proj = nh();
        let (lon, lat) = (10.0f64, 40.0f64);
        let (phi0, phi) = (50.0f64.to_radians(), lat.to_radians());
        let dlam = (lon + 15.0).to_radians();
        let cos_c = phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dlam.cos();
        let p = 1.0 + 4.0e6 / SPHERE_RADIUS_M;
        let k = (p - 1.0) / (p - cos_c);
        let x = SPHERE_RADIUS_M * k * phi.cos() * dlam.sin();
        let y = SPHERE_RADIUS_M * k * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dlam.cos());

        let (px, py) = proj.forward(lon, lat).unwrap();
        assert!((px - x).abs() < 1e-3, "{} vs {}", px, x);
        assert!((py - y).abs() < 1e-3, "{} vs {}", py, y);
    }

    #[test]
    fn test_horizon_angle() {
        // 4000 km up sees roughly 52 degrees around
        let angle = nh().horizon_angle().to_degrees();
        assert!((angle - 52.0).abs() < 1.0, "angle = {}", angle);
    }
}
