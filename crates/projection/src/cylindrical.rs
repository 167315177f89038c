//! Cylindrical projections for regional maps.

use forecast_common::BoundingBox;
use grib_loader::normalize_longitude;

use crate::traits::{Extent, MapProjection};
use crate::SPHERE_RADIUS_M;

/// Miller cylindrical projection cut to a bounding box, centred on the
/// middle of its longitude range.
#[derive(Debug, Clone)]
pub struct Miller {
    pub bbox: BoundingBox,
    pub lon_0: f64,
    pub radius: f64,
}

impl Miller {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            lon_0: bbox.center_lon(),
            radius: SPHERE_RADIUS_M,
        }
    }

    fn y(&self, lat: f64) -> f64 {
        let phi = lat.to_radians();
        self.radius * 1.25 * (std::f64::consts::FRAC_PI_4 + 0.4 * phi).tan().ln()
    }

    fn x(&self, lon: f64) -> f64 {
        self.radius * normalize_longitude(lon - self.lon_0).to_radians()
    }
}

impl MapProjection for Miller {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some((self.x(lon), self.y(lat)))
    }

    fn extent(&self) -> Extent {
        let half = self.radius * (self.bbox.width() / 2.0).to_radians();
        Extent::new(-half, self.y(self.bbox.min_y), half, self.y(self.bbox.max_y))
    }
}

/// Equidistant cylindrical projection in plain degrees.
#[derive(Debug, Clone)]
pub struct PlateCarree {
    pub bbox: BoundingBox,
}

impl PlateCarree {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }
}

impl MapProjection for PlateCarree {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        // keep the longitude on the same branch as the bounding box
        let lon = self.bbox.center_lon() + normalize_longitude(lon - self.bbox.center_lon());
        Some((lon, lat))
    }

    fn extent(&self) -> Extent {
        Extent::new(self.bbox.min_x, self.bbox.min_y, self.bbox.max_x, self.bbox.max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn euratl() -> BoundingBox {
        BoundingBox::new(-23.5, 29.5, 45.0, 70.5)
    }

    #[test]
    fn test_miller_stretches_towards_poles() {
        let proj = Miller::new(euratl());
        let (_, y40) = proj.forward(10.0, 40.0).unwrap();
        let (_, y50) = proj.forward(10.0, 50.0).unwrap();
        let (_, y60) = proj.forward(10.0, 60.0).unwrap();
        assert!(y60 - y50 > y50 - y40);
        assert_eq!(proj.forward(0.0, 0.0).map(|p| p.1), Some(0.0));
    }

    #[test]
    fn test_miller_extent_matches_corners() {
        let proj = Miller::new(euratl());
        let extent = proj.extent();
        let (x0, y0) = proj.forward(-23.5, 29.5).unwrap();
        let (x1, y1) = proj.forward(45.0, 70.5).unwrap();
        assert!((extent.min_x - x0).abs() < 1e-6);
        assert!((extent.max_x - x1).abs() < 1e-6);
        assert!((extent.min_y - y0).abs() < 1e-6);
        assert!((extent.max_y - y1).abs() < 1e-6);
    }

    #[test]
    fn test_plate_carree_is_identity_inside_bbox() {
        let proj = PlateCarree::new(BoundingBox::new(5.0, 46.5, 16.0, 56.0));
        assert_eq!(proj.forward(10.0, 50.0), Some((10.0, 50.0)));
        assert!(proj.forward_in_region(16.0, 56.0).is_some());
        assert!(proj.forward_in_region(20.0, 50.0).is_none());
    }

    #[test]
    fn test_plate_carree_wraps_to_bbox_branch() {
        let proj = PlateCarree::new(BoundingBox::new(-102.66, 20.84, -77.61, 36.74));
        let (x, _) = proj.forward(270.0, 30.0).unwrap();
        assert!((x + 90.0).abs() < 1e-9);
    }
}
