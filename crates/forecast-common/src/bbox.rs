//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// `min_x`/`max_x` are longitudes, `min_y`/`max_y` latitudes, matching the
/// lower-left / upper-right corner convention of the projection table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center longitude, used as the reference meridian of cylindrical maps.
    pub fn center_lon(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_x && lon <= self.max_x && lat >= self.min_y && lat <= self.max_y
    }

    /// Shrink every edge inwards by `margin` degrees.
    pub fn shrink(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x + margin,
            min_y: self.min_y + margin,
            max_x: self.max_x - margin,
            max_y: self.max_y - margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_inclusive() {
        let bbox = BoundingBox::new(5.0, 46.5, 16.0, 56.0);
        assert!(bbox.contains_point(5.0, 46.5));
        assert!(bbox.contains_point(16.0, 56.0));
        assert!(!bbox.contains_point(4.99, 50.0));
    }

    #[test]
    fn test_shrink() {
        let bbox = BoundingBox::new(6.0, 36.0, 19.0, 48.0).shrink(0.15);
        assert!((bbox.min_x - 6.15).abs() < 1e-12);
        assert!((bbox.max_y - 47.85).abs() < 1e-12);
        assert!((bbox.center_lon() - 12.5).abs() < 1e-12);
    }
}
