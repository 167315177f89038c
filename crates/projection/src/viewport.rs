//! Placement of the projected map on the output image.

use crate::traits::{Extent, MapProjection};

/// Blank space around the map, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margins {
    /// Height reserved under the map for the horizontal colorbar.
    pub const COLORBAR_BAND: f64 = 70.0;

    pub fn uniform(px: f64) -> Self {
        Self {
            left: px,
            right: px,
            top: px,
            bottom: px,
        }
    }

    /// Layout of the forecast figures: a thin frame and the colorbar band
    /// below the map.
    pub fn figure() -> Self {
        Self {
            bottom: 10.0 + Self::COLORBAR_BAND,
            ..Self::uniform(10.0)
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::figure()
    }
}

/// Pixel rectangle, origin top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive, with a micro-pixel tolerance for points on the edge.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        const TOL: f64 = 1e-6;
        px >= self.x - TOL
            && px <= self.right() + TOL
            && py >= self.y - TOL
            && py <= self.bottom() + TOL
    }
}

/// Maps projected coordinates to image pixels, keeping the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub extent: Extent,
    /// Pixels per projected unit
    pub scale: f64,
    /// Where the map lands on the image
    pub map: PixelRect,
    pub width: u32,
    pub height: u32,
    pub margins: Margins,
}

impl Viewport {
    /// Largest placement of `extent` inside the image minus `margins`,
    /// centred in the free space.
    pub fn fit(extent: Extent, width: u32, height: u32, margins: Margins) -> Self {
        let avail_w = (width as f64 - margins.left - margins.right).max(1.0);
        let avail_h = (height as f64 - margins.top - margins.bottom).max(1.0);
        let scale = (avail_w / extent.width()).min(avail_h / extent.height());

        let map_w = extent.width() * scale;
        let map_h = extent.height() * scale;
        let map = PixelRect {
            x: margins.left + (avail_w - map_w) / 2.0,
            y: margins.top + (avail_h - map_h) / 2.0,
            width: map_w,
            height: map_h,
        };

        Self {
            extent,
            scale,
            map,
            width,
            height,
            margins,
        }
    }

    /// Projected to pixel coordinates; y grows downwards.
    #[inline]
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.map.x + (x - self.extent.min_x) * self.scale,
            self.map.y + (self.extent.max_y - y) * self.scale,
        )
    }

    /// Pixel to projected coordinates.
    #[inline]
    pub fn to_projected(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.extent.min_x + (px - self.map.x) / self.scale,
            self.extent.max_y - (py - self.map.y) / self.scale,
        )
    }

    /// Geographic point straight to pixels, if it is on the map.
    pub fn locate(&self, projection: &dyn MapProjection, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y) = projection.forward_in_region(lon, lat)?;
        Some(self.to_pixel(x, y))
    }

    /// Strip under the map for the colorbar: 60% of the map width, centred.
    pub fn colorbar_rect(&self) -> PixelRect {
        let width = self.map.width * 0.6;
        PixelRect {
            x: self.map.x + (self.map.width - width) / 2.0,
            y: self.map.bottom() + Margins::COLORBAR_BAND * 0.3,
            width,
            height: Margins::COLORBAR_BAND * 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_keeps_aspect_and_flips_y() {
        let extent = Extent::new(0.0, 0.0, 200.0, 100.0);
        let vp = Viewport::fit(extent, 1200, 900, Margins::uniform(0.0));
        assert_eq!(vp.scale, 6.0);
        assert_eq!(vp.map.width, 1200.0);
        assert_eq!(vp.map.height, 600.0);
        // centred vertically
        assert_eq!(vp.map.y, 150.0);

        assert_eq!(vp.to_pixel(0.0, 100.0), (0.0, 150.0));
        assert_eq!(vp.to_pixel(200.0, 0.0), (1200.0, 750.0));
    }

    #[test]
    fn test_to_projected_inverts_to_pixel() {
        let vp = Viewport::fit(Extent::symmetric(5.0e6, 5.0e6), 1200, 900, Margins::figure());
        let (px, py) = vp.to_pixel(1.0e6, -2.0e6);
        let (x, y) = vp.to_projected(px, py);
        assert!((x - 1.0e6).abs() < 1e-3);
        assert!((y + 2.0e6).abs() < 1e-3);
    }

    #[test]
    fn test_figure_leaves_room_for_colorbar() {
        let vp = Viewport::fit(Extent::new(0.0, 0.0, 4.0, 3.0), 1200, 900, Margins::figure());
        let bar = vp.colorbar_rect();
        assert!(vp.map.bottom() <= 900.0 - Margins::COLORBAR_BAND);
        assert!(bar.y > vp.map.bottom());
        assert!(bar.bottom() < 900.0);
    }
}
