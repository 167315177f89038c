//! Wind arrows on a thinned grid.

use projection::ProjectedGrid;
use tiny_skia::{FillRule, PathBuilder, Pixmap, Transform};
use tracing::debug;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};

/// Arrow layout. Lengths follow the quiver convention: a vector of
/// magnitude `scale` spans the full map width.
#[derive(Debug, Clone, PartialEq)]
pub struct QuiverStyle {
    /// Keep every `density`-th row and column
    pub density: usize,
    /// Data units per map width
    pub scale: f64,
    pub color: Color,
    /// Shaft width as a fraction of the map width
    pub shaft_width: f64,
    /// Head width in shaft widths
    pub head_width: f64,
    /// Head length in shaft widths
    pub head_length: f64,
}

impl QuiverStyle {
    /// Thinning and scale used on the wind maps; the world view packs
    /// more grid points per pixel.
    pub fn for_projection(projection: &str) -> Self {
        let (density, scale) = if projection == "world" {
            (20, 6e2)
        } else {
            (5, 4e2)
        };
        Self {
            density,
            scale,
            color: Color::GRAY.with_alpha(0.5),
            shaft_width: 0.0015,
            head_width: 2.0,
            head_length: 4.5,
        }
    }
}

/// Arrow outline from `(x, y)` along `(dx, dy)` pixels.
fn arrow_polygon(x: f64, y: f64, dx: f64, dy: f64, shaft: f64, style: &QuiverStyle) -> Option<Vec<(f64, f64)>> {
    let length = dx.hypot(dy);
    if length < 1e-9 {
        return None;
    }
    let (ux, uy) = (dx / length, dy / length);
    let (nx, ny) = (-uy, ux);

    let head_len = (style.head_length * shaft).min(length);
    let half_shaft = shaft / 2.0;
    let half_head = style.head_width * shaft / 2.0;
    let neck = length - head_len;

    let at = |along: f64, across: f64| {
        (
            x + ux * along + nx * across,
            y + uy * along + ny * across,
        )
    };
    Some(vec![
        at(0.0, -half_shaft),
        at(neck, -half_shaft),
        at(neck, -half_head),
        at(length, 0.0),
        at(neck, half_head),
        at(neck, half_shaft),
        at(0.0, half_shaft),
    ])
}

/// Draw `u`/`v` arrows at every `density`-th grid point on the map. `u`
/// points right and `v` up on the image.
pub fn draw_quiver(
    pixmap: &mut Pixmap,
    grid: &ProjectedGrid,
    u: &[f32],
    v: &[f32],
    map_width: f64,
    style: &QuiverStyle,
) -> RenderResult<usize> {
    for data in [u, v] {
        if data.len() != grid.len() {
            return Err(RenderError::GridMismatch {
                expected: grid.len(),
                actual: data.len(),
            });
        }
    }

    let step = style.density.max(1);
    let px_per_unit = map_width / style.scale;
    let shaft = style.shaft_width * map_width;

    let mut pb = PathBuilder::new();
    let mut arrows = 0usize;
    for j in (0..grid.ny).step_by(step) {
        for i in (0..grid.nx).step_by(step) {
            let idx = j * grid.nx + i;
            let (uu, vv) = (u[idx], v[idx]);
            if !uu.is_finite() || !vv.is_finite() {
                continue;
            }
            let Some((x, y)) = grid.pixel(j, i) else {
                continue;
            };
            let dx = uu as f64 * px_per_unit;
            let dy = -(vv as f64) * px_per_unit;
            if let Some(polygon) = arrow_polygon(x, y, dx, dy, shaft, style) {
                let (x0, y0) = polygon[0];
                pb.move_to(x0 as f32, y0 as f32);
                for &(px, py) in &polygon[1..] {
                    pb.line_to(px as f32, py as f32);
                }
                pb.close();
                arrows += 1;
            }
        }
    }

    if let Some(path) = pb.finish() {
        pixmap.fill_path(
            &path,
            &style.color.paint(true),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
    debug!(arrows, density = step, scale = style.scale, "Drew quiver");
    Ok(arrows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_presets() {
        let nh = QuiverStyle::for_projection("nh");
        assert_eq!((nh.density, nh.scale), (5, 400.0));
        let world = QuiverStyle::for_projection("world");
        assert_eq!((world.density, world.scale), (20, 600.0));
        assert_eq!(world.color.a, 128);
    }

    #[test]
    fn test_arrow_tip() {
        let style = QuiverStyle::for_projection("nh");
        let polygon = arrow_polygon(10.0, 10.0, 30.0, 0.0, 2.0, &style).unwrap();
        assert_eq!(polygon.len(), 7);
        let (tx, ty) = polygon[3];
        assert!((tx - 40.0).abs() < 1e-9 && (ty - 10.0).abs() < 1e-9);
        assert!(arrow_polygon(0.0, 0.0, 0.0, 0.0, 2.0, &style).is_none());
    }
}
