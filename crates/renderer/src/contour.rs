//! Filled and line contours on the projected grid.
//!
//! Contours are traced with marching squares in grid index space, joined
//! into polylines, moved to pixels through the [`ProjectedGrid`] and then
//! smoothed. Filled contours colour each grid cell by band, subdividing the
//! cells that straddle a level so band edges follow the data.

use projection::ProjectedGrid;
use rayon::prelude::*;
use tiny_skia::{FillRule, LineCap, LineJoin, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::colormap::DiscreteColormap;
use crate::error::{RenderError, RenderResult};
use crate::text::TextStyle;

/// A point in 2D space (grid index or pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A line segment between two points
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A complete contour line (polyline)
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f32,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Stroke settings for line contours.
#[derive(Debug, Clone)]
pub struct LineStyle {
    /// Line width in pixels
    pub width: f32,
    pub color: Color,
    /// Chaikin passes applied in pixel space
    pub smoothing_passes: u32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            width: 0.7,
            color: Color::BLACK,
            smoothing_passes: 1,
        }
    }
}

/// Marching squares over one level.
///
/// `data` is row-major `width * height`; cells with a NaN corner are
/// skipped. Segment coordinates are in grid index units (x = column,
/// y = row).
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();

    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut cell_index = 0;
            if tl >= level {
                cell_index |= 1;
            }
            if tr >= level {
                cell_index |= 2;
            }
            if br >= level {
                cell_index |= 4;
            }
            if bl >= level {
                cell_index |= 8;
            }

            segments.extend(get_cell_segments(
                cell_index, x as f32, y as f32, tl, tr, br, bl, level,
            ));
        }
    }

    segments
}

#[allow(clippy::too_many_arguments)]
fn get_cell_segments(
    cell_index: u8,
    x: f32,
    y: f32,
    tl: f32,
    tr: f32,
    br: f32,
    bl: f32,
    level: f32,
) -> Vec<Segment> {
    let top = interpolate_edge(x, y, x + 1.0, y, tl, tr, level);
    let right = interpolate_edge(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
    let bottom = interpolate_edge(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
    let left = interpolate_edge(x, y, x, y + 1.0, tl, bl, level);

    let seg = |start: Point, end: Point| Segment { start, end };
    match cell_index {
        0 | 15 => vec![],
        1 | 14 => vec![seg(left, top)],
        2 | 13 => vec![seg(top, right)],
        3 | 12 => vec![seg(left, right)],
        4 | 11 => vec![seg(right, bottom)],
        // saddles: resolved by the cell mean
        5 => {
            if (tl + tr + br + bl) / 4.0 >= level {
                vec![seg(left, bottom), seg(top, right)]
            } else {
                vec![seg(left, top), seg(right, bottom)]
            }
        }
        6 | 9 => vec![seg(top, bottom)],
        7 | 8 => vec![seg(left, bottom)],
        10 => {
            if (tl + tr + br + bl) / 4.0 >= level {
                vec![seg(left, top), seg(right, bottom)]
            } else {
                vec![seg(top, right), seg(left, bottom)]
            }
        }
        _ => vec![],
    }
}

fn interpolate_edge(x1: f32, y1: f32, x2: f32, y2: f32, val1: f32, val2: f32, level: f32) -> Point {
    if (val2 - val1).abs() < 1e-6 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }

    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);
    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Join unordered segments into polylines.
///
/// Lines are grown from both ends, so a polyline is never split just
/// because tracing started in its middle.
pub fn connect_segments(segments: Vec<Segment>, level: f32) -> Vec<Contour> {
    const EPSILON: f32 = 1e-3;

    let mut contours = Vec::new();
    let mut used = vec![false; segments.len()];

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }
        used[start_idx] = true;
        let mut points = std::collections::VecDeque::from(vec![
            segments[start_idx].start,
            segments[start_idx].end,
        ]);

        for at_back in [true, false] {
            loop {
                let end = if at_back { points.back() } else { points.front() };
                let Some(&end) = end else { break };

                let next = segments.iter().enumerate().find_map(|(i, seg)| {
                    if used[i] {
                        None
                    } else if seg.start.distance(&end) < EPSILON {
                        Some((i, seg.end))
                    } else if seg.end.distance(&end) < EPSILON {
                        Some((i, seg.start))
                    } else {
                        None
                    }
                });

                match next {
                    Some((i, p)) => {
                        used[i] = true;
                        if at_back {
                            points.push_back(p);
                        } else {
                            points.push_front(p);
                        }
                    }
                    None => break,
                }
            }
        }

        let points: Vec<Point> = points.into_iter().collect();
        let closed = match (points.first(), points.last()) {
            (Some(a), Some(b)) => points.len() > 2 && a.distance(b) < EPSILON,
            _ => false,
        };
        contours.push(Contour {
            level,
            points,
            closed,
        });
    }

    contours
}

/// Chaikin's corner cutting.
pub fn smooth_contour(contour: &Contour, iterations: u32) -> Contour {
    if iterations == 0 || contour.points.len() < 3 {
        return contour.clone();
    }

    let mut points = contour.points.clone();

    for _ in 0..iterations {
        let n = points.len();
        let mut new_points = Vec::with_capacity(n * 2 + 2);

        if !contour.closed {
            new_points.push(points[0]);
        }
        let edges = if contour.closed { n } else { n - 1 };
        for i in 0..edges {
            let p1 = points[i];
            let p2 = points[(i + 1) % n];
            new_points.push(Point::new(0.75 * p1.x + 0.25 * p2.x, 0.75 * p1.y + 0.25 * p2.y));
            new_points.push(Point::new(0.25 * p1.x + 0.75 * p2.x, 0.25 * p1.y + 0.75 * p2.y));
        }
        if !contour.closed {
            new_points.push(points[n - 1]);
        }

        points = new_points;
    }

    Contour {
        level: contour.level,
        points,
        closed: contour.closed,
    }
}

/// Bilinear position of fractional grid coordinates on the image.
fn grid_to_pixel(grid: &ProjectedGrid, p: Point) -> Option<Point> {
    if grid.nx < 2 || grid.ny < 2 {
        return None;
    }
    let i0 = (p.x.max(0.0).floor() as usize).min(grid.nx - 2);
    let j0 = (p.y.max(0.0).floor() as usize).min(grid.ny - 2);
    let tx = (p.x - i0 as f32) as f64;
    let ty = (p.y - j0 as f32) as f64;

    let (x00, y00) = grid.pixel(j0, i0)?;
    let (x01, y01) = grid.pixel(j0, i0 + 1)?;
    let (x10, y10) = grid.pixel(j0 + 1, i0)?;
    let (x11, y11) = grid.pixel(j0 + 1, i0 + 1)?;

    let bilinear = |a: f64, b: f64, c: f64, d: f64| {
        a * (1.0 - tx) * (1.0 - ty) + b * tx * (1.0 - ty) + c * (1.0 - tx) * ty + d * tx * ty
    };
    let x = bilinear(x00, x01, x10, x11);
    let y = bilinear(y00, y01, y10, y11);
    (x.is_finite() && y.is_finite()).then(|| Point::new(x as f32, y as f32))
}

/// Move a grid-space contour to pixels, splitting it where a point has no
/// position on the map.
fn contour_to_pixels(contour: &Contour, grid: &ProjectedGrid) -> Vec<Contour> {
    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut broken = false;

    for p in &contour.points {
        match grid_to_pixel(grid, *p) {
            Some(px) => current.push(px),
            None => {
                broken = true;
                if current.len() >= 2 {
                    pieces.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
        }
    }
    if current.len() >= 2 {
        pieces.push(current);
    }

    pieces
        .into_iter()
        .map(|points| Contour {
            level: contour.level,
            points,
            closed: contour.closed && !broken,
        })
        .collect()
}

/// Line contours of `data` for each level, in pixel coordinates.
pub fn line_contours(
    data: &[f32],
    grid: &ProjectedGrid,
    levels: &[f64],
    smoothing_passes: u32,
) -> RenderResult<Vec<Contour>> {
    if data.len() != grid.len() {
        return Err(RenderError::GridMismatch {
            expected: grid.len(),
            actual: data.len(),
        });
    }

    let contours: Vec<Contour> = levels
        .par_iter()
        .flat_map_iter(|&level| {
            let level = level as f32;
            let segments = march_squares(data, grid.nx, grid.ny, level);
            connect_segments(segments, level)
                .into_iter()
                .flat_map(|c| contour_to_pixels(&c, grid))
                .map(|c| smooth_contour(&c, smoothing_passes))
                .collect::<Vec<_>>()
        })
        .collect();

    debug!(
        levels = levels.len(),
        contours = contours.len(),
        points = contours.iter().map(|c| c.points.len()).sum::<usize>(),
        "Traced line contours"
    );
    Ok(contours)
}

/// Where a contour label goes.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPosition {
    pub x: f32,
    pub y: f32,
    pub level: f32,
}

fn contour_length(contour: &Contour) -> f32 {
    contour
        .points
        .windows(2)
        .map(|w| w[0].distance(&w[1]))
        .sum()
}

/// Label anchors spread along each contour every `spacing` pixels, kept
/// `margin` away from the image edges and `min_distance` from each other.
pub fn place_labels(
    contours: &[Contour],
    spacing: f32,
    margin: f32,
    min_distance: f32,
    width: u32,
    height: u32,
) -> Vec<LabelPosition> {
    let mut positions: Vec<LabelPosition> = Vec::new();
    let (w, h) = (width as f32, height as f32);

    for contour in contours {
        let total_length = contour_length(contour);
        if total_length < spacing * 0.5 {
            continue;
        }

        let num_labels = ((total_length / spacing).floor() as usize).max(1);
        let step = total_length / (num_labels as f32 + 1.0);
        let mut accumulated = 0.0;
        let mut next_at = step;
        let mut placed = 0;

        for pair in contour.points.windows(2) {
            if placed >= num_labels {
                break;
            }
            let (p1, p2) = (pair[0], pair[1]);
            let seg_len = p1.distance(&p2);

            while seg_len > 0.0 && accumulated + seg_len >= next_at && placed < num_labels {
                let t = (next_at - accumulated) / seg_len;
                let x = p1.x + t * (p2.x - p1.x);
                let y = p1.y + t * (p2.y - p1.y);

                let inside = x > margin && x < w - margin && y > margin && y < h - margin;
                let crowded = positions
                    .iter()
                    .any(|p| (p.x - x).powi(2) + (p.y - y).powi(2) < min_distance * min_distance);
                if inside && !crowded {
                    positions.push(LabelPosition {
                        x,
                        y,
                        level: contour.level,
                    });
                }

                next_at += step;
                placed += 1;
            }
            accumulated += seg_len;
        }
    }

    positions
}

/// Contour label text, `%4.0f` without the padding.
pub fn format_level(level: f32) -> String {
    format!("{:4.0}", level).trim().to_string()
}

/// Queue the level text of each label on the current frame.
pub fn render_labels(canvas: &mut Canvas, labels: &[LabelPosition], fontsize: f32, color: Color) {
    let style = TextStyle::new(fontsize, color);
    for label in labels {
        canvas.add_text(format_level(label.level), label.x, label.y, style);
    }
}

/// Stroke contours, leaving a gap of `gap` pixels around the labels of the
/// same level so the text sits inline.
pub fn stroke_contours(
    pixmap: &mut Pixmap,
    contours: &[Contour],
    style: &LineStyle,
    labels: &[LabelPosition],
    gap: f32,
) {
    let paint = style.color.paint(true);
    let mut stroke = Stroke::default();
    stroke.width = style.width;
    stroke.line_cap = LineCap::Round;
    stroke.line_join = LineJoin::Round;

    let mut pb = PathBuilder::new();
    for contour in contours {
        let hidden = |p: &Point| {
            labels.iter().any(|l| {
                l.level == contour.level && (l.x - p.x).powi(2) + (l.y - p.y).powi(2) < gap * gap
            })
        };

        let mut pen_down = false;
        let mut drawn = 0usize;
        for p in &contour.points {
            if hidden(p) {
                pen_down = false;
                continue;
            }
            if pen_down {
                pb.line_to(p.x, p.y);
            } else {
                pb.move_to(p.x, p.y);
                pen_down = true;
            }
            drawn += 1;
        }
        if contour.closed && drawn == contour.points.len() {
            pb.close();
        }
    }

    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

/// Corners of a sub-cell quad and its band.
type BandQuad = (usize, [Point; 4]);

/// Most sub-cells a grid cell is split into along each side.
const MAX_SUBDIVISIONS: usize = 8;

/// Fill the cells of `data` with the colour of their band. Values below the
/// first level stay unfilled.
pub fn fill_contours(
    pixmap: &mut Pixmap,
    data: &[f32],
    grid: &ProjectedGrid,
    cmap: &DiscreteColormap,
) -> RenderResult<()> {
    if data.len() != grid.len() {
        return Err(RenderError::GridMismatch {
            expected: grid.len(),
            actual: data.len(),
        });
    }
    if grid.nx < 2 || grid.ny < 2 {
        return Ok(());
    }

    let (nx, ny) = (grid.nx, grid.ny);
    let rows: Vec<Vec<BandQuad>> = (0..ny - 1)
        .into_par_iter()
        .map(|j| {
            let mut quads = Vec::new();
            for i in 0..nx - 1 {
                cell_quads(data, grid, cmap, j, i, &mut quads);
            }
            quads
        })
        .collect();

    let mut builders: Vec<PathBuilder> = (0..cmap.len()).map(|_| PathBuilder::new()).collect();
    let mut quads = 0usize;
    for (band, [a, b, c, d]) in rows.into_iter().flatten() {
        let pb = &mut builders[band];
        pb.move_to(a.x, a.y);
        pb.line_to(b.x, b.y);
        pb.line_to(c.x, c.y);
        pb.line_to(d.x, d.y);
        pb.close();
        quads += 1;
    }

    for (band, pb) in builders.into_iter().enumerate() {
        if let Some(path) = pb.finish() {
            let paint = cmap.colors()[band].paint(false);
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    debug!(quads, bands = cmap.len(), "Filled contours");
    Ok(())
}

fn cell_quads(
    data: &[f32],
    grid: &ProjectedGrid,
    cmap: &DiscreteColormap,
    j: usize,
    i: usize,
    out: &mut Vec<BandQuad>,
) {
    let nx = grid.nx;
    let v = [
        data[j * nx + i],
        data[j * nx + i + 1],
        data[(j + 1) * nx + i],
        data[(j + 1) * nx + i + 1],
    ];
    if v.iter().any(|x| x.is_nan()) {
        return;
    }
    let corners = match (
        grid.pixel(j, i),
        grid.pixel(j, i + 1),
        grid.pixel(j + 1, i),
        grid.pixel(j + 1, i + 1),
    ) {
        (Some(a), Some(b), Some(c), Some(d)) => [a, b, c, d],
        _ => return,
    };

    let bands = v.map(|x| cmap.band(x as f64));
    let at = |tx: f64, ty: f64| -> Point {
        let [(x00, y00), (x01, y01), (x10, y10), (x11, y11)] = corners;
        let w = [(1.0 - tx) * (1.0 - ty), tx * (1.0 - ty), (1.0 - tx) * ty, tx * ty];
        Point::new(
            (x00 * w[0] + x01 * w[1] + x10 * w[2] + x11 * w[3]) as f32,
            (y00 * w[0] + y01 * w[1] + y10 * w[2] + y11 * w[3]) as f32,
        )
    };

    if bands.iter().all(|b| *b == bands[0]) {
        if let Some(band) = bands[0] {
            out.push((band, [at(0.0, 0.0), at(1.0, 0.0), at(1.0, 1.0), at(0.0, 1.0)]));
        }
        return;
    }

    let (x00, y00) = corners[0];
    let (x11, y11) = corners[3];
    let diagonal = (x11 - x00).hypot(y11 - y00);
    let k = ((diagonal / 1.5).ceil() as usize).clamp(2, MAX_SUBDIVISIONS);
    let kf = k as f64;

    for b in 0..k {
        for a in 0..k {
            let (tx, ty) = ((a as f64 + 0.5) / kf, (b as f64 + 0.5) / kf);
            let value = (v[0] as f64) * (1.0 - tx) * (1.0 - ty)
                + (v[1] as f64) * tx * (1.0 - ty)
                + (v[2] as f64) * (1.0 - tx) * ty
                + (v[3] as f64) * tx * ty;
            if let Some(band) = cmap.band(value) {
                let (t0x, t1x) = (a as f64 / kf, (a + 1) as f64 / kf);
                let (t0y, t1y) = (b as f64 / kf, (b + 1) as f64 / kf);
                out.push((
                    band,
                    [at(t0x, t0y), at(t1x, t0y), at(t1x, t1y), at(t0x, t1y)],
                ));
            }
        }
    }
}
