//! Run and validity labels, captions, the colorbar and point values.

use chrono::{DateTime, Utc};
use forecast_common::time::berlin_local;
use forecast_common::BoundingBox;
use grib_loader::Coordinates;
use projection::{PixelRect, ProjectedGrid};
use tiny_skia::{FillRule, PathBuilder, Rect, Stroke, Transform};

use crate::canvas::Canvas;
use crate::color::Color;
use crate::colormap::DiscreteColormap;
use crate::error::{RenderError, RenderResult};
use crate::text::{HAlign, TextStyle, VAlign};

/// Gap between the map edge and a boxed annotation, in pixels.
const ANCHOR_PAD: f32 = 6.0;

/// Corner of the map an annotation is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Location {
    fn anchor(&self, map: &PixelRect, pad: f32) -> (f32, f32, HAlign, VAlign) {
        let (left, right) = (map.x as f32 + pad, map.right() as f32 - pad);
        let (top, bottom) = (map.y as f32 + pad, map.bottom() as f32 - pad);
        match self {
            Location::UpperLeft => (left, top, HAlign::Left, VAlign::Top),
            Location::UpperRight => (right, top, HAlign::Right, VAlign::Top),
            Location::LowerLeft => (left, bottom, HAlign::Left, VAlign::Bottom),
            Location::LowerRight => (right, bottom, HAlign::Right, VAlign::Bottom),
        }
    }
}

/// Boxed free text in a corner of the map.
pub fn annotation(canvas: &mut Canvas, map: &PixelRect, text: &str, loc: Location, fontsize: f32) {
    let pad = ANCHOR_PAD + canvas.points(fontsize) * 0.3;
    let (x, y, halign, valign) = loc.anchor(map, pad);
    canvas.add_text(
        text,
        x,
        y,
        TextStyle::new(fontsize, Color::BLACK)
            .aligned(halign, valign)
            .framed(),
    );
}

pub fn run_label(run: DateTime<Utc>) -> String {
    format!("ECMWF Run {}", run.format("%Y%m%d %H UTC"))
}

pub fn forecast_label(valid: DateTime<Utc>, local: bool) -> String {
    if local {
        format!("Valid {}", berlin_local(valid).format("%A %d %b %Y at %H (Berlin)"))
    } else {
        format!("Forecast for {}", valid.format("%A %d %b %Y at %H UTC"))
    }
}

/// Model run, upper right.
pub fn annotation_run(canvas: &mut Canvas, map: &PixelRect, run: DateTime<Utc>) {
    annotation(canvas, map, &run_label(run), Location::UpperRight, 8.0);
}

/// Validity time, upper left; `local` shows Berlin civil time.
pub fn annotation_forecast(canvas: &mut Canvas, map: &PixelRect, valid: DateTime<Utc>, local: bool) {
    annotation(canvas, map, &forecast_label(valid, local), Location::UpperLeft, 8.0);
}

/// Tick text: integers without decimals, otherwise at most two.
pub fn format_tick(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        let s = format!("{:.2}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Indices of at most `max_ticks` levels, evenly spread, first and last
/// included.
fn tick_indices(n_levels: usize, max_ticks: usize) -> Vec<usize> {
    if n_levels == 0 {
        return Vec::new();
    }
    let every = n_levels.div_ceil(max_ticks.max(2) - 1).max(1);
    let mut ticks: Vec<usize> = (0..n_levels).step_by(every).collect();
    if ticks.last() != Some(&(n_levels - 1)) {
        ticks.push(n_levels - 1);
    }
    ticks
}

/// Horizontal colorbar with an open-ended top bin, drawn on the static
/// background so every later frame of the chunk keeps it.
pub fn draw_colorbar(
    canvas: &mut Canvas,
    rect: &PixelRect,
    cmap: &DiscreteColormap,
    label: &str,
) -> RenderResult<()> {
    let levels = cmap.levels();
    let n_bins = levels.len() - 1;
    let (x0, y0) = (rect.x as f32, rect.y as f32);
    let (w, h) = (rect.width as f32, rect.height as f32);
    let extension = h.min(w / 4.0);
    let bin_width = (w - extension) / n_bins as f32;
    let line_width = canvas.points(0.5);
    let tick_len = h * 0.2;

    let background = canvas.background_mut();
    for (k, color) in cmap.colors()[..n_bins].iter().enumerate() {
        let bin = Rect::from_xywh(x0 + k as f32 * bin_width, y0, bin_width.max(0.5), h)
            .ok_or_else(|| RenderError::Levels(format!("degenerate colorbar bin {}", k)))?;
        background.fill_rect(bin, &color.paint(false), Transform::identity(), None);
    }

    let bar_end = x0 + n_bins as f32 * bin_width;
    let mut tip = PathBuilder::new();
    tip.move_to(bar_end, y0);
    tip.line_to(bar_end + extension, y0 + h / 2.0);
    tip.line_to(bar_end, y0 + h);
    tip.close();
    let tip = tip
        .finish()
        .ok_or_else(|| RenderError::Levels("degenerate colorbar extension".to_string()))?;
    background.fill_path(&tip, &cmap.over_color().paint(true), FillRule::Winding, Transform::identity(), None);

    let mut outline = PathBuilder::new();
    outline.move_to(x0, y0);
    outline.line_to(bar_end, y0);
    outline.line_to(bar_end + extension, y0 + h / 2.0);
    outline.line_to(bar_end, y0 + h);
    outline.line_to(x0, y0 + h);
    outline.close();

    let ticks = tick_indices(levels.len(), 10);
    for &k in &ticks {
        let x = x0 + k as f32 * bin_width;
        outline.move_to(x, y0 + h);
        outline.line_to(x, y0 + h - tick_len);
    }

    let stroke = Stroke {
        width: line_width,
        ..Stroke::default()
    };
    if let Some(path) = outline.finish() {
        background.stroke_path(&path, &Color::BLACK.paint(true), &stroke, Transform::identity(), None);
    }

    let tick_style = TextStyle::new(7.0, Color::BLACK).aligned(HAlign::Center, VAlign::Top);
    let tick_gap = canvas.points(2.0);
    for &k in &ticks {
        let x = x0 + k as f32 * bin_width;
        canvas.add_static_text(format_tick(levels[k]), x, y0 + h + tick_gap, tick_style);
    }
    let label_y = y0 + h + tick_gap + canvas.points(7.0) * 1.4;
    canvas.add_static_text(
        label,
        x0 + w / 2.0,
        label_y,
        TextStyle::new(8.0, Color::BLACK).aligned(HAlign::Center, VAlign::Top),
    );
    Ok(())
}

/// Write values of `values` every `density` grid points inside `bbox`
/// shrunk by 0.15 degrees. Colours come from `cmap` when given (values
/// below the first level take its first colour), white otherwise.
#[allow(clippy::too_many_arguments)]
pub fn add_vals_on_map(
    canvas: &mut Canvas,
    grid: &ProjectedGrid,
    coords: &Coordinates,
    values: &[f32],
    bbox: &BoundingBox,
    density: usize,
    cmap: Option<&DiscreteColormap>,
    fontsize: f32,
) -> RenderResult<usize> {
    if values.len() != grid.len() || coords.len() != grid.len() {
        return Err(RenderError::GridMismatch {
            expected: grid.len(),
            actual: values.len(),
        });
    }

    let inner = bbox.shrink(0.15);
    let rows: Vec<usize> = (0..coords.ny)
        .filter(|&j| {
            let lat = coords.lat_at(j, 0);
            lat >= inner.min_y && lat <= inner.max_y
        })
        .step_by(density.max(1))
        .collect();
    let cols: Vec<usize> = (0..coords.nx)
        .filter(|&i| {
            let lon = coords.lon_at(0, i);
            lon >= inner.min_x && lon <= inner.max_x
        })
        .step_by(density.max(1))
        .collect();

    let mut written = 0;
    for &j in &rows {
        for &i in &cols {
            let value = values[j * coords.nx + i];
            if !value.is_finite() {
                continue;
            }
            let Some((x, y)) = grid.pixel(j, i) else {
                continue;
            };
            let color = match cmap {
                Some(cmap) => cmap
                    .color_for(value as f64)
                    .unwrap_or_else(|| cmap.colors()[0]),
                None => Color::WHITE,
            };
            canvas.add_text(
                format!("{}", value.trunc() as i64),
                x as f32,
                y as f32,
                TextStyle::new(fontsize, color)
                    .aligned(HAlign::Left, VAlign::Bottom)
                    .outlined(Color::WHITE),
            );
            written += 1;
        }
    }
    Ok(written)
}
