//! Relative maxima and minima of a field, marked with `H` and `L`.
//!
//! A point is an extremum when it equals the maximum (or minimum) of the
//! `window` x `window` box around it. Borders are extended with the nearest
//! value and points on the first row or column are never reported. Adding a
//! little Gaussian noise first breaks up plateaus that would otherwise
//! produce a cluster of identical markers.

use std::collections::VecDeque;

use projection::ProjectedGrid;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::debug;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::text::{HAlign, TextStyle, VAlign};

/// Window side used on the forecast maps.
pub const DEFAULT_WINDOW: usize = 60;

/// Standard deviation of the noise added before the search.
pub const DEFAULT_JITTER: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

impl Extremum {
    #[inline]
    fn better(&self, a: f32, b: f32) -> bool {
        match self {
            Extremum::Max => a >= b,
            Extremum::Min => a <= b,
        }
    }

    fn worst(&self) -> f32 {
        match self {
            Extremum::Max => f32::NEG_INFINITY,
            Extremum::Min => f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremumPoint {
    pub row: usize,
    pub col: usize,
    /// Value at the point, after jitter
    pub value: f32,
}

/// Sliding window extreme over one line, window `[i - size/2, i + (size-1)/2]`
/// clamped to the line ends.
fn filter_line(line: &[f32], size: usize, kind: Extremum, out: &mut [f32]) {
    let n = line.len();
    if n == 0 {
        return;
    }
    let before = size / 2;
    let after = (size - 1) / 2;
    let value = |k: usize| {
        let v = line[k];
        if v.is_nan() {
            kind.worst()
        } else {
            v
        }
    };

    // monotonic deque of indices into `line`
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut next = 0usize;
    for (i, slot) in out.iter_mut().enumerate() {
        let hi = (i + after).min(n - 1);
        while next <= hi {
            let v = value(next);
            while window.back().is_some_and(|&b| kind.better(v, value(b))) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(before);
        while window.front().is_some_and(|&f| f < lo) {
            window.pop_front();
        }
        *slot = window.front().map_or(kind.worst(), |&f| value(f));
    }
}

/// Separable `size` x `size` extreme filter with nearest-value borders.
pub fn extreme_filter(data: &[f32], nx: usize, ny: usize, size: usize, kind: Extremum) -> Vec<f32> {
    let size = size.max(1);

    let mut rows = vec![0.0f32; nx * ny];
    rows.par_chunks_mut(nx)
        .zip(data.par_chunks(nx))
        .for_each(|(out, line)| filter_line(line, size, kind, out));

    let columns: Vec<Vec<f32>> = (0..nx)
        .into_par_iter()
        .map(|i| {
            let line: Vec<f32> = (0..ny).map(|j| rows[j * nx + i]).collect();
            let mut out = vec![0.0f32; ny];
            filter_line(&line, size, kind, &mut out);
            out
        })
        .collect();

    let mut result = vec![0.0f32; nx * ny];
    for (i, column) in columns.iter().enumerate() {
        for (j, v) in column.iter().enumerate() {
            result[j * nx + i] = *v;
        }
    }
    result
}

/// Add N(0, `sigma`) noise to every finite value.
pub fn jitter<R: Rng + ?Sized>(data: &[f32], sigma: f64, rng: &mut R) -> RenderResult<Vec<f32>> {
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| RenderError::Levels(format!("invalid jitter sigma {}: {}", sigma, e)))?;
    Ok(data
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (v as f64 + normal.sample(rng)) as f32
            } else {
                v
            }
        })
        .collect())
}

/// Locate the extrema of `data` (row-major `nx * ny`).
pub fn find_extrema<R: Rng + ?Sized>(
    data: &[f32],
    nx: usize,
    ny: usize,
    window: usize,
    kind: Extremum,
    jitter_sigma: Option<f64>,
    rng: &mut R,
) -> RenderResult<Vec<ExtremumPoint>> {
    if data.len() != nx * ny {
        return Err(RenderError::GridMismatch {
            expected: nx * ny,
            actual: data.len(),
        });
    }

    let values = match jitter_sigma {
        Some(sigma) => jitter(data, sigma, rng)?,
        None => data.to_vec(),
    };
    let filtered = extreme_filter(&values, nx, ny, window, kind);

    let points: Vec<ExtremumPoint> = (1..ny)
        .flat_map(|row| (1..nx).map(move |col| (row, col)))
        .filter_map(|(row, col)| {
            let idx = row * nx + col;
            let v = values[idx];
            (v.is_finite() && filtered[idx] == v).then_some(ExtremumPoint {
                row,
                col,
                value: v,
            })
        })
        .collect();

    debug!(?kind, window, found = points.len(), "Located extrema");
    Ok(points)
}

/// Put `symbol` on every extremum, with its truncated value in gray below.
pub fn draw_extrema(
    canvas: &mut Canvas,
    grid: &ProjectedGrid,
    points: &[ExtremumPoint],
    symbol: &str,
    color: Color,
) {
    let gap = canvas.points(15.0) / 2.0;
    for point in points {
        let Some((x, y)) = grid.pixel(point.row, point.col) else {
            continue;
        };
        let (x, y) = (x as f32, y as f32);
        canvas.add_text(
            symbol,
            x,
            y,
            TextStyle::new(15.0, color).outlined(Color::BLACK),
        );
        canvas.add_text(
            format!("{}", point.value.trunc() as i64),
            x,
            y + gap,
            TextStyle::new(10.0, Color::GRAY).aligned(HAlign::Center, VAlign::Top),
        );
    }
}

/// Symbol and colour used for each kind on the maps.
pub fn marker(kind: Extremum) -> (&'static str, Color) {
    match kind {
        Extremum::Max => ("H", Color::ROYALBLUE),
        Extremum::Min => ("L", Color::CORAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_filter_line_window() {
        let line = [1.0, 5.0, 2.0, 0.0, 3.0];
        let mut out = [0.0; 5];
        filter_line(&line, 3, Extremum::Max, &mut out);
        assert_eq!(out, [5.0, 5.0, 5.0, 3.0, 3.0]);
        filter_line(&line, 3, Extremum::Min, &mut out);
        assert_eq!(out, [1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_even_window_is_shifted_back() {
        // size 2 covers [i - 1, i]
        let line = [4.0, 1.0, 2.0];
        let mut out = [0.0; 3];
        filter_line(&line, 2, Extremum::Max, &mut out);
        assert_eq!(out, [4.0, 4.0, 2.0]);
    }

    #[test]
    fn test_nan_is_never_extreme() {
        let line = [f32::NAN, 1.0, f32::NAN];
        let mut out = [0.0; 3];
        filter_line(&line, 3, Extremum::Min, &mut out);
        assert_eq!(out, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_border_points_excluded() {
        // maximum sits in the first row
        #[rustfmt::skip]
        let data = vec![
            9.0, 1.0, 1.0,
            1.0, 1.0, 1.0,
            1.0, 1.0, 2.0,
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let found = find_extrema(&data, 3, 3, 3, Extremum::Max, None, &mut rng).unwrap();
        assert!(found.iter().all(|p| p.row > 0 && p.col > 0));
        assert!(found.iter().any(|p| p.row == 2 && p.col == 2));
    }

    #[test]
    fn test_jitter_keeps_nan() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = jitter(&[1000.0, f32::NAN], 0.2, &mut rng).unwrap();
        assert!(out[1].is_nan());
        assert!((out[0] - 1000.0).abs() < 2.0);
    }
}
