//! Finite differences on non-uniform spacing.

/// How the two end points of an axis are differentiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOrder {
    /// One-sided two-point difference
    First,
    /// One-sided three-point difference
    Second,
}

/// First derivative of `values` where `deltas[k]` is the distance from point
/// `k` to point `k + 1`.
///
/// Interior points use the three-point central difference for unequal
/// spacing, exact for quadratics. Needs at least 2 points for
/// [`EdgeOrder::First`] and 3 for [`EdgeOrder::Second`]; shorter input
/// yields NaN.
pub fn first_derivative(values: &[f64], deltas: &[f64], edge: EdgeOrder) -> Vec<f64> {
    let n = values.len();
    let min_points = match edge {
        EdgeOrder::First => 2,
        EdgeOrder::Second => 3,
    };
    if n < min_points || deltas.len() + 1 != n {
        return vec![f64::NAN; n];
    }

    let mut out = vec![0.0; n];
    for k in 1..n.saturating_sub(1) {
        let h1 = deltas[k - 1];
        let h2 = deltas[k];
        out[k] = -h2 / (h1 * (h1 + h2)) * values[k - 1]
            + (h2 - h1) / (h1 * h2) * values[k]
            + h1 / (h2 * (h1 + h2)) * values[k + 1];
    }

    match edge {
        EdgeOrder::First => {
            out[0] = (values[1] - values[0]) / deltas[0];
            out[n - 1] = (values[n - 1] - values[n - 2]) / deltas[n - 2];
        }
        EdgeOrder::Second => {
            let (h1, h2) = (deltas[0], deltas[1]);
            out[0] = -(2.0 * h1 + h2) / (h1 * (h1 + h2)) * values[0]
                + (h1 + h2) / (h1 * h2) * values[1]
                - h1 / (h2 * (h1 + h2)) * values[2];

            let (h1, h2) = (deltas[n - 3], deltas[n - 2]);
            out[n - 1] = h2 / (h1 * (h1 + h2)) * values[n - 3]
                - (h1 + h2) / (h1 * h2) * values[n - 2]
                + (h1 + 2.0 * h2) / (h2 * (h1 + h2)) * values[n - 1];
        }
    }
    out
}

/// Derivative along x of a row-major `ny * nx` plane; `dx` is `ny * (nx - 1)`.
pub fn derivative_x(plane: &[f64], dx: &[f64], nx: usize, ny: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; nx * ny];
    if nx < 2 {
        return out;
    }
    for j in 0..ny {
        let row = &plane[j * nx..(j + 1) * nx];
        let deltas = &dx[j * (nx - 1)..(j + 1) * (nx - 1)];
        out[j * nx..(j + 1) * nx].copy_from_slice(&first_derivative(row, deltas, EdgeOrder::Second));
    }
    out
}

/// Derivative along y of a row-major `ny * nx` plane; `dy` is `(ny - 1) * nx`.
pub fn derivative_y(plane: &[f64], dy: &[f64], nx: usize, ny: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; nx * ny];
    if ny < 2 {
        return out;
    }
    let mut column = vec![0.0; ny];
    let mut deltas = vec![0.0; ny - 1];
    for i in 0..nx {
        for j in 0..ny {
            column[j] = plane[j * nx + i];
        }
        for j in 0..ny - 1 {
            deltas[j] = dy[j * nx + i];
        }
        for (j, d) in first_derivative(&column, &deltas, EdgeOrder::Second)
            .into_iter()
            .enumerate()
        {
            out[j * nx + i] = d;
        }
    }
    out
}

/// Differences between consecutive coordinate values.
pub fn diffs(coord: &[f64]) -> Vec<f64> {
    coord.windows(2).map(|w| w[1] - w[0]).collect()
}
