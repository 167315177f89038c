//! Level sequences for contour and colorbar bins.

/// Values from `start` in steps of `step`, stopping before `stop`.
///
/// The count is `ceil((stop - start) / step)`, so a `stop` that sits exactly
/// on the sequence is not included.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step == 0.0 || !step.is_finite() {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil();
    if !(n > 0.0) {
        return Vec::new();
    }
    (0..n as usize).map(|i| start + i as f64 * step).collect()
}

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Contour levels every `step` from the truncated minimum up to, but not
/// including, the truncated maximum of the finite values.
pub fn levels_between(values: &[f32], step: f64) -> Vec<f64> {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo > hi {
        return Vec::new();
    }
    arange(lo.trunc() as f64, hi.trunc() as f64, step)
}

/// True when every level is finite and larger than the previous one.
pub fn is_increasing(levels: &[f64]) -> bool {
    levels.iter().all(|l| l.is_finite()) && levels.windows(2).all(|w| w[1] > w[0])
}
