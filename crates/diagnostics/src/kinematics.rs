//! Wind speed and potential vorticity.

use forecast_common::{ForecastError, ForecastResult, Units};
use grib_loader::{Dataset, Field};
use rayon::prelude::*;
use tracing::debug;

use crate::constants::{GRAVITY, OMEGA};
use crate::derivative::{derivative_x, derivative_y, diffs, first_derivative, EdgeOrder};
use crate::spacing::GridSpacing;

/// Add `wind_speed` in km/h from the `uvar`/`vvar` components.
pub fn compute_wind_speed(dataset: &Dataset, uvar: &str, vvar: &str) -> ForecastResult<Dataset> {
    let u = dataset.field(uvar)?;
    let v = dataset.field(vvar)?;
    if u.data.len() != v.data.len() {
        return Err(ForecastError::shape_mismatch(u.data.len(), v.data.len()));
    }

    let to_ms = u.units.transform_to(&Units::MetrePerSecond)?;
    let to_kph = Units::MetrePerSecond.transform_to(&Units::KilometrePerHour)?;
    let data: Vec<f32> = u
        .data
        .par_iter()
        .zip(v.data.par_iter())
        .map(|(&u, &v)| {
            let (u, v) = (to_ms.apply(u), to_ms.apply(v));
            to_kph.apply((u * u + v * v).sqrt())
        })
        .collect();

    let speed = Field::new("wind_speed", Units::KilometrePerHour, u.has_level, data)
        .with_attr("standard_name", "wind intensity");
    dataset.with_field(speed)
}

fn level_plane(field: &Field, level: usize, plane: usize) -> Vec<f64> {
    field.data[level * plane..(level + 1) * plane]
        .iter()
        .map(|&v| v as f64)
        .collect()
}

/// Add `pv`, the baroclinic potential vorticity in PVU:
///
/// `-g (du/dp dθ/dy - dv/dp dθ/dx + (ζ + f) dθ/dp)`
///
/// Needs `theta`, `u` and `v` on at least three pressure levels and exactly
/// one forecast step; call it on a time slice.
pub fn compute_pv(dataset: &Dataset, spacing: &GridSpacing) -> ForecastResult<Dataset> {
    if dataset.n_steps() != 1 {
        return Err(ForecastError::InvalidInput(format!(
            "potential vorticity needs a single time step, got {}",
            dataset.n_steps()
        )));
    }
    if dataset.levels.len() < 3 {
        return Err(ForecastError::InvalidInput(format!(
            "potential vorticity needs at least 3 pressure levels, got {}",
            dataset.levels.len()
        )));
    }
    let (nx, ny) = (dataset.nx(), dataset.ny());
    if (spacing.nx, spacing.ny) != (nx, ny) {
        return Err(ForecastError::shape_mismatch((nx, ny), (spacing.nx, spacing.ny)));
    }

    let theta = dataset.field("theta")?;
    let u = dataset.field("u")?;
    let v = dataset.field("v")?;
    for field in [theta, u, v] {
        if !field.has_level {
            return Err(ForecastError::InvalidInput(format!(
                "{} has no level axis",
                field.name
            )));
        }
    }

    let plane = dataset.plane_len();
    let n_levels = dataset.levels.len();
    let pressure_pa: Vec<f64> = dataset.levels.iter().map(|p| p * 100.0).collect();
    let dp = diffs(&pressure_pa);

    // Horizontal terms, one level at a time
    let horizontal: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> = (0..n_levels)
        .into_par_iter()
        .map(|k| {
            let th = level_plane(theta, k, plane);
            let uu = level_plane(u, k, plane);
            let vv = level_plane(v, k, plane);
            let dthdx = derivative_x(&th, &spacing.dx, nx, ny);
            let dthdy = derivative_y(&th, &spacing.dy, nx, ny);
            let dvdx = derivative_x(&vv, &spacing.dx, nx, ny);
            let dudy = derivative_y(&uu, &spacing.dy, nx, ny);
            let abs_vort: Vec<f64> = (0..plane)
                .map(|idx| {
                    let f = 2.0 * OMEGA * dataset.coords.lat[idx].to_radians().sin();
                    dvdx[idx] - dudy[idx] + f
                })
                .collect();
            (dthdx, dthdy, abs_vort)
        })
        .collect();

    let mut pv = vec![f32::NAN; n_levels * plane];
    let column = |field: &Field, idx: usize| -> Vec<f64> {
        (0..n_levels).map(|k| field.data[k * plane + idx] as f64).collect()
    };

    for idx in 0..plane {
        let dthdp = first_derivative(&column(theta, idx), &dp, EdgeOrder::Second);
        let dudp = first_derivative(&column(u, idx), &dp, EdgeOrder::Second);
        let dvdp = first_derivative(&column(v, idx), &dp, EdgeOrder::Second);
        for k in 0..n_levels {
            let (dthdx, dthdy, abs_vort) = &horizontal[k];
            let value = -GRAVITY
                * (dudp[k] * dthdy[idx] - dvdp[k] * dthdx[idx] + abs_vort[idx] * dthdp[k]);
            // K m2 kg-1 s-1 -> PVU
            pv[k * plane + idx] = (value * 1.0e6) as f32;
        }
    }

    debug!(levels = n_levels, nx, ny, "Computed potential vorticity");
    let pv = Field::new("pv", Units::Pvu, true, pv)
        .with_attr("standard_name", "Potential Vorticity");
    dataset.with_field(pv)
}
