//! Thermodynamic diagnostics.

use forecast_common::{ForecastError, ForecastResult, Units};
use grib_loader::{Dataset, Field};
use rayon::prelude::*;

use crate::constants::{EPSILON, KAPPA, P0_HPA, THETAE_LEVEL_HPA, ZERO_CELSIUS};

/// Potential temperature (K) of air at `t_k` and `p_hpa`.
pub fn potential_temperature(p_hpa: f64, t_k: f64) -> f64 {
    t_k * (P0_HPA / p_hpa).powf(KAPPA)
}

/// Saturation vapour pressure (hPa) over water, Magnus form.
pub fn saturation_vapor_pressure(t_k: f64) -> f64 {
    let tc = t_k - ZERO_CELSIUS;
    6.112 * (17.67 * tc / (tc + 243.5)).exp()
}

/// Dew point (K) from temperature (K) and relative humidity (fraction).
pub fn dewpoint_from_relative_humidity(t_k: f64, rh: f64) -> f64 {
    let e = rh * saturation_vapor_pressure(t_k);
    let ln = (e / 6.112).ln();
    243.5 * ln / (17.67 - ln) + ZERO_CELSIUS
}

/// Equivalent potential temperature (K) after Bolton (1980).
pub fn equivalent_potential_temperature(p_hpa: f64, t_k: f64, td_k: f64) -> f64 {
    let e = saturation_vapor_pressure(td_k);
    let r = EPSILON * e / (p_hpa - e);
    let t_l = 56.0 + 1.0 / (1.0 / (td_k - 56.0) + (t_k / td_k).ln() / 800.0);
    let th_l = potential_temperature(p_hpa - e, t_k) * (t_k / t_l).powf(0.28 * r);
    th_l * (r * (1.0 + 0.448 * r) * (3036.0 / t_l - 1.78)).exp()
}

/// Temperature field in Kelvin regardless of its stored units.
fn kelvin(field: &Field) -> ForecastResult<Vec<f32>> {
    let transform = field.units.transform_to(&Units::Kelvin)?;
    let mut data = field.data.clone();
    transform.apply_slice(&mut data);
    Ok(data)
}

/// Add `theta`, the potential temperature of `tvar`, on every pressure level.
pub fn compute_theta(dataset: &Dataset, tvar: &str) -> ForecastResult<Dataset> {
    let t = dataset.field(tvar)?;
    let levels = dataset.pressure_levels();
    let field_levels = if t.has_level { dataset.n_levels() } else { 1 };
    if levels.len() < field_levels || levels.is_empty() {
        return Err(ForecastError::InvalidInput(format!(
            "{} has no pressure coordinate",
            tvar
        )));
    }

    let plane = dataset.plane_len();
    let mut data = kelvin(t)?;
    data.par_chunks_mut(plane).enumerate().for_each(|(k, chunk)| {
        let p = levels[k % field_levels];
        for v in chunk.iter_mut() {
            *v = potential_temperature(p, *v as f64) as f32;
        }
    });

    let theta = Field::new("theta", Units::Kelvin, t.has_level, data)
        .with_attr("standard_name", "Potential Temperature");
    dataset.with_field(theta)
}

/// Add `theta_e` (°C) at 850 hPa from temperature `tvar` and relative
/// humidity `rvar` (percent).
pub fn compute_thetae(dataset: &Dataset, tvar: &str, rvar: &str) -> ForecastResult<Dataset> {
    let t = dataset.field(tvar)?;
    let r = dataset.field(rvar)?;
    if t.data.len() != r.data.len() {
        return Err(ForecastError::shape_mismatch(t.data.len(), r.data.len()));
    }

    let temps = kelvin(t)?;
    let data: Vec<f32> = temps
        .par_iter()
        .zip(r.data.par_iter())
        .map(|(&t_k, &rh)| {
            let td = dewpoint_from_relative_humidity(t_k as f64, rh as f64 / 100.0);
            let te = equivalent_potential_temperature(THETAE_LEVEL_HPA, t_k as f64, td);
            (te - ZERO_CELSIUS) as f32
        })
        .collect();

    let theta_e = Field::new("theta_e", Units::Celsius, t.has_level, data)
        .with_attr("standard_name", "Equivalent potential temperature");
    dataset.with_field(theta_e)
}
