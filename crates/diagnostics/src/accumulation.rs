//! Increments and rates of accumulated fields.

use forecast_common::{ForecastError, ForecastResult, Units};
use grib_loader::{Dataset, Field};
use tracing::warn;

use crate::constants::INCREMENT_NOISE;
use crate::derivative::{diffs, first_derivative, EdgeOrder};

/// Where an accumulated total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationSource {
    /// Sum of the grid-scale and convective parts
    Combined,
    /// Convective part missing, grid-scale part only
    PrimaryOnly,
}

impl AccumulationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccumulationSource::Combined => "combined",
            AccumulationSource::PrimaryOnly => "primary_only",
        }
    }
}

/// An accumulated total assembled from one or two fields.
#[derive(Debug, Clone)]
pub struct Accumulation {
    pub data: Vec<f32>,
    pub units: Units,
    /// Layout of the source fields, with or without a level axis
    pub has_level: bool,
    pub source: AccumulationSource,
}

/// Sum `primary` and `secondary`, or fall back to `primary` alone when the
/// secondary field is absent. A missing primary field is an error.
pub fn combine_sources(
    dataset: &Dataset,
    primary: &str,
    secondary: &str,
) -> ForecastResult<Accumulation> {
    let first = dataset.field(primary)?;

    match dataset.get_field(secondary) {
        Some(second) => {
            if second.data.len() != first.data.len() {
                return Err(ForecastError::shape_mismatch(first.data.len(), second.data.len()));
            }
            let transform = second.units.transform_to(&first.units)?;
            let data = first
                .data
                .iter()
                .zip(&second.data)
                .map(|(a, b)| a + transform.apply(*b))
                .collect();
            Ok(Accumulation {
                data,
                units: first.units.clone(),
                has_level: first.has_level,
                source: AccumulationSource::Combined,
            })
        }
        None => {
            warn!(
                primary,
                missing = secondary,
                "Secondary accumulation missing, using primary only"
            );
            Ok(Accumulation {
                data: first.data.clone(),
                units: first.units.clone(),
                has_level: first.has_level,
                source: AccumulationSource::PrimaryOnly,
            })
        }
    }
}

/// `values[t] - values[0]` for every step block.
fn increments(values: &[f32], n_steps: usize) -> Vec<f32> {
    if n_steps == 0 {
        return Vec::new();
    }
    let block = values.len() / n_steps;
    let first = &values[..block];
    values
        .chunks(block)
        .flat_map(|step| step.iter().zip(first).map(|(v, v0)| v - v0))
        .collect()
}

/// Blank increments inside the ±0.5 noise band.
pub fn filter_noise(values: &mut [f32]) {
    for v in values.iter_mut() {
        if v.abs() <= INCREMENT_NOISE {
            *v = f32::NAN;
        }
    }
}

/// Add `snow_increment`, the change of `snowvar` since the first step with
/// changes within ±0.5 blanked out.
pub fn compute_snow_change(dataset: &Dataset, snowvar: &str) -> ForecastResult<Dataset> {
    let acc = dataset.field(snowvar)?;
    let mut data = increments(&acc.data, dataset.n_steps());
    filter_noise(&mut data);

    let field = Field::new("snow_increment", acc.units.clone(), acc.has_level, data)
        .with_attr("standard_name", "Snow accumulation since beginning");
    dataset.with_field(field)
}

fn accumulation_field(name: &str, acc: Accumulation, data: Vec<f32>, units: Units) -> Field {
    Field::new(name, units, acc.has_level, data).with_attr("source", acc.source.as_str())
}

/// Add `rain_increment` and `snow_increment` from the grid-scale and
/// convective accumulations (`RAIN_GSP` + `RAIN_CON`, `SNOW_GSP` + `SNOW_CON`).
pub fn compute_rain_snow_change(dataset: &Dataset) -> ForecastResult<Dataset> {
    let rain = combine_sources(dataset, "RAIN_GSP", "RAIN_CON")?;
    let snow = combine_sources(dataset, "SNOW_GSP", "SNOW_CON")?;

    let rain_inc = increments(&rain.data, dataset.n_steps());
    let snow_inc = increments(&snow.data, dataset.n_steps());
    let (rain_units, snow_units) = (rain.units.clone(), snow.units.clone());

    dataset
        .with_field(accumulation_field("rain_increment", rain, rain_inc, rain_units))?
        .with_field(accumulation_field("snow_increment", snow, snow_inc, snow_units))
}

/// Time derivative per hour along the step axis, central in the interior
/// and one-sided at both ends.
fn hourly_rate(values: &[f32], steps: &[u32]) -> Vec<f32> {
    let n_steps = steps.len();
    if n_steps < 2 {
        return vec![f32::NAN; values.len()];
    }
    let hours: Vec<f64> = steps.iter().map(|&s| s as f64).collect();
    let dt = diffs(&hours);
    let block = values.len() / n_steps;

    let mut out = vec![f32::NAN; values.len()];
    let mut series = vec![0.0; n_steps];
    for idx in 0..block {
        for (t, s) in series.iter_mut().enumerate() {
            *s = values[t * block + idx] as f64;
        }
        for (t, d) in first_derivative(&series, &dt, EdgeOrder::First)
            .into_iter()
            .enumerate()
        {
            out[t * block + idx] = d as f32;
        }
    }
    out
}

fn per_hour(units: &Units) -> Units {
    Units::Other(format!("{} h**-1", units.symbol()))
}

/// Add `rain_rate` and `snow_rate` in accumulation units per hour.
pub fn compute_rate(dataset: &Dataset) -> ForecastResult<Dataset> {
    let rain = combine_sources(dataset, "RAIN_GSP", "RAIN_CON")?;
    let snow = combine_sources(dataset, "SNOW_GSP", "SNOW_CON")?;

    let rain_rate = hourly_rate(&rain.data, &dataset.steps);
    let snow_rate = hourly_rate(&snow.data, &dataset.steps);
    let (rain_units, snow_units) = (per_hour(&rain.units), per_hour(&snow.units));

    dataset
        .with_field(accumulation_field("rain_rate", rain, rain_rate, rain_units))?
        .with_field(accumulation_field("snow_rate", snow, snow_rate, snow_units))
}

/// Trapezoidal time integral of a rate field from the first step, in the
/// field's layout. Inverse of [`compute_rate`] up to discretisation error.
pub fn integrate_rate(dataset: &Dataset, rate: &str) -> ForecastResult<Vec<f32>> {
    let field = dataset.field(rate)?;
    let n_steps = dataset.n_steps();
    if n_steps == 0 {
        return Ok(Vec::new());
    }
    let block = field.data.len() / n_steps;

    let mut out = vec![0.0f32; field.data.len()];
    for t in 1..n_steps {
        let dt = (dataset.steps[t] - dataset.steps[t - 1]) as f32;
        for idx in 0..block {
            let prev = field.data[(t - 1) * block + idx];
            let curr = field.data[t * block + idx];
            out[t * block + idx] = out[(t - 1) * block + idx] + 0.5 * (prev + curr) * dt;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use grib_loader::Coordinates;

    fn point_dataset(steps: Vec<u32>) -> Dataset {
        let run = Utc.with_ymd_and_hms(2023, 12, 18, 0, 0, 0).unwrap();
        Dataset::new(run, steps, vec![], Coordinates::from_axes(&[50.0], &[10.0]))
    }

    #[test]
    fn test_noise_band_is_inclusive() {
        let mut values = vec![0.0, 0.3, 0.5, -0.5, 0.51, -0.7];
        filter_noise(&mut values);
        assert!(values[..4].iter().all(|v| v.is_nan()));
        assert_eq!(values[4], 0.51);
        assert_eq!(values[5], -0.7);
    }

    #[test]
    fn test_snow_change() {
        let mut ds = point_dataset(vec![0, 3]);
        ds.insert_field(Field::new("sde", Units::Metre, false, vec![2.0, 3.0])).unwrap();
        let out = compute_snow_change(&ds, "sde").unwrap();
        let inc = &out.field("snow_increment").unwrap().data;
        assert!(inc[0].is_nan());
        assert_eq!(inc[1], 1.0);

        let mut ds = point_dataset(vec![0, 3]);
        ds.insert_field(Field::new("sde", Units::Metre, false, vec![2.0, 2.3])).unwrap();
        let out = compute_snow_change(&ds, "sde").unwrap();
        assert!(out.field("snow_increment").unwrap().data.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_combine_sources_fallback() {
        let mut ds = point_dataset(vec![0, 3]);
        ds.insert_field(Field::new("RAIN_GSP", Units::KilogramPerSquareMetre, false, vec![0.0, 2.0]))
            .unwrap();
        let acc = combine_sources(&ds, "RAIN_GSP", "RAIN_CON").unwrap();
        assert_eq!(acc.source, AccumulationSource::PrimaryOnly);
        assert_eq!(acc.data, vec![0.0, 2.0]);

        ds.insert_field(Field::new("RAIN_CON", Units::KilogramPerSquareMetre, false, vec![1.0, 1.0]))
            .unwrap();
        let acc = combine_sources(&ds, "RAIN_GSP", "RAIN_CON").unwrap();
        assert_eq!(acc.source, AccumulationSource::Combined);
        assert_eq!(acc.data, vec![1.0, 3.0]);

        assert!(matches!(
            combine_sources(&ds, "SNOW_GSP", "SNOW_CON"),
            Err(ForecastError::MissingField(_))
        ));
    }

    #[test]
    fn test_increments_keep_level_axis() {
        let run = Utc.with_ymd_and_hms(2023, 12, 18, 0, 0, 0).unwrap();
        let coords = Coordinates::from_axes(&[50.0], &[10.0]);
        let mut ds = Dataset::new(run, vec![0, 3], vec![850.0, 500.0], coords);
        let kg = Units::KilogramPerSquareMetre;
        // (step, level) order: (0,850) (0,500) (3,850) (3,500)
        ds.insert_field(Field::new("RAIN_GSP", kg.clone(), true, vec![0.0, 1.0, 2.0, 4.0]))
            .unwrap();
        ds.insert_field(Field::new("SNOW_GSP", kg.clone(), true, vec![0.0; 4])).unwrap();

        let out = compute_rain_snow_change(&ds).unwrap();
        let rain = out.field("rain_increment").unwrap();
        assert!(rain.has_level);
        assert_eq!(rain.data, vec![0.0, 0.0, 2.0, 3.0]);
        assert_eq!(rain.attr("source"), Some("primary_only"));

        let out = compute_rate(&ds).unwrap();
        assert!(out.field("snow_rate").unwrap().has_level);
    }

    #[test]
    fn test_hourly_rate_one_sided_ends() {
        let rate = hourly_rate(&[0.0, 3.0, 9.0], &[0, 3, 6]);
        assert_eq!(rate, vec![1.0, 1.5, 2.0]);
        assert!(hourly_rate(&[1.0], &[0])[0].is_nan());
    }
}
