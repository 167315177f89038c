//! Synthetic forecast data for tests.
//!
//! Grid patterns are plain `Vec<f32>` in row-major order (row 0 is the
//! northernmost row). The dataset builders stack them into the
//! step/level/row/column layout that [`grib_loader::Dataset`] uses, with
//! the field names and raw units of the ECMWF open-data files.

use chrono::{DateTime, TimeZone, Utc};
use forecast_common::Units;
use grib_loader::{Coordinates, Dataset, Field};

use crate::fixtures::grid::GridSpec;

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, so a misplaced read shows up as
/// a recognisable wrong number.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Mean sea level pressure in Pa with a circular low of `depth_hpa`
/// centred on (`center_col`, `center_row`) over a 1015 hPa background.
pub fn create_pressure_grid(
    width: usize,
    height: usize,
    center_col: usize,
    center_row: usize,
    depth_hpa: f32,
) -> Vec<f32> {
    let radius = (width.min(height) as f32 / 4.0).max(1.0);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - center_col as f32;
            let dy = row as f32 - center_row as f32;
            let r2 = (dx * dx + dy * dy) / (radius * radius);
            let hpa = 1015.0 - depth_hpa * (-r2).exp();
            data.push(hpa * 100.0);
        }
    }
    data
}

/// Temperatures in Kelvin, warm in the south and cold in the north
/// (roughly 300 K down to 250 K).
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let frac = row as f32 / height.max(2).saturating_sub(1) as f32;
        for _col in 0..width {
            data.push(250.0 + 50.0 * frac);
        }
    }
    data
}

/// U wind (m/s) growing linearly from 0 at the bottom row to `max_speed` at
/// the top row, a crude jet on the poleward side.
pub fn create_u_wind_grid(width: usize, height: usize, max_speed: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let frac = 1.0 - row as f32 / height.max(2).saturating_sub(1) as f32;
        for _col in 0..width {
            data.push(frac * max_speed);
        }
    }
    data
}

/// V wind (m/s) alternating sign every column band of `period` columns.
pub fn create_v_wind_grid(width: usize, height: usize, amplitude: f32, period: usize) -> Vec<f32> {
    let period = period.max(1);
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let phase = col as f32 / period as f32 * std::f32::consts::PI;
            data.push(amplitude * phase.sin());
        }
    }
    data
}

/// Deterministic patchy precipitation rate in mm/h: most cells are dry,
/// the rest rain up to 5 mm/h.
pub fn create_precipitation_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            let rate = if hash % 3 == 0 {
                (hash % 500) as f32 / 100.0
            } else {
                0.0
            };
            data.push(rate);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Copies `plane` once per step.
pub fn repeat_steps(plane: &[f32], n_steps: usize) -> Vec<f32> {
    plane.repeat(n_steps)
}

/// Running total of a per-step rate: step `t` holds
/// `rate * (steps[t] - steps[0])` hours of accumulation.
pub fn accumulate_steps(rate_per_hour: &[f32], steps: &[u32]) -> Vec<f32> {
    let first = steps.first().copied().unwrap_or(0);
    steps
        .iter()
        .flat_map(|&s| {
            let hours = (s - first) as f32;
            rate_per_hour.iter().map(move |r| r * hours)
        })
        .collect()
}

/// 00 UTC run of 18 December 2023, the run of the fixture file names.
pub fn reference_run() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 18, 0, 0, 0)
        .single()
        .expect("valid reference run")
}

/// A dataset with coordinates from `spec` and no fields.
pub fn empty_dataset(spec: &GridSpec, steps: &[u32], levels: &[f64]) -> Dataset {
    let coords = Coordinates::from_axes(&spec.lat_axis(), &spec.lon_axis());
    Dataset::new(reference_run(), steps.to_vec(), levels.to_vec(), coords)
}

fn insert(dataset: &mut Dataset, name: &str, units: Units, has_level: bool, data: Vec<f32>) {
    dataset
        .insert_field(Field::new(name, units, has_level, data))
        .expect("generated field matches the dataset shape");
}

/// Surface group as downloaded: `2t` (K), `tp` (m), `10u`/`10v` (m/s) and
/// `msl` (Pa) with a low in the middle of the grid.
///
/// Precipitation accumulates at a steady 2 mm/h wherever it rains.
pub fn create_surface_dataset(spec: &GridSpec, steps: &[u32]) -> Dataset {
    let (w, h) = (spec.width, spec.height);
    let n = steps.len();
    let mut ds = empty_dataset(spec, steps, &[]);

    insert(&mut ds, "2t", Units::Kelvin, false, repeat_steps(&create_temperature_grid(w, h), n));
    insert(&mut ds, "10u", Units::MetrePerSecond, false, repeat_steps(&create_u_wind_grid(w, h, 15.0), n));
    insert(&mut ds, "10v", Units::MetrePerSecond, false, repeat_steps(&create_v_wind_grid(w, h, 8.0, 4), n));
    insert(&mut ds, "msl", Units::Pascal, false, repeat_steps(&create_pressure_grid(w, h, w / 2, h / 2, 25.0), n));

    let rate_m: Vec<f32> = create_precipitation_grid(w, h, 7)
        .into_iter()
        .map(|r| if r > 0.0 { 0.002 } else { 0.0 })
        .collect();
    insert(&mut ds, "tp", Units::Metre, false, accumulate_steps(&rate_m, steps));
    ds
}

/// 250 hPa group: `u`/`v` (m/s) with a jet in the north and `gh` (gpm)
/// sloping down polewards.
pub fn create_jet_dataset(spec: &GridSpec, steps: &[u32]) -> Dataset {
    let (w, h) = (spec.width, spec.height);
    let n = steps.len();
    let mut ds = empty_dataset(spec, steps, &[250.0]);

    let gh: Vec<f32> = create_temperature_grid(w, h)
        .into_iter()
        .map(|t| 9200.0 + (t - 250.0) * 30.0)
        .collect();
    insert(&mut ds, "u", Units::MetrePerSecond, true, repeat_steps(&create_u_wind_grid(w, h, 60.0), n));
    insert(&mut ds, "v", Units::MetrePerSecond, true, repeat_steps(&create_v_wind_grid(w, h, 20.0, 6), n));
    insert(&mut ds, "gh", Units::GeopotentialMetre, true, repeat_steps(&gh, n));
    ds
}

/// Temperature (K) and wind (m/s) on several pressure levels of a single
/// step, in a standard-atmosphere lapse of 6.5 K/km.
pub fn create_pressure_level_dataset(spec: &GridSpec, levels: &[f64]) -> Dataset {
    let (w, h) = (spec.width, spec.height);
    let mut ds = empty_dataset(spec, &[0], levels);
    let base = create_temperature_grid(w, h);

    let mut t = Vec::with_capacity(levels.len() * w * h);
    let mut u = Vec::with_capacity(levels.len() * w * h);
    for &p in levels {
        // height of the level in km from the hypsometric approximation
        let z_km = 7.0 * (1000.0 / p).ln() as f32;
        t.extend(base.iter().map(|v| v - 6.5 * z_km));
        u.extend(create_u_wind_grid(w, h, 5.0 + 3.0 * z_km));
    }
    let v = vec![0.0; t.len()];
    insert(&mut ds, "t", Units::Kelvin, true, t);
    insert(&mut ds, "u", Units::MetrePerSecond, true, u);
    insert(&mut ds, "v", Units::MetrePerSecond, true, v);
    ds
}

/// Grid-scale and convective rain and snow totals (kg m⁻²) growing at the
/// given hourly rates. `with_convective` leaves out `RAIN_CON`/`SNOW_CON`
/// when false.
pub fn create_accumulation_dataset(
    spec: &GridSpec,
    steps: &[u32],
    rain_rate: f32,
    snow_rate: f32,
    with_convective: bool,
) -> Dataset {
    let size = spec.size();
    let mut ds = empty_dataset(spec, steps, &[]);
    let acc = |rate: f32| accumulate_steps(&vec![rate; size], steps);

    insert(&mut ds, "RAIN_GSP", Units::KilogramPerSquareMetre, false, acc(rain_rate));
    insert(&mut ds, "SNOW_GSP", Units::KilogramPerSquareMetre, false, acc(snow_rate));
    if with_convective {
        insert(&mut ds, "RAIN_CON", Units::KilogramPerSquareMetre, false, acc(rain_rate));
        insert(&mut ds, "SNOW_CON", Units::KilogramPerSquareMetre, false, acc(snow_rate));
    }
    ds
}
