//! Integration tests for derived fields on synthetic forecast runs.

use diagnostics::{
    compute_pv, compute_rain_snow_change, compute_rate, compute_snow_change, compute_spacing,
    compute_theta, compute_thetae, compute_wind_speed, integrate_rate,
};
use forecast_common::{BoundingBox, ForecastError, Units};
use grib_loader::{Coordinates, Dataset, Field};
use test_utils::grid::SIMPLE_10X10;
use test_utils::{
    assert_all_nan, assert_approx_eq, create_accumulation_dataset, create_pressure_level_dataset,
    create_surface_dataset, empty_dataset, reference_run,
};

const STEPS: [u32; 5] = [0, 3, 6, 9, 12];

// ============================================================================
// Accumulations
// ============================================================================

#[test]
fn test_increments_grow_with_lead_time() {
    let ds = create_accumulation_dataset(&SIMPLE_10X10, &STEPS, 1.0, 0.25, true);
    let out = compute_rain_snow_change(&ds).unwrap();

    let rain = out.field("rain_increment").unwrap();
    let snow = out.field("snow_increment").unwrap();
    assert_eq!(rain.attr("source"), Some("combined"));

    let plane = out.plane_len();
    for (t, hours) in STEPS.iter().enumerate() {
        // grid-scale plus convective
        assert_approx_eq!(rain.data[t * plane], 2.0 * *hours as f32, 1e-4);
        assert_approx_eq!(snow.data[t * plane + 7], 0.5 * *hours as f32, 1e-4);
    }
}

#[test]
fn test_missing_convective_falls_back_to_grid_scale() {
    let ds = create_accumulation_dataset(&SIMPLE_10X10, &STEPS, 1.0, 0.25, false);
    let out = compute_rain_snow_change(&ds).unwrap();

    let rain = out.field("rain_increment").unwrap();
    assert_eq!(rain.attr("source"), Some("primary_only"));
    assert_approx_eq!(rain.data[4 * out.plane_len()], 12.0, 1e-4);
}

#[test]
fn test_missing_grid_scale_is_an_error() {
    let ds = create_accumulation_dataset(&SIMPLE_10X10, &STEPS, 1.0, 0.25, true)
        .drop_fields(&["RAIN_GSP"]);
    assert!(matches!(
        compute_rain_snow_change(&ds),
        Err(ForecastError::MissingField(_))
    ));
}

#[test]
fn test_rate_integrates_back_to_increment() {
    let ds = create_accumulation_dataset(&SIMPLE_10X10, &STEPS, 1.0, 0.25, true);
    let with_rate = compute_rate(&ds).unwrap();
    let with_inc = compute_rain_snow_change(&ds).unwrap();

    let rate = with_rate.field("rain_rate").unwrap();
    assert!(rate.data.iter().all(|r| (r - 2.0).abs() < 1e-4));

    let integrated = integrate_rate(&with_rate, "rain_rate").unwrap();
    let increment = &with_inc.field("rain_increment").unwrap().data;
    for (a, b) in integrated.iter().zip(increment) {
        assert_approx_eq!(*a, *b, 1e-3);
    }
}

#[test]
fn test_snow_change_blanks_noise() {
    let steps = [0, 6];
    let mut ds = empty_dataset(&SIMPLE_10X10, &steps, &[]);
    let plane = SIMPLE_10X10.size();
    let mut depth = vec![10.0f32; 2 * plane];
    // one cell gains 3 units, the rest wobble by 0.4
    for v in depth[plane..].iter_mut() {
        *v += 0.4;
    }
    depth[plane] = 13.0;
    ds.insert_field(Field::new("sde", Units::Millimetre, false, depth)).unwrap();

    let out = compute_snow_change(&ds, "sde").unwrap();
    let inc = &out.field("snow_increment").unwrap().data;
    assert_all_nan!(&inc[..plane]);
    assert_approx_eq!(inc[plane], 3.0, 1e-5);
    assert_all_nan!(&inc[plane + 1..]);
}

// ============================================================================
// Wind
// ============================================================================

#[test]
fn test_wind_speed_from_surface_group() {
    let ds = create_surface_dataset(&SIMPLE_10X10, &[0, 3]);
    let out = compute_wind_speed(&ds, "10u", "10v").unwrap();

    let u = &ds.field("10u").unwrap().data;
    let v = &ds.field("10v").unwrap().data;
    let speed = out.field("wind_speed").unwrap();
    assert_eq!(speed.units, Units::KilometrePerHour);
    for idx in [0, 13, 57, 199] {
        let expected = (u[idx].powi(2) + v[idx].powi(2)).sqrt() * 3.6;
        assert_approx_eq!(speed.data[idx], expected, 1e-3);
    }
}

#[test]
fn test_wind_speed_missing_component() {
    let ds = create_surface_dataset(&SIMPLE_10X10, &[0]).drop_fields(&["10v"]);
    assert!(compute_wind_speed(&ds, "10u", "10v").is_err());
}

#[test]
fn test_wind_speed_on_selected_level_and_subset() {
    // 5x5 grid, two steps, 850 and 250 hPa; only 250 hPa carries the 3-4-5 wind
    let coords = Coordinates::from_axes(&[48.0, 47.0, 46.0, 45.0, 44.0], &[8.0, 9.0, 10.0, 11.0, 12.0]);
    let mut ds = Dataset::new(reference_run(), vec![0, 3], vec![850.0, 250.0], coords);
    let layered = |low: f32, high: f32| -> Vec<f32> {
        (0..2)
            .flat_map(|_| std::iter::repeat(low).take(25).chain(std::iter::repeat(high).take(25)))
            .collect()
    };
    ds.insert_field(Field::new("u", Units::MetrePerSecond, true, layered(30.0, 3.0)))
        .unwrap();
    ds.insert_field(Field::new("v", Units::MetrePerSecond, true, layered(40.0, 4.0)))
        .unwrap();

    let ds = ds.sel_level_nearest(250.0).unwrap();
    assert!(ds.levels.is_empty());
    assert_eq!(ds.attrs.get("level").map(String::as_str), Some("250"));

    let ds = ds.subset_bbox(&BoundingBox::new(9.0, 45.0, 11.0, 47.0)).unwrap();
    assert_eq!((ds.nx(), ds.ny(), ds.n_steps()), (3, 3, 2));

    let out = compute_wind_speed(&ds, "u", "v").unwrap();
    let speed = out.field("wind_speed").unwrap();
    assert_eq!(speed.units, Units::KilometrePerHour);
    assert_eq!(speed.data.len(), 2 * 9);
    for value in &speed.data {
        assert_approx_eq!(*value, 18.0, 1e-4);
    }
}

// ============================================================================
// Thermodynamics and potential vorticity
// ============================================================================

#[test]
fn test_theta_increases_with_height() {
    let ds = create_pressure_level_dataset(&SIMPLE_10X10, &[850.0, 500.0, 250.0]);
    let out = compute_theta(&ds, "t").unwrap();
    let theta = &out.field("theta").unwrap().data;
    let plane = out.plane_len();
    assert!(theta[plane + 42] > theta[42]);
    assert!(theta[2 * plane + 42] > theta[plane + 42]);
}

#[test]
fn test_thetae_of_saturated_air_exceeds_temperature() {
    let mut ds = create_pressure_level_dataset(&SIMPLE_10X10, &[850.0]);
    let n = ds.field("t").unwrap().data.len();
    ds.insert_field(Field::new("r", Units::Percent, true, vec![100.0; n])).unwrap();

    let out = compute_thetae(&ds, "t", "r").unwrap();
    let theta_e = out.field("theta_e").unwrap();
    let t = &ds.field("t").unwrap().data;
    assert_eq!(theta_e.units, Units::Celsius);
    for (te, t) in theta_e.data.iter().zip(t) {
        assert!(*te > t - 273.15);
    }
}

#[test]
fn test_pv_on_pressure_levels() {
    let ds = create_pressure_level_dataset(&SIMPLE_10X10, &[850.0, 700.0, 500.0, 300.0]);
    let ds = compute_theta(&ds, "t").unwrap();
    let spacing = compute_spacing(&ds);
    let out = compute_pv(&ds, &spacing).unwrap();

    let pv = out.field("pv").unwrap();
    assert_eq!(pv.units, Units::Pvu);
    assert_eq!(pv.data.len(), 4 * SIMPLE_10X10.size());
    assert!(pv.data.iter().all(|v| v.is_finite()));
}
