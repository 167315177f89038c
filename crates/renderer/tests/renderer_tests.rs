//! Tests for the map layers on a real projection.
//!
//! Uses a quarter degree grid over the `de` map so every grid point lands on
//! the figure.

use std::fs;
use std::path::Path;

use forecast_common::{BoundingBox, ForecastConfig};
use grib_loader::Dataset;
use projection::{get_projection, MapSetup};
use rand::rngs::StdRng;
use rand::SeedableRng;
use renderer::{
    add_vals_on_map, annotation_forecast, annotation_run, arange, draw_basemap, draw_colorbar,
    draw_extrema, draw_quiver, fill_contours, find_extrema, get_colormap_norm, line_contours,
    marker, place_labels, render_labels, stroke_contours, BasemapLayers, Canvas, Color,
    ColormapKind, DiscreteColormap, Extremum, LineStyle, QuiverStyle, RenderError,
};
use test_utils::fixtures::grid::GridSpec;
use test_utils::{create_pressure_grid, empty_dataset, reference_run, write_polyline_shapefile};

// ============================================================================
// Helper functions
// ============================================================================

const GERMANY_0P25: GridSpec = GridSpec {
    width: 45,
    height: 39,
    min_lon: 5.0,
    max_lon: 16.0,
    min_lat: 46.5,
    max_lat: 56.0,
};

fn de_setup() -> (Dataset, MapSetup) {
    let dataset = empty_dataset(&GERMANY_0P25, &[0], &[]);
    let setup = get_projection(&dataset, "de", 400, 400).unwrap();
    (dataset, setup)
}

fn canvas_for(setup: &MapSetup) -> Canvas {
    Canvas::new(setup.viewport.width, setup.viewport.height, 100.0, None).unwrap()
}

fn config_with_home(home: &Path) -> ForecastConfig {
    let home = home.display().to_string();
    ForecastConfig::from_lookup(move |key| (key == "HOME_FOLDER").then(|| home.clone()))
}

fn map_centre(setup: &MapSetup) -> (u32, u32) {
    let map = setup.viewport.map;
    (
        (map.x + map.width / 2.0) as u32,
        (map.y + map.height / 2.0) as u32,
    )
}

fn two_band_cmap() -> DiscreteColormap {
    DiscreteColormap::from_levels_and_colors(
        &[0.0, 10.0, 20.0],
        vec![Color::ROYALBLUE, Color::CORAL, Color::BLACK],
    )
    .unwrap()
}

// ============================================================================
// Colormaps
// ============================================================================

#[test]
fn test_builtin_colormap_has_one_colour_per_level() {
    let config = ForecastConfig::from_lookup(|_| None);
    let levels = arange(1.0, 50.0, 0.4);
    let cmap = get_colormap_norm(ColormapKind::Rain, &levels, &config).unwrap();
    assert_eq!(cmap.len(), levels.len());
    assert_eq!(cmap.levels(), &levels[..]);
    assert!(cmap.colors().iter().all(|c| c.a == 255));
}

#[test]
fn test_snow_discrete_needs_eleven_levels() {
    let config = ForecastConfig::from_lookup(|_| None);
    let levels: Vec<f64> = (0..11).map(|k| k as f64 * 5.0).collect();
    assert!(get_colormap_norm(ColormapKind::SnowDiscrete, &levels, &config).is_ok());
    assert!(get_colormap_norm(ColormapKind::SnowDiscrete, &levels[..8], &config).is_err());
}

#[test]
fn test_table_colormap_is_cycled() {
    let home = tempfile::tempdir().unwrap();
    let config = config_with_home(home.path());
    let path = config.palette_path("winds_wxcharts");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "r,g,b,a\n1,0,0,1\n0,1,0,1\n0,0,1,0.5\n").unwrap();

    let levels = arange(0.0, 100.0, 10.0);
    let cmap = get_colormap_norm(ColormapKind::WindsWxcharts, &levels, &config).unwrap();
    assert_eq!(cmap.len(), 10);
    assert_eq!(cmap.colors()[0], Color::rgb(255, 0, 0));
    assert_eq!(cmap.colors()[3], Color::rgb(255, 0, 0));
    // alpha is dropped
    assert_eq!(cmap.colors()[2], Color::rgb(0, 0, 255));
}

#[test]
fn test_missing_table_is_io_error() {
    let home = tempfile::tempdir().unwrap();
    let config = config_with_home(home.path());
    let err = get_colormap_norm(ColormapKind::RainAccWxcharts, &[0.0, 1.0], &config).unwrap_err();
    assert!(matches!(err, RenderError::Io(_)));
}

#[test]
fn test_unknown_colormap_name() {
    let err = "jet".parse::<ColormapKind>().unwrap_err();
    assert!(matches!(err, RenderError::UnknownColormap(ref name) if name == "jet"));
}

// ============================================================================
// Contours
// ============================================================================

#[test]
fn test_fill_contours_colours_the_map() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();

    let data = vec![15.0f32; setup.grid.len()];
    fill_contours(canvas.frame_mut(), &data, &setup.grid, &two_band_cmap()).unwrap();

    let image = canvas.render().unwrap();
    let (cx, cy) = map_centre(&setup);
    assert_eq!(image.get_pixel(cx, cy).0, [255, 127, 80, 255]);
    // outside the map nothing is filled
    assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[test]
fn test_values_below_first_level_stay_empty() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();

    let data = vec![-5.0f32; setup.grid.len()];
    fill_contours(canvas.frame_mut(), &data, &setup.grid, &two_band_cmap()).unwrap();
    let image = canvas.render().unwrap();
    let (cx, cy) = map_centre(&setup);
    assert_eq!(image.get_pixel(cx, cy).0, [255, 255, 255, 255]);
}

#[test]
fn test_fill_contours_rejects_wrong_length() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let err = fill_contours(canvas.frame_mut(), &[1.0; 3], &setup.grid, &two_band_cmap()).unwrap_err();
    assert!(matches!(err, RenderError::GridMismatch { actual: 3, .. }));
}

#[test]
fn test_pressure_low_gives_closed_isobars() {
    let (_, setup) = de_setup();
    let (nx, ny) = (setup.grid.nx, setup.grid.ny);
    let msl_hpa: Vec<f32> = create_pressure_grid(nx, ny, nx / 2, ny / 2, 25.0)
        .into_iter()
        .map(|p| p / 100.0)
        .collect();

    let levels = arange(990.0, 1015.0, 5.0);
    let contours = line_contours(&msl_hpa, &setup.grid, &levels, 1).unwrap();
    assert!(!contours.is_empty());
    assert!(contours.iter().any(|c| c.closed && c.level == 1000.0));

    let map = setup.viewport.map;
    for contour in &contours {
        for p in &contour.points {
            assert!(p.x as f64 >= map.x - 1.0 && p.x as f64 <= map.right() + 1.0);
            assert!(p.y as f64 >= map.y - 1.0 && p.y as f64 <= map.bottom() + 1.0);
        }
    }

    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();
    let labels = place_labels(&contours, 150.0, 20.0, 40.0, canvas.width(), canvas.height());
    stroke_contours(canvas.frame_mut(), &contours, &LineStyle::default(), &labels, 6.0);
    render_labels(&mut canvas, &labels, 5.0, Color::BLACK);
    assert_eq!(canvas.frame_text().len(), labels.len());
}

// ============================================================================
// Extrema, arrows and text
// ============================================================================

#[test]
fn test_low_is_found_at_its_centre() {
    let (_, setup) = de_setup();
    let (nx, ny) = (setup.grid.nx, setup.grid.ny);
    let msl: Vec<f32> = create_pressure_grid(nx, ny, 20, 18, 25.0)
        .into_iter()
        .map(|p| p / 100.0)
        .collect();

    let mut rng = StdRng::seed_from_u64(42);
    let lows = find_extrema(&msl, nx, ny, 60, Extremum::Min, None, &mut rng).unwrap();
    assert!(lows.iter().any(|p| p.row == 18 && p.col == 20));

    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();
    let (symbol, color) = marker(Extremum::Min);
    draw_extrema(&mut canvas, &setup.grid, &lows, symbol, color);
    let texts = canvas.frame_text();
    assert!(texts.iter().any(|t| t.text == "L"));
    assert!(texts.iter().any(|t| t.text == "990"));
}

#[test]
fn test_quiver_thins_the_grid() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();

    let u = vec![10.0f32; setup.grid.len()];
    let v = vec![-5.0f32; setup.grid.len()];
    let style = QuiverStyle::for_projection("de");
    let arrows = draw_quiver(
        canvas.frame_mut(),
        &setup.grid,
        &u,
        &v,
        setup.viewport.map.width,
        &style,
    )
    .unwrap();

    let expected = setup.grid.nx.div_ceil(5) * setup.grid.ny.div_ceil(5);
    assert_eq!(arrows, expected);
}

#[test]
fn test_annotations_are_per_frame() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let map = setup.viewport.map;

    canvas.begin_frame();
    annotation_run(&mut canvas, &map, reference_run());
    annotation_forecast(&mut canvas, &map, reference_run(), false);
    let texts: Vec<&str> = canvas.frame_text().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "ECMWF Run 20231218 00 UTC",
            "Forecast for Monday 18 Dec 2023 at 00 UTC"
        ]
    );

    canvas.begin_frame();
    assert!(canvas.frame_text().is_empty());
}

#[test]
fn test_colorbar_stays_across_frames() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let rect = setup.viewport.colorbar_rect();
    draw_colorbar(&mut canvas, &rect, &two_band_cmap(), "Wind [km/h]").unwrap();

    canvas.begin_frame();
    canvas.begin_frame();
    let image = canvas.render().unwrap();
    let x = (rect.x + 2.0) as u32;
    let y = (rect.y + rect.height / 2.0) as u32;
    assert_eq!(image.get_pixel(x, y).0, [65, 105, 225, 255]);
}

#[test]
fn test_values_on_map_inside_shrunk_bbox() {
    let (dataset, setup) = de_setup();
    let coords = dataset.coords.crop(&setup.window);
    let values = vec![12.7f32; setup.grid.len()];
    let bbox = BoundingBox::new(5.0, 46.5, 16.0, 56.0);

    let mut canvas = canvas_for(&setup);
    canvas.begin_frame();
    let written = add_vals_on_map(
        &mut canvas,
        &setup.grid,
        &coords,
        &values,
        &bbox,
        4,
        Some(&two_band_cmap()),
        7.0,
    )
    .unwrap();

    assert!(written > 0);
    for text in canvas.frame_text() {
        assert_eq!(text.text, "12");
        assert_eq!(text.style.color, Color::CORAL);
    }
}

// ============================================================================
// Basemap
// ============================================================================

#[test]
fn test_basemap_without_files_draws_boundary_and_graticule() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let dir = tempfile::tempdir().unwrap();

    let drawn = draw_basemap(&mut canvas, &setup, dir.path(), BasemapLayers::default()).unwrap();
    assert_eq!(drawn, 2);

    canvas.begin_frame();
    let image = canvas.render().unwrap();
    let (cx, cy) = map_centre(&setup);
    let centre = image.get_pixel(cx + 3, cy + 3).0;
    assert_eq!(centre, [245, 245, 245, 255]);
}

#[test]
fn test_basemap_draws_admin_shapefile() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let dir = tempfile::tempdir().unwrap();
    write_polyline_shapefile(
        &dir.path().join("DEU_adm").join("DEU_adm1.shp"),
        &[vec![(5.0, 51.25), (16.0, 51.25)]],
    );

    let drawn = draw_basemap(&mut canvas, &setup, dir.path(), BasemapLayers::default()).unwrap();
    // boundary, graticule, admin borders
    assert_eq!(drawn, 3);

    canvas.begin_frame();
    let image = canvas.render().unwrap();
    let (cx, _) = map_centre(&setup);
    let (_, line_y) = setup.locate(10.5, 51.25).unwrap();
    let on_line = image.get_pixel(cx, line_y.floor() as u32).0;
    assert!(on_line[0] < 245, "admin border not drawn: {:?}", on_line);
}

#[test]
fn test_basemap_land_and_coastline() {
    let (_, setup) = de_setup();
    let mut canvas = canvas_for(&setup);
    let dir = tempfile::tempdir().unwrap();

    let land = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon",
         "coordinates": [[[4,45],[17,45],[17,57],[4,57],[4,45]]]}}]}"#;
    let coast = r#"{"type": "LineString", "coordinates": [[5, 51.25], [16, 51.25]]}"#;
    fs::write(dir.path().join("land_i.geojson"), land).unwrap();
    fs::write(dir.path().join("coastline_i.geojson"), coast).unwrap();

    let layers = BasemapLayers {
        boundary_fill: false,
    };
    let drawn = draw_basemap(&mut canvas, &setup, dir.path(), layers).unwrap();
    // land, graticule, coastline
    assert_eq!(drawn, 3);

    canvas.begin_frame();
    let data = vec![15.0f32; setup.grid.len()];
    fill_contours(canvas.frame_mut(), &data, &setup.grid, &two_band_cmap()).unwrap();
    let image = canvas.render().unwrap();

    // the coastline overlay stays on top of the filled data
    let (cx, _) = map_centre(&setup);
    let (_, coast_y) = setup.locate(10.5, 51.25).unwrap();
    let on_line = image.get_pixel(cx, coast_y.floor() as u32).0;
    assert!(on_line[0] < 200, "coastline hidden under data: {:?}", on_line);
}
