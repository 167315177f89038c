//! The per-step drawing loop shared by the plotting programs.
//!
//! A chunk draws the basemap and the colorbar once on the canvas background,
//! then for every step starts a fresh frame from that background, lets the
//! program draw its data layers, adds the annotations and writes
//! `{variable}_{hour}.png` into the map's image folder.

pub mod jetstream;
pub mod mslp_wind;
pub mod rain_acc;

use forecast_common::{ForecastConfig, ForecastResult};
use grib_loader::{read_dataset, Dataset, ReadOptions};
use projection::{get_projection, lookup, MapSetup, ProjectedGrid};
use rand::Rng;
use renderer::extrema::DEFAULT_JITTER;
use renderer::{
    annotation, annotation_forecast, annotation_run, draw_basemap, draw_colorbar,
    draw_extrema, find_extrema, line_contours, load_font, marker, place_labels, render_labels,
    stroke_contours, BasemapLayers, Canvas, Color, DiscreteColormap, Extremum, LineStyle, Location,
};
use rusttype::Font;
use tracing::{debug, info, instrument};

use crate::batch::{run_pool, BatchReport};

pub use jetstream::JetstreamPlot;
pub use mslp_wind::MslpWindPlot;
pub use rain_acc::RainAccPlot;

/// Spacing of the isobars, in hPa.
pub const ISOBAR_STEP_HPA: f64 = 5.0;

/// Search window of the pressure centres, in grid points.
pub const EXTREMA_WINDOW: usize = 60;

/// Font size of the isoline labels, in points.
const CONTOUR_LABEL_PT: f32 = 5.0;

/// Font size of the caption, in points.
const CAPTION_PT: f32 = 6.0;

/// What one plotting program draws.
pub trait StepPlot: Sync {
    /// Prefix of the image names
    fn variable_name(&self) -> &'static str;

    /// Lower-left caption
    fn caption(&self) -> &'static str;

    /// Colormap and label of the colorbar
    fn colorbar(&self) -> (&DiscreteColormap, &'static str);

    fn basemap_layers(&self) -> BasemapLayers {
        BasemapLayers::default()
    }

    /// Draw the data layers of `step` of `chunk` on the current frame.
    fn draw_step(
        &self,
        canvas: &mut Canvas,
        setup: &MapSetup,
        chunk: &Dataset,
        step: usize,
    ) -> ForecastResult<()>;
}

/// Read the files described by `options`, fit them to map `projection` and
/// keep the points on the map.
#[instrument(skip(config, options))]
pub fn load_map_data(
    config: &ForecastConfig,
    projection: &str,
    options: ReadOptions,
) -> ForecastResult<(Dataset, MapSetup)> {
    let def = lookup(projection)?;
    let options = options.with_projection(projection, def.bbox());
    let dataset = read_dataset(config, &options)?;

    let (width, height) = config.figure.pixels();
    let setup = get_projection(&dataset, projection, width, height)?;
    let dataset = setup.apply(&dataset)?;
    Ok((dataset, setup))
}

/// Draw every step of `chunk`, counting the images in `written`.
pub fn plot_chunk<P: StepPlot + ?Sized>(
    plot: &P,
    setup: &MapSetup,
    config: &ForecastConfig,
    font: Option<Font<'static>>,
    chunk: Dataset,
    written: &mut usize,
) -> ForecastResult<()> {
    let viewport = &setup.viewport;
    let mut canvas = Canvas::new(viewport.width, viewport.height, config.figure.dpi as f32, font)?;
    draw_basemap(&mut canvas, setup, &config.shapefile_dir(), plot.basemap_layers())?;
    let (cmap, label) = plot.colorbar();
    draw_colorbar(&mut canvas, &viewport.colorbar_rect(), cmap, label)?;

    let folder = config.subfolder_for(setup.def.name);
    for step in 0..chunk.n_steps() {
        canvas.begin_frame();
        let (valid, run, cum_hour) = chunk.time_run_cum(step)?;

        plot.draw_step(&mut canvas, setup, &chunk, step)?;
        annotation_forecast(&mut canvas, &viewport.map, valid, false);
        annotation(&mut canvas, &viewport.map, plot.caption(), Location::LowerLeft, CAPTION_PT);
        annotation_run(&mut canvas, &viewport.map, run);

        let path = folder.join(format!("{}_{}.png", plot.variable_name(), cum_hour));
        canvas.save_png(&path)?;
        *written += 1;
        debug!(path = %path.display(), "Image written");
    }
    Ok(())
}

/// Plot every step of `dataset` on the worker pool.
pub fn run_plot<P: StepPlot>(
    plot: &P,
    setup: &MapSetup,
    dataset: &Dataset,
    config: &ForecastConfig,
) -> ForecastResult<BatchReport> {
    let font = load_font(&config.font_candidates());
    info!(
        variable = plot.variable_name(),
        projection = setup.def.name,
        font = font.is_some(),
        folder = %config.subfolder_for(setup.def.name).display(),
        "Starting plots"
    );
    let report = run_pool(dataset, config, |chunk, written| {
        plot_chunk(plot, setup, config, font.clone(), chunk, written)
    })?;
    report.log();
    Ok(report)
}

/// Thin black isolines with inline `%4.0f` labels.
pub fn draw_isolines(
    canvas: &mut Canvas,
    grid: &ProjectedGrid,
    values: &[f32],
    levels: &[f64],
) -> ForecastResult<()> {
    if levels.is_empty() {
        return Ok(());
    }
    let style = LineStyle {
        width: canvas.points(0.5),
        color: Color::BLACK,
        smoothing_passes: 1,
    };
    let contours = line_contours(values, grid, levels, style.smoothing_passes)?;
    let labels = place_labels(
        &contours,
        canvas.points(144.0),
        canvas.points(10.0),
        canvas.points(30.0),
        canvas.width(),
        canvas.height(),
    );
    let gap = canvas.points(CONTOUR_LABEL_PT * 1.2);
    stroke_contours(canvas.frame_mut(), &contours, &style, &labels, gap);
    render_labels(canvas, &labels, CONTOUR_LABEL_PT, Color::BLACK);
    Ok(())
}

/// Mark the centres of `kinds` with their symbol and value. Values are
/// jittered first so flat areas do not produce clusters of markers.
pub fn draw_pressure_centres<R: Rng + ?Sized>(
    canvas: &mut Canvas,
    grid: &ProjectedGrid,
    values: &[f32],
    kinds: &[Extremum],
    rng: &mut R,
) -> ForecastResult<usize> {
    let mut placed = 0;
    for &kind in kinds {
        let points = find_extrema(
            values,
            grid.nx,
            grid.ny,
            EXTREMA_WINDOW,
            kind,
            Some(DEFAULT_JITTER),
            rng,
        )?;
        let (symbol, color) = marker(kind);
        draw_extrema(canvas, grid, &points, symbol, color);
        placed += points.len();
    }
    Ok(placed)
}
