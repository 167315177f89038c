//! 10 m wind speed and arrows with isobars.

use diagnostics::compute_wind_speed;
use forecast_common::{ForecastConfig, ForecastResult, Units};
use grib_loader::{Dataset, FileSelector, ReadOptions};
use projection::MapSetup;
use renderer::{
    draw_quiver, fill_contours, get_colormap_norm, levels_between, linspace, Canvas,
    ColormapKind, DiscreteColormap, Extremum, QuiverStyle,
};

use super::{draw_isolines, draw_pressure_centres, StepPlot, ISOBAR_STEP_HPA};

pub struct MslpWindPlot {
    cmap: DiscreteColormap,
    mslp_levels: Vec<f64>,
    quiver: QuiverStyle,
}

impl MslpWindPlot {
    pub fn read_options() -> ReadOptions {
        ReadOptions::new(FileSelector::group("2D")).with_variables(&["10u", "10v", "msl"])
    }

    /// Add the wind speed in km/h, convert `msl` to hPa and set up the
    /// levels and arrows for `projection`.
    pub fn prepare(
        dataset: &Dataset,
        config: &ForecastConfig,
        projection: &str,
    ) -> ForecastResult<(Dataset, Self)> {
        let dataset = compute_wind_speed(dataset, "10u", "10v")?
            .convert_units("msl", &Units::HectoPascal)?;
        let cmap = get_colormap_norm(ColormapKind::WindsWxcharts, &linspace(0.0, 150.0, 178), config)?;
        let mslp_levels = levels_between(&dataset.field("msl")?.data, ISOBAR_STEP_HPA);
        let plot = Self {
            cmap,
            mslp_levels,
            quiver: QuiverStyle::for_projection(projection),
        };
        Ok((dataset, plot))
    }
}

impl StepPlot for MslpWindPlot {
    fn variable_name(&self) -> &'static str {
        "winds10m"
    }

    fn caption(&self) -> &'static str {
        "Winds@10m and MSLP"
    }

    fn colorbar(&self) -> (&DiscreteColormap, &'static str) {
        (&self.cmap, "Wind [km/h]")
    }

    fn draw_step(
        &self,
        canvas: &mut Canvas,
        setup: &MapSetup,
        chunk: &Dataset,
        step: usize,
    ) -> ForecastResult<()> {
        let speed = chunk.step_slice("wind_speed", step)?;
        let msl = chunk.step_slice("msl", step)?;

        fill_contours(canvas.frame_mut(), speed, &setup.grid, &self.cmap)?;
        draw_isolines(canvas, &setup.grid, msl, &self.mslp_levels)?;
        draw_pressure_centres(
            canvas,
            &setup.grid,
            msl,
            &[Extremum::Max, Extremum::Min],
            &mut rand::thread_rng(),
        )?;
        draw_quiver(
            canvas.frame_mut(),
            &setup.grid,
            chunk.step_slice("10u", step)?,
            chunk.step_slice("10v", step)?,
            setup.viewport.map.width,
            &self.quiver,
        )?;
        Ok(())
    }
}
