//! 250 hPa wind speed with geopotential height.

use diagnostics::compute_wind_speed;
use forecast_common::ForecastResult;
use grib_loader::{Dataset, FileSelector, ReadOptions};
use projection::MapSetup;
use renderer::{
    arange, fill_contours, truncate_colormap, BasemapLayers, Canvas, DiscreteColormap, Extremum,
    Palette, RenderError,
};

use super::{draw_isolines, draw_pressure_centres, StepPlot};

/// Samples kept from the truncated palette.
const PALETTE_SAMPLES: usize = 256;

/// `CMRmap_r` without its lightest tenth.
fn jet_palette() -> ForecastResult<Palette> {
    let base = Palette::builtin("CMRmap_r")
        .ok_or_else(|| RenderError::UnknownColormap("CMRmap_r".to_string()))?;
    Ok(truncate_colormap(&base, 0.0, 0.9, PALETTE_SAMPLES)?)
}

pub struct JetstreamPlot {
    cmap: DiscreteColormap,
    gph_levels: Vec<f64>,
}

impl JetstreamPlot {
    pub fn read_options() -> ReadOptions {
        ReadOptions::new(FileSelector::group("3D_250")).with_variables(&["u", "v", "gh"])
    }

    /// Wind speed in km/h replaces the components.
    pub fn prepare(dataset: &Dataset) -> ForecastResult<(Dataset, Self)> {
        let dataset = compute_wind_speed(dataset, "u", "v")?.drop_fields(&["u", "v"]);

        let cmap = DiscreteColormap::from_palette(&jet_palette()?, &arange(80.0, 300.0, 10.0))?;
        let plot = Self {
            cmap,
            gph_levels: arange(8800.0, 11300.0, 100.0),
        };
        Ok((dataset, plot))
    }
}

impl StepPlot for JetstreamPlot {
    fn variable_name(&self) -> &'static str {
        "winds_jet"
    }

    fn caption(&self) -> &'static str {
        "Winds [kph] and geopotential [m] @250hPa"
    }

    fn colorbar(&self) -> (&DiscreteColormap, &'static str) {
        (&self.cmap, "Wind")
    }

    fn basemap_layers(&self) -> BasemapLayers {
        BasemapLayers {
            boundary_fill: false,
        }
    }

    fn draw_step(
        &self,
        canvas: &mut Canvas,
        setup: &MapSetup,
        chunk: &Dataset,
        step: usize,
    ) -> ForecastResult<()> {
        let speed = chunk.step_slice("wind_speed", step)?;
        let gh = chunk.step_slice("gh", step)?;

        fill_contours(canvas.frame_mut(), speed, &setup.grid, &self.cmap)?;
        draw_isolines(canvas, &setup.grid, gh, &self.gph_levels)?;
        draw_pressure_centres(canvas, &setup.grid, gh, &[Extremum::Min], &mut rand::thread_rng())?;
        Ok(())
    }
}
