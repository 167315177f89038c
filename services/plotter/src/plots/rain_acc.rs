//! Accumulated precipitation with isobars.

use forecast_common::{ForecastConfig, ForecastResult, Units};
use grib_loader::{Dataset, FileSelector, ReadOptions};
use projection::MapSetup;
use renderer::{
    arange, fill_contours, get_colormap_norm, levels_between, Canvas, ColormapKind,
    DiscreteColormap, Extremum,
};

use super::{draw_isolines, draw_pressure_centres, StepPlot, ISOBAR_STEP_HPA};

/// Precipitation bins in mm, finer for small totals.
pub fn precip_levels() -> Vec<f64> {
    [
        (1.0, 50.0, 0.4),
        (51.0, 100.0, 2.0),
        (101.0, 200.0, 3.0),
        (201.0, 500.0, 6.0),
        (501.0, 1000.0, 50.0),
        (1001.0, 2000.0, 100.0),
    ]
    .iter()
    .flat_map(|&(start, stop, step)| arange(start, stop, step))
    .collect()
}

pub struct RainAccPlot {
    cmap: DiscreteColormap,
    mslp_levels: Vec<f64>,
}

impl RainAccPlot {
    pub fn read_options() -> ReadOptions {
        ReadOptions::new(FileSelector::group("2D")).with_variables(&["tp", "msl"])
    }

    /// Convert `tp` to mm and `msl` to hPa and set up the levels.
    pub fn prepare(dataset: &Dataset, config: &ForecastConfig) -> ForecastResult<(Dataset, Self)> {
        let dataset = dataset
            .convert_units("tp", &Units::Millimetre)?
            .convert_units("msl", &Units::HectoPascal)?;
        let cmap = get_colormap_norm(ColormapKind::RainAccWxcharts, &precip_levels(), config)?;
        let mslp_levels = levels_between(&dataset.field("msl")?.data, ISOBAR_STEP_HPA);
        Ok((dataset, Self { cmap, mslp_levels }))
    }
}

impl StepPlot for RainAccPlot {
    fn variable_name(&self) -> &'static str {
        "precip_acc"
    }

    fn caption(&self) -> &'static str {
        "Accumulated precipitation [mm] and MSLP [hPa]"
    }

    fn colorbar(&self) -> (&DiscreteColormap, &'static str) {
        (&self.cmap, "Accumulated precipitation [mm]")
    }

    fn draw_step(
        &self,
        canvas: &mut Canvas,
        setup: &MapSetup,
        chunk: &Dataset,
        step: usize,
    ) -> ForecastResult<()> {
        let tp = chunk.step_slice("tp", step)?;
        let msl = chunk.step_slice("msl", step)?;

        fill_contours(canvas.frame_mut(), tp, &setup.grid, &self.cmap)?;
        draw_isolines(canvas, &setup.grid, msl, &self.mslp_levels)?;
        draw_pressure_centres(
            canvas,
            &setup.grid,
            msl,
            &[Extremum::Max, Extremum::Min],
            &mut rand::thread_rng(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precip_levels() {
        let levels = precip_levels();
        assert_eq!(levels[0], 1.0);
        assert_eq!(levels.last(), Some(&1901.0));
        assert!(levels.windows(2).all(|w| w[1] > w[0]));
        // 123 + 25 + 33 + 50 + 10 + 10
        assert_eq!(levels.len(), 251);
    }
}
