//! 10 m winds and MSLP for every step of the latest run.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use forecast_common::format_elapsed;
use plotter::plots::MslpWindPlot;
use plotter::{init_logging, load_map_data, print_message, run_plot, PlotArgs};

const SCRIPT: &str = "plot_mslp_wind";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = PlotArgs::parse();
    init_logging(&args.log_level, args.json_logs)?;
    let started = Instant::now();

    print_message(SCRIPT, "Starting script to plot winds10m");
    let projection = args.projection_or_default(SCRIPT);
    let config = args.load_config()?;

    let (dataset, setup) = load_map_data(&config, &projection, MslpWindPlot::read_options())
        .with_context(|| format!("Cannot load the surface fields for map {}", projection))?;
    let (dataset, plot) = MslpWindPlot::prepare(&dataset, &config, &projection)?;

    print_message(SCRIPT, "Pre-processing finished, launching plotting scripts");
    let report = run_plot(&plot, &setup, &dataset, &config)?;

    print_message(SCRIPT, &format!("script took {}", format_elapsed(started.elapsed())));
    report.into_result().map(|_| ())
}
