//! Arguments, logging and console messages shared by the plotting programs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use forecast_common::config::ConfigOverrides;
use forecast_common::ForecastConfig;
use tracing::{Level, Subscriber};
use tracing_subscriber::FmtSubscriber;

/// Map drawn when none is given on the command line.
pub const DEFAULT_PROJECTION: &str = "nh";

#[derive(Parser, Debug, Clone)]
#[command(about = "Plot one forecast variable for every step of the latest run")]
pub struct PlotArgs {
    /// Map to draw (nh, nh_shift, us, world, nh_polar, euratl, it, de, mexico)
    pub projection: Option<String>,

    /// YAML file overriding folders, pool size and figure geometry
    #[arg(long, env = "FORECAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of plotting workers
    #[arg(long, env = "PLOT_PROCESSES")]
    pub processes: Option<usize>,

    /// Steps drawn by one worker before it takes the next chunk
    #[arg(long, env = "PLOT_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Log level
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl PlotArgs {
    /// The requested map, or the default one with a notice.
    pub fn projection_or_default(&self, script: &str) -> String {
        match &self.projection {
            Some(name) => name.clone(),
            None => {
                let notice = format!(
                    "Projection not defined, falling back to default ({})",
                    DEFAULT_PROJECTION
                );
                print_message(script, &notice);
                DEFAULT_PROJECTION.to_string()
            }
        }
    }

    /// Configuration from the environment, the optional YAML file and the
    /// command line, in that order.
    pub fn load_config(&self) -> Result<ForecastConfig> {
        let mut config = ForecastConfig::from_env();
        if let Some(path) = &self.config {
            let overrides = ConfigOverrides::from_yaml_file(path)
                .with_context(|| format!("Invalid config file: {}", path.display()))?;
            config = config.with_overrides(overrides)?;
        }
        if let Some(processes) = self.processes {
            config.processes = processes;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        config.validate()?;
        config.log_summary();
        Ok(config)
    }
}

/// Console line prefixed with the program name.
pub fn print_message(script: &str, message: &str) {
    println!("{}", format_message(script, message));
}

fn format_message(script: &str, message: &str) -> String {
    format!("{} : {}", script, message)
}

fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn install<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

/// Install the global subscriber.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(log_level))
        .with_target(true)
        .with_thread_ids(true);

    if json {
        install(builder.json().finish())
    } else {
        install(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_prefix() {
        assert_eq!(
            format_message("plot_jetstream", "script took 00:01:05"),
            "plot_jetstream : script took 00:01:05"
        );
    }

    #[test]
    fn test_projection_fallback() {
        let args = PlotArgs::parse_from(["plot_rain_acc"]);
        assert_eq!(args.projection_or_default("plot_rain_acc"), "nh");

        let args = PlotArgs::parse_from(["plot_rain_acc", "euratl", "--processes", "2"]);
        assert_eq!(args.projection_or_default("plot_rain_acc"), "euratl");
        assert_eq!(args.processes, Some(2));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }
}
