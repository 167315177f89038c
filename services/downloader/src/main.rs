//! ECMWF open-data downloader.
//!
//! Fetches one forecast run for the configured request groups:
//! - Step list chosen from the run hour (long or short cycle)
//! - Only the wanted messages, through the `.index` byte ranges
//! - One GRIB2 file per group, named after the run
//!
//! Any failed request aborts the run.

mod config;
mod download;
mod schedule;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use forecast_common::{format_elapsed, ForecastError};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{target_path, GroupsConfig};
use download::{OpenDataClient, OpenDataConfig, DEFAULT_MODEL_PATH, DEFAULT_ROOT};
use schedule::{latest_run, RunId, StepSchedule};

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Download an ECMWF open-data forecast run")]
struct Args {
    /// Run date as YYYYMMDD (default: latest published run)
    #[arg(long, requires = "time")]
    date: Option<String>,

    /// Run hour as HH: 00, 06, 12 or 18
    #[arg(long, requires = "date")]
    time: Option<String>,

    /// Directory for the GRIB2 files
    #[arg(long, env = "MODEL_DATA_FOLDER", default_value = "/home/ekman/ssd/guido/ecmwf-hres/")]
    output_dir: PathBuf,

    /// YAML file with the request groups
    #[arg(long, env = "DOWNLOAD_GROUPS")]
    groups_config: Option<PathBuf>,

    /// Open-data server root
    #[arg(long, env = "OPENDATA_ROOT", default_value = DEFAULT_ROOT)]
    root: String,

    /// Model path below the run folder
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    model_path: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "600")]
    timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;
    let started = Instant::now();

    let run = match (&args.date, &args.time) {
        (Some(date), Some(time)) => RunId::parse(date, time)?,
        _ => {
            let run = latest_run(Utc::now());
            info!(date = %run.date_str(), time = %run.time_str(), "No run given, using latest");
            run
        }
    };
    let schedule = StepSchedule::for_run_hour(run.hour)?;
    let groups = GroupsConfig::load_or_default(args.groups_config.as_deref())?.groups;

    info!(
        date = %run.date_str(),
        time = %run.time_str(),
        stream = schedule.stream,
        steps = schedule.steps().len(),
        groups = groups.len(),
        output_dir = %args.output_dir.display(),
        "Starting weather data download"
    );

    let client = OpenDataClient::new(OpenDataConfig {
        root: args.root.clone(),
        model_path: args.model_path.clone(),
        request_timeout: Duration::from_secs(args.timeout_secs),
    })?;

    let mut total_bytes = 0u64;
    for group in &groups {
        let target = target_path(&args.output_dir, &run.date_str(), &run.time_str(), group);
        let stats = client
            .retrieve(&run, group, &target)
            .await
            .map_err(|e| ForecastError::Acquisition(format!("{:#}", e)))
            .with_context(|| format!("Retrieval of group {} failed", group.name))?;
        total_bytes += stats.bytes;
    }

    info!(
        files = groups.len(),
        total_bytes,
        elapsed = %format_elapsed(started.elapsed()),
        "Download session complete"
    );
    Ok(())
}
