//! Batch plotting of the forecast maps.
//!
//! Every plotting program loads one request group, fits it to a named map
//! and hands the step axis to a fixed pool of workers. Each worker draws a
//! contiguous chunk of steps on its own canvas and writes one PNG per step.

pub mod batch;
pub mod cli;
pub mod geocode;
pub mod plots;

pub use batch::{chunk_steps, run_pool, BatchReport, ChunkOutcome};
pub use cli::{init_logging, print_message, PlotArgs, DEFAULT_PROJECTION};
pub use geocode::{CityCache, Geocoder, MapboxGeocoder};
pub use plots::{load_map_data, plot_chunk, run_plot, StepPlot};
