//! Splitting the step axis into chunks and running them on a worker pool.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use forecast_common::{ForecastConfig, ForecastError, ForecastResult};
use grib_loader::Dataset;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error, info};

/// Contiguous step ranges of at most `chunk_size` steps covering `0..n_steps`
/// in order.
pub fn chunk_steps(n_steps: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let size = chunk_size.max(1);
    (0..n_steps)
        .step_by(size)
        .map(|start| start..(start + size).min(n_steps))
        .collect()
}

/// Result of one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub range: Range<usize>,
    /// Images written before the chunk finished or failed
    pub written: usize,
    pub result: ForecastResult<()>,
}

impl ChunkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every chunk, in step order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ChunkOutcome>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ChunkOutcome::is_ok)
    }

    /// Log the totals and every failed chunk.
    pub fn log(&self) {
        for outcome in self.failures() {
            if let Err(e) = &outcome.result {
                error!(
                    steps = ?outcome.range,
                    written = outcome.written,
                    category = e.category(),
                    error = %e,
                    "Chunk failed"
                );
            }
        }
        info!(
            chunks = self.outcomes.len(),
            failed = self.failures().count(),
            images = self.written(),
            "Batch finished"
        );
    }

    /// Error when any chunk failed.
    pub fn into_result(self) -> anyhow::Result<usize> {
        let failed = self.failures().count();
        if failed > 0 {
            anyhow::bail!("{} of {} chunks failed", failed, self.outcomes.len());
        }
        Ok(self.written())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Draw `dataset` chunk by chunk on a pool of `config.processes` threads.
///
/// `plot_fn` gets an owned copy of its chunk's steps and counts the images
/// it writes. A chunk that fails or panics does not stop the others.
pub fn run_pool<F>(dataset: &Dataset, config: &ForecastConfig, plot_fn: F) -> ForecastResult<BatchReport>
where
    F: Fn(Dataset, &mut usize) -> ForecastResult<()> + Sync,
{
    let ranges = chunk_steps(dataset.n_steps(), config.chunk_size);
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.processes)
        .thread_name(|i| format!("plot-{}", i))
        .build()
        .map_err(|e| ForecastError::Config(format!("cannot start worker pool: {}", e)))?;

    info!(
        steps = dataset.n_steps(),
        chunks = ranges.len(),
        processes = config.processes,
        "Plotting chunks"
    );

    let outcomes = pool.install(|| {
        ranges
            .into_par_iter()
            .map(|range| {
                let mut written = 0usize;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    dataset
                        .select_steps(range.clone())
                        .and_then(|chunk| plot_fn(chunk, &mut written))
                }))
                .unwrap_or_else(|payload| {
                    Err(ForecastError::Render(format!(
                        "worker panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
                debug!(steps = ?range, written, ok = result.is_ok(), "Chunk done");
                ChunkOutcome {
                    range,
                    written,
                    result,
                }
            })
            .collect::<Vec<_>>()
    });

    Ok(BatchReport { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_cover_steps_in_order() {
        let chunks = chunk_steps(65, 10);
        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[0], 0..10);
        assert_eq!(chunks[6], 60..65);
        let flat: Vec<usize> = chunks.into_iter().flatten().collect();
        assert_eq!(flat, (0..65).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunks_edge_cases() {
        assert!(chunk_steps(0, 10).is_empty());
        assert_eq!(chunk_steps(3, 10), vec![0..3]);
        assert_eq!(chunk_steps(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
        assert_eq!(panic_message(payload.as_ref()), "index out of bounds");
        let payload: Box<dyn Any + Send> = Box::new(format!("step {}", 4));
        assert_eq!(panic_message(payload.as_ref()), "step 4");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_report_totals() {
        let report = BatchReport {
            outcomes: vec![
                ChunkOutcome { range: 0..2, written: 2, result: Ok(()) },
                ChunkOutcome {
                    range: 2..4,
                    written: 1,
                    result: Err(ForecastError::Render("boom".into())),
                },
            ],
        };
        assert_eq!(report.written(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 chunks failed");
    }
}
