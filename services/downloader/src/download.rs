//! Retrieval from the ECMWF open-data server.
//!
//! Every forecast step is published as one GRIB2 file per stream with a
//! `.index` companion listing each message's byte range. A request reads
//! the index, keeps the messages of the wanted parameters and level and
//! fetches only those ranges, appending them to the target file. Messages
//! are self-contained, so the concatenation is a valid GRIB2 file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::config::RequestGroup;
use crate::schedule::{RunId, StepSchedule};

pub const DEFAULT_ROOT: &str = "https://data.ecmwf.int/forecasts";
pub const DEFAULT_MODEL_PATH: &str = "ifs/0p25";

/// Settings of the open-data client.
#[derive(Debug, Clone)]
pub struct OpenDataConfig {
    pub root: String,
    /// Model and resolution part of the path
    pub model_path: String,
    pub request_timeout: Duration,
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// One line of a `.index` file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexEntry {
    pub param: String,
    pub levtype: String,
    #[serde(default)]
    pub levelist: Option<String>,
    pub step: String,
    #[serde(rename = "_offset")]
    pub offset: u64,
    #[serde(rename = "_length")]
    pub length: u64,
}

impl IndexEntry {
    fn matches(&self, group: &RequestGroup, step: u32) -> bool {
        let step_ok = self
            .step
            .rsplit('-')
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            == Some(step);
        let level_ok = self.levtype == group.levtype()
            && match group.level {
                Some(level) => self.levelist.as_deref().and_then(|l| l.parse::<u32>().ok()) == Some(level),
                None => true,
            };
        step_ok && level_ok && group.params.iter().any(|p| *p == self.param)
    }
}

/// Parse an index: one JSON object per line, blank lines ignored.
pub fn parse_index(text: &str) -> Result<Vec<IndexEntry>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("Bad index line {}", n + 1))
        })
        .collect()
}

/// Byte ranges (start, end inclusive) of the messages of `group` at
/// `step`, adjacent ranges merged. Every parameter must be present.
pub fn select_ranges(entries: &[IndexEntry], group: &RequestGroup, step: u32) -> Result<Vec<(u64, u64)>> {
    let mut selected: Vec<&IndexEntry> = entries.iter().filter(|e| e.matches(group, step)).collect();

    for param in &group.params {
        if !selected.iter().any(|e| e.param == *param) {
            bail!(
                "parameter {} (level {:?}) not listed for step {}",
                param,
                group.level,
                step
            );
        }
    }

    if let Some(empty) = selected.iter().find(|e| e.length == 0) {
        bail!(
            "parameter {} at step {} has a zero-length entry at offset {}",
            empty.param,
            step,
            empty.offset
        );
    }

    selected.sort_by_key(|e| e.offset);
    let mut ranges: Vec<(u64, u64)> = Vec::with_capacity(selected.len());
    for entry in selected {
        let end = entry.offset + entry.length - 1;
        match ranges.last_mut() {
            Some(last) if last.1 + 1 == entry.offset => last.1 = end,
            _ => ranges.push((entry.offset, end)),
        }
    }
    Ok(ranges)
}

/// Totals of one finished retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrieveStats {
    pub steps: usize,
    pub ranges: usize,
    pub bytes: u64,
}

pub struct OpenDataClient {
    client: Client,
    config: OpenDataConfig,
}

impl OpenDataClient {
    pub fn new(config: OpenDataConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// URL of the GRIB2 file of one step.
    pub fn data_url(&self, run: &RunId, stream: &str, step: u32) -> String {
        let date = run.date_str();
        let time = run.time_str();
        format!(
            "{root}/{date}/{time}z/{model}/{stream}/{date}{time}0000-{step}h-{stream}-fc.grib2",
            root = self.config.root.trim_end_matches('/'),
            model = self.config.model_path,
        )
    }

    /// URL of the index describing [`Self::data_url`].
    pub fn index_url(&self, run: &RunId, stream: &str, step: u32) -> String {
        let data = self.data_url(run, stream, step);
        format!("{}.index", data.trim_end_matches(".grib2"))
    }

    async fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Index request failed: {}", url))?;
        if !response.status().is_success() {
            bail!("HTTP {} for {}", response.status(), url);
        }
        let text = response.text().await.context("Error reading index")?;
        parse_index(&text)
    }

    async fn fetch_range(&self, url: &str, range: (u64, u64), file: &mut File) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, format!("bytes={}-{}", range.0, range.1))
            .send()
            .await
            .with_context(|| format!("Range request failed: {}", url))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            status => bail!("HTTP {} for range {}-{} of {}", status, range.0, range.1, url),
        }

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk).await.context("Error writing to file")?;
            written += chunk.len() as u64;
        }

        let expected = range.1 - range.0 + 1;
        if written != expected {
            return Err(anyhow!(
                "Download size mismatch: expected {} bytes, got {}",
                expected,
                written
            ));
        }
        Ok(written)
    }

    /// Fetch `group` for every step of the run into `target`. The file is
    /// assembled next to the target and moved into place only when complete.
    #[instrument(skip(self, run, group), fields(group = %group.name, date = %run.date_str(), hour = run.hour))]
    pub async fn retrieve(&self, run: &RunId, group: &RequestGroup, target: &Path) -> Result<RetrieveStats> {
        let schedule = StepSchedule::for_run_hour(run.hour)?;
        let steps = schedule.steps();

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let mut file = File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;

        info!(
            stream = schedule.stream,
            steps = steps.len(),
            params = ?group.params,
            target = %target.display(),
            "Starting retrieval"
        );

        let mut stats = RetrieveStats::default();
        let result = async {
            for &step in &steps {
                let index_url = self.index_url(run, schedule.stream, step);
                let entries = self.fetch_index(&index_url).await?;
                let ranges = select_ranges(&entries, group, step)
                    .with_context(|| format!("Incomplete index {}", index_url))?;

                let data_url = self.data_url(run, schedule.stream, step);
                for &range in &ranges {
                    stats.bytes += self.fetch_range(&data_url, range, &mut file).await?;
                }
                stats.ranges += ranges.len();
                stats.steps += 1;
                debug!(step, ranges = ranges.len(), bytes = stats.bytes, "Step retrieved");
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = result {
            fs::remove_file(&partial).await.ok();
            return Err(e);
        }

        fs::rename(&partial, target)
            .await
            .with_context(|| format!("Failed to move {} into place", partial.display()))?;
        info!(
            path = %target.display(),
            steps = stats.steps,
            ranges = stats.ranges,
            bytes = stats.bytes,
            "Retrieval completed"
        );
        Ok(stats)
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}
