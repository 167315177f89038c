//! Forecast steps and run selection for the ECMWF open-data cycles.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};

/// Hours after the nominal run time before its files are expected online.
pub const PUBLICATION_DELAY_HOURS: i64 = 8;

/// Step ranges of one cycle, in hours. Each part is `(start, end, every)`
/// with `end` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSchedule {
    pub stream: &'static str,
    parts: [(u32, u32, u32); 2],
}

impl StepSchedule {
    /// 00 and 12 UTC runs go out to ten days on the `oper` stream, 06 and
    /// 18 UTC runs to six days on `scda`.
    pub fn for_run_hour(hour: u32) -> Result<Self> {
        match hour {
            0 | 12 => Ok(Self {
                stream: "oper",
                parts: [(0, 144, 3), (150, 240, 6)],
            }),
            6 | 18 => Ok(Self {
                stream: "scda",
                parts: [(3, 90, 3), (96, 144, 6)],
            }),
            other => bail!("no forecast run at {:02} UTC, expected 00, 06, 12 or 18", other),
        }
    }

    pub fn steps(&self) -> Vec<u32> {
        self.parts
            .iter()
            .flat_map(|&(start, end, every)| (start..=end).step_by(every as usize))
            .collect()
    }
}

/// Date and hour of a model run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId {
    pub date: NaiveDate,
    pub hour: u32,
}

impl RunId {
    /// Parse `YYYYMMDD` and `HH`.
    pub fn parse(date: &str, time: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y%m%d")
            .map_err(|e| anyhow::anyhow!("invalid run date '{}': {}", date, e))?;
        let hour: u32 = time
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid run time '{}': {}", time, e))?;
        StepSchedule::for_run_hour(hour)?;
        Ok(Self { date, hour })
    }

    /// `YYYYMMDD`
    pub fn date_str(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `HH`
    pub fn time_str(&self) -> String {
        format!("{:02}", self.hour)
    }
}

/// Most recent run expected to be fully published at `now`.
pub fn latest_run(now: DateTime<Utc>) -> RunId {
    let available = now - ChronoDuration::hours(PUBLICATION_DELAY_HOURS);
    RunId {
        date: available.date_naive(),
        hour: available.hour() / 6 * 6,
    }
}
