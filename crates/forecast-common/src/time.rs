//! Time handling utilities for forecast runs.

use std::sync::OnceLock;
use std::time::Duration as StdDuration;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
    Weekday,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Represents a valid time for a forecast field.
///
/// Combines the model run time and the forecast step offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidTime {
    /// Model run/reference time
    pub run: DateTime<Utc>,
    /// Forecast hour offset from the run time
    pub step_hours: u32,
}

impl ValidTime {
    pub fn new(run: DateTime<Utc>, step_hours: u32) -> Self {
        Self { run, step_hours }
    }

    /// Calculate the actual valid time (run + forecast offset)
    pub fn valid_datetime(&self) -> DateTime<Utc> {
        self.run + Duration::hours(self.step_hours as i64)
    }
}

fn run_regex() -> &'static Regex {
    static RUN_RE: OnceLock<Regex> = OnceLock::new();
    RUN_RE.get_or_init(|| Regex::new(r"\d{10}").expect("static regex is valid"))
}

/// Parse the run timestamp (`%Y%m%d%H`) out of a file name or path.
///
/// The first run of ten digits is used, e.g. `2022083112_2D.grib2`.
pub fn parse_run_from_filename(name: &str) -> ForecastResult<DateTime<Utc>> {
    let digits = run_regex()
        .find(name)
        .ok_or_else(|| ForecastError::InvalidFileName(name.to_string()))?
        .as_str();

    let naive = NaiveDateTime::parse_from_str(&format!("{}00", digits), "%Y%m%d%H%M")
        .map_err(|_| ForecastError::InvalidFileName(name.to_string()))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// Format an elapsed wall-clock duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: StdDuration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Last Sunday of the given month at 01:00 UTC, the EU daylight-saving switch.
fn eu_switch(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != Weekday::Sun {
        day = day.pred_opt()?;
    }
    Some(Utc.from_utc_datetime(&day.and_hms_opt(1, 0, 0)?))
}

/// Convert a UTC instant to Europe/Berlin civil time (CET/CEST).
pub fn berlin_local(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    let year = time.year();
    let summer = match (eu_switch(year, 3), eu_switch(year, 10)) {
        (Some(start), Some(end)) => time >= start && time < end,
        _ => false,
    };
    let hours = if summer { 2 } else { 1 };
    let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
    time.with_timezone(&offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_from_filename() {
        let run = parse_run_from_filename("/data/ecmwf/2022083112_2D.grib2").unwrap();
        assert_eq!(run, Utc.with_ymd_and_hms(2022, 8, 31, 12, 0, 0).unwrap());

        let run = parse_run_from_filename("T_2M_2023010100.nc").unwrap();
        assert_eq!(run, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_run_rejects_names_without_timestamp() {
        assert!(matches!(
            parse_run_from_filename("vars_2D.grib2"),
            Err(ForecastError::InvalidFileName(_))
        ));
        assert!(parse_run_from_filename("9999999999_2D.grib2").is_err());
    }

    #[test]
    fn test_valid_time() {
        let run = Utc.with_ymd_and_hms(2022, 8, 31, 12, 0, 0).unwrap();
        let vt = ValidTime::new(run, 36);
        assert_eq!(vt.valid_datetime(), Utc.with_ymd_and_hms(2022, 9, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(StdDuration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(StdDuration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_berlin_local_offsets() {
        let winter = Utc.with_ymd_and_hms(2022, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(berlin_local(winter).offset().local_minus_utc(), 3600);

        let summer = Utc.with_ymd_and_hms(2022, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(berlin_local(summer).offset().local_minus_utc(), 7200);

        // 2022-03-27 is the last Sunday of March
        let before = Utc.with_ymd_and_hms(2022, 3, 27, 0, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2022, 3, 27, 1, 0, 0).unwrap();
        assert_eq!(berlin_local(before).offset().local_minus_utc(), 3600);
        assert_eq!(berlin_local(after).offset().local_minus_utc(), 7200);
    }
}
