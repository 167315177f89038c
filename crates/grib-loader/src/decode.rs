//! GRIB2 decoding on top of the `grib` crate.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use forecast_common::{ForecastError, ForecastResult, Units};
use grib::codetables::grib2::Table4_4;
use grib::{Code, ForecastTime, Name};
use tracing::{debug, instrument, warn};

use crate::coords::Coordinates;
use crate::tables::ParameterTable;

/// Code Table 4.5: isobaric surface, value in Pa
const SURFACE_ISOBARIC: u8 = 100;

/// Offset of the end-of-interval time range in a template 4.8 payload
const TMPL_4_8_RANGE_UNIT: usize = 43;

/// One decoded GRIB2 submessage.
#[derive(Debug, Clone)]
pub struct Message {
    pub short_name: String,
    pub units: Units,
    /// Pressure level in hPa for isobaric fields
    pub level: Option<f64>,
    /// Forecast step in hours; end of the interval for accumulations
    pub step: u32,
    pub run: DateTime<Utc>,
    pub values: Vec<f32>,
}

/// All messages of one file together with their shared grid.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub path: PathBuf,
    pub coords: Coordinates,
    pub messages: Vec<Message>,
}

fn decode_err(path: &Path, err: impl std::fmt::Display) -> ForecastError {
    ForecastError::Decode(format!("{}: {}", path.display(), err))
}

/// Hours per unit of Code Table 4.4.
fn unit_hours(unit: &Code<Table4_4, u8>) -> Option<f64> {
    match unit {
        Name(Table4_4::Second) => Some(1.0 / 3600.0),
        Name(Table4_4::Minute) => Some(1.0 / 60.0),
        Name(Table4_4::Hour) => Some(1.0),
        Name(Table4_4::ThreeHours) => Some(3.0),
        Name(Table4_4::SixHours) => Some(6.0),
        Name(Table4_4::TwelveHours) => Some(12.0),
        Name(Table4_4::Day) => Some(24.0),
        _ => None,
    }
}

fn to_hours(time: &ForecastTime) -> Option<f64> {
    unit_hours(&time.unit).map(|h| h * time.value as f64)
}

/// Forecast step in hours from the product definition payload.
///
/// For statistically processed products (template 4.8) the length of the
/// time range is added, so accumulations are stamped at the end of the
/// interval.
pub fn step_hours(template: u16, forecast_time: Option<ForecastTime>, payload: &[u8]) -> Option<u32> {
    let mut hours = to_hours(&forecast_time?)?;

    if template == 8 && payload.len() >= TMPL_4_8_RANGE_UNIT + 5 {
        let unit = payload[TMPL_4_8_RANGE_UNIT];
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&payload[TMPL_4_8_RANGE_UNIT + 1..TMPL_4_8_RANGE_UNIT + 5]);
        let range = ForecastTime::from_numbers(unit, u32::from_be_bytes(raw));
        hours += to_hours(&range)?;
    }

    Some(hours.round() as u32)
}

/// Decode every submessage of a GRIB2 file.
#[instrument(skip(table), fields(path = %path.display()))]
pub fn decode_file(path: &Path, table: &ParameterTable) -> ForecastResult<DecodedFile> {
    let reader = BufReader::new(File::open(path)?);
    let grib2 = grib::from_reader(reader).map_err(|e| decode_err(path, e))?;

    let mut coords: Option<Coordinates> = None;
    let mut messages = Vec::new();

    for (index, sub) in grib2.iter() {
        let discipline = sub.indicator().discipline;
        let prod = sub.prod_def();
        let (Some(category), Some(number)) = (prod.parameter_category(), prod.parameter_number())
        else {
            debug!(?index, template = prod.prod_tmpl_num(), "Skipping unsupported product template");
            continue;
        };

        let surface = prod.fixed_surfaces().map(|(first, _)| first);
        let surface_type = surface.as_ref().map(|s| s.surface_type).unwrap_or(255);
        let key = (discipline, category, number);

        let (short_name, units) = match table.lookup(key, surface_type) {
            Some(info) => (info.short_name.clone(), info.units.clone()),
            None => {
                let name = ParameterTable::fallback_name(key);
                warn!(parameter = %name, surface_type, "Unknown GRIB2 parameter");
                (name, Units::Dimensionless)
            }
        };

        let level = match &surface {
            Some(s) if s.surface_type == SURFACE_ISOBARIC => Some(s.value() / 100.0),
            _ => None,
        };

        let payload: Vec<u8> = prod.iter().copied().collect();
        let step = step_hours(prod.prod_tmpl_num(), prod.forecast_time(), &payload)
            .ok_or_else(|| decode_err(path, format!("no forecast time for {}", short_name)))?;

        let rt = sub.identification().ref_time_unchecked();
        let run = Utc
            .with_ymd_and_hms(
                rt.year as i32,
                rt.month as u32,
                rt.day as u32,
                rt.hour as u32,
                rt.minute as u32,
                rt.second as u32,
            )
            .single()
            .ok_or_else(|| decode_err(path, "invalid reference time"))?;

        let (ni, nj) = sub.grid_shape().map_err(|e| decode_err(path, e))?;
        if coords.is_none() {
            let (lat, lon): (Vec<f64>, Vec<f64>) = sub
                .latlons()
                .map_err(|e| decode_err(path, e))?
                .map(|(lat, lon)| (lat as f64, lon as f64))
                .unzip();
            coords = Some(Coordinates::from_2d(lat, lon, ni, nj)?);
        } else if let Some(c) = &coords {
            if (c.nx, c.ny) != (ni, nj) {
                return Err(ForecastError::shape_mismatch((c.nx, c.ny), (ni, nj)));
            }
        }

        let decoder = grib::Grib2SubmessageDecoder::from(sub).map_err(|e| decode_err(path, e))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| decode_err(path, e))?
            .collect();
        if values.len() != ni * nj {
            return Err(ForecastError::shape_mismatch(ni * nj, values.len()));
        }

        debug!(name = %short_name, ?level, step, "Decoded message");
        messages.push(Message {
            short_name,
            units,
            level,
            step,
            run,
            values,
        });
    }

    let coords = coords.ok_or_else(|| decode_err(path, "file holds no decodable messages"))?;
    Ok(DecodedFile {
        path: path.to_path_buf(),
        coords,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmpl_4_8_payload(unit: u8, length: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 58];
        payload[TMPL_4_8_RANGE_UNIT] = unit;
        payload[TMPL_4_8_RANGE_UNIT + 1..TMPL_4_8_RANGE_UNIT + 5].copy_from_slice(&length.to_be_bytes());
        payload
    }

    #[test]
    fn test_instantaneous_step() {
        let ft = ForecastTime::from_numbers(1, 36);
        assert_eq!(step_hours(0, Some(ft), &[]), Some(36));
    }

    #[test]
    fn test_accumulation_uses_interval_end() {
        // tp at step 24 is coded as start 0 + 24 h range
        let ft = ForecastTime::from_numbers(1, 0);
        assert_eq!(step_hours(8, Some(ft), &tmpl_4_8_payload(1, 24)), Some(24));

        let ft = ForecastTime::from_numbers(1, 6);
        assert_eq!(step_hours(8, Some(ft), &tmpl_4_8_payload(0, 180)), Some(9));
    }

    #[test]
    fn test_minute_units() {
        let ft = ForecastTime::from_numbers(0, 90);
        assert_eq!(step_hours(0, Some(ft), &[]), Some(2));
    }

    #[test]
    fn test_missing_forecast_time() {
        assert_eq!(step_hours(0, None, &[]), None);
        let ft = ForecastTime::from_numbers(255, 3);
        assert_eq!(step_hours(0, Some(ft), &[]), None);
    }

    #[test]
    fn test_decode_missing_file() {
        let table = ParameterTable::ecmwf();
        let err = decode_file(Path::new("/nonexistent/file.grib2"), &table).unwrap_err();
        assert!(matches!(err, ForecastError::Io(_)));
    }

    #[test]
    fn test_decode_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2022083112_2D.grib2");
        std::fs::write(&path, b"not a grib file").unwrap();
        let err = decode_file(&path, &ParameterTable::ecmwf()).unwrap_err();
        assert!(matches!(err, ForecastError::Decode(_)));
    }
}
