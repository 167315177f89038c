//! In-memory forecast grid.
//!
//! A [`Dataset`] holds named [`Field`]s that share the axes
//! `[step][level][y][x]`. Fields sit behind `Arc` so that derived datasets
//! share every field they do not touch.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use forecast_common::{BoundingBox, ForecastError, ForecastResult, Units};
use tracing::debug;

use crate::coords::{roll_columns, Coordinates, GridWindow};

/// One named variable on the dataset grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub units: Units,
    /// Whether the field spans the pressure-level axis
    pub has_level: bool,
    /// `[step][level][y][x]`, NaN marks excluded points
    pub data: Vec<f32>,
    pub attrs: BTreeMap<String, String>,
}

impl Field {
    pub fn new(name: impl Into<String>, units: Units, has_level: bool, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            units,
            has_level,
            data,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Smallest and largest finite value.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        finite_range(&self.data)
    }
}

/// Smallest and largest finite value of a slice.
pub fn finite_range(values: &[f32]) -> Option<(f32, f32)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Forecast grid with axes {run, step, level, y, x}.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub run: DateTime<Utc>,
    /// Forecast steps in hours since `run`, ascending
    pub steps: Vec<u32>,
    /// Pressure levels in hPa; empty when there is no level axis
    pub levels: Vec<f64>,
    pub coords: Arc<Coordinates>,
    pub attrs: BTreeMap<String, String>,
    fields: BTreeMap<String, Arc<Field>>,
}

impl Dataset {
    pub fn new(run: DateTime<Utc>, steps: Vec<u32>, levels: Vec<f64>, coords: Coordinates) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert("run".to_string(), run.format("%Y%m%d%H").to_string());
        Self {
            run,
            steps,
            levels,
            coords: Arc::new(coords),
            attrs,
            fields: BTreeMap::new(),
        }
    }

    pub fn nx(&self) -> usize {
        self.coords.nx
    }

    pub fn ny(&self) -> usize {
        self.coords.ny
    }

    pub fn plane_len(&self) -> usize {
        self.coords.len()
    }

    pub fn n_steps(&self) -> usize {
        self.steps.len()
    }

    /// Size of the level axis, 1 when the dataset has none.
    pub fn n_levels(&self) -> usize {
        self.levels.len().max(1)
    }

    /// Pressure levels, falling back to a level kept by a previous selection.
    pub fn pressure_levels(&self) -> Vec<f64> {
        if !self.levels.is_empty() {
            return self.levels.clone();
        }
        self.attrs
            .get("level")
            .and_then(|l| l.parse().ok())
            .map(|l| vec![l])
            .unwrap_or_default()
    }

    fn levels_of(&self, field: &Field) -> usize {
        if field.has_level {
            self.n_levels()
        } else {
            1
        }
    }

    /// Expected buffer length of a field.
    pub fn field_len(&self, has_level: bool) -> usize {
        let levels = if has_level { self.n_levels() } else { 1 };
        self.n_steps() * levels * self.plane_len()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name).map(Arc::as_ref)
    }

    pub fn field(&self, name: &str) -> ForecastResult<&Field> {
        self.get_field(name)
            .ok_or_else(|| ForecastError::MissingField(name.to_string()))
    }

    /// Add or replace a field in place.
    pub fn insert_field(&mut self, field: Field) -> ForecastResult<()> {
        let expected = self.field_len(field.has_level);
        if field.data.len() != expected {
            return Err(ForecastError::shape_mismatch(expected, field.data.len()));
        }
        self.fields.insert(field.name.clone(), Arc::new(field));
        Ok(())
    }

    /// New dataset with one more field; every other field is shared.
    pub fn with_field(&self, field: Field) -> ForecastResult<Dataset> {
        let mut out = self.clone();
        out.insert_field(field)?;
        Ok(out)
    }

    /// New dataset without the named fields.
    pub fn drop_fields(&self, names: &[&str]) -> Dataset {
        let mut out = self.clone();
        for name in names {
            out.fields.remove(*name);
        }
        out
    }

    /// Override the units of a field without touching its values.
    pub fn set_units(&mut self, name: &str, units: Units) -> ForecastResult<()> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| ForecastError::MissingField(name.to_string()))?;
        Arc::make_mut(field).units = units;
        Ok(())
    }

    /// New dataset with a field converted to other units.
    pub fn convert_units(&self, name: &str, to: &Units) -> ForecastResult<Dataset> {
        let field = self.field(name)?;
        let transform = field.units.transform_to(to)?;
        let mut converted = field.clone();
        transform.apply_slice(&mut converted.data);
        converted.units = to.clone();
        self.with_field(converted)
    }

    fn plane_offset(&self, field: &Field, step: usize, level: usize) -> ForecastResult<usize> {
        let levels = self.levels_of(field);
        if step >= self.n_steps() || level >= levels {
            return Err(ForecastError::InvalidInput(format!(
                "index (step {}, level {}) out of range for {}",
                step, level, field.name
            )));
        }
        Ok((step * levels + level) * self.plane_len())
    }

    /// One `ny * nx` plane of a field.
    pub fn level_slice(&self, name: &str, step: usize, level: usize) -> ForecastResult<&[f32]> {
        let field = self.field(name)?;
        let start = self.plane_offset(field, step, level)?;
        Ok(&field.data[start..start + self.plane_len()])
    }

    /// Plane of a field at a step (first level).
    pub fn step_slice(&self, name: &str, step: usize) -> ForecastResult<&[f32]> {
        self.level_slice(name, step, 0)
    }

    /// Valid time, run and cumulative hour of a step.
    pub fn time_run_cum(&self, step: usize) -> ForecastResult<(DateTime<Utc>, DateTime<Utc>, u32)> {
        let hours = *self.steps.get(step).ok_or_else(|| {
            ForecastError::InvalidInput(format!("step index {} out of range", step))
        })?;
        let valid = self.run + Duration::hours(hours as i64);
        Ok((valid, self.run, hours))
    }

    /// Owned copy of a contiguous range of steps.
    pub fn select_steps(&self, range: Range<usize>) -> ForecastResult<Dataset> {
        if range.start > range.end || range.end > self.n_steps() {
            return Err(ForecastError::InvalidInput(format!(
                "step range {:?} out of bounds for {} steps",
                range,
                self.n_steps()
            )));
        }

        let plane = self.plane_len();
        let mut out = self.clone();
        out.steps = self.steps[range.clone()].to_vec();
        out.fields = self
            .fields
            .iter()
            .map(|(name, field)| {
                let block = self.levels_of(field) * plane;
                let mut copy = Field::clone(field);
                copy.data = field.data[range.start * block..range.end * block].to_vec();
                (name.clone(), Arc::new(copy))
            })
            .collect();
        Ok(out)
    }

    /// Keep only the pressure level nearest to `level` (hPa).
    pub fn sel_level_nearest(&self, level: f64) -> ForecastResult<Dataset> {
        if self.levels.is_empty() {
            return Ok(self.clone());
        }

        let index = self
            .levels
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - level).abs().total_cmp(&(b.1 - level).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let chosen = self.levels[index];
        debug!(requested = level, selected = chosen, "Selecting pressure level");

        let plane = self.plane_len();
        let nlev = self.n_levels();
        let mut out = self.clone();
        out.levels = vec![chosen];
        for field in out.fields.values_mut() {
            if !field.has_level {
                continue;
            }
            let mut data = Vec::with_capacity(self.n_steps() * plane);
            for step in 0..self.n_steps() {
                let start = (step * nlev + index) * plane;
                data.extend_from_slice(&field.data[start..start + plane]);
            }
            Arc::make_mut(field).data = data;
        }
        out.squeeze_levels();
        Ok(out)
    }

    /// Drop a level axis of size one, keeping its value as an attribute.
    pub fn squeeze_levels(&mut self) {
        if self.levels.len() != 1 {
            return;
        }
        self.attrs
            .insert("level".to_string(), self.levels[0].to_string());
        self.levels.clear();
        for field in self.fields.values_mut() {
            if field.has_level {
                Arc::make_mut(field).has_level = false;
            }
        }
    }

    /// Normalize longitudes to [-180, 180), rolling field columns along with
    /// the coordinates on regular grids.
    pub fn normalize_longitudes(&mut self) {
        let mut coords = Coordinates::clone(&self.coords);
        let shift = coords.normalize_longitudes();
        self.coords = Arc::new(coords);
        if shift == 0 {
            return;
        }
        let nx = self.nx();
        for field in self.fields.values_mut() {
            roll_columns(&mut Arc::make_mut(field).data, nx, shift);
        }
    }

    /// Restrict every field and the coordinates to an index window.
    pub fn crop(&self, window: &GridWindow) -> ForecastResult<Dataset> {
        if window.x1 > self.nx() || window.y1 > self.ny() || window.is_empty() {
            return Err(ForecastError::InvalidInput(format!(
                "window {:?} does not fit a {}x{} grid",
                window,
                self.nx(),
                self.ny()
            )));
        }

        let nx = self.nx();
        let plane = self.plane_len();
        let mut out = self.clone();
        out.coords = Arc::new(self.coords.crop(window));
        out.fields = self
            .fields
            .iter()
            .map(|(name, field)| {
                let mut copy = Field::clone(field);
                copy.data = field
                    .data
                    .chunks(plane)
                    .flat_map(|p| window.extract(p, nx))
                    .collect();
                (name.clone(), Arc::new(copy))
            })
            .collect();
        Ok(out)
    }

    /// Blank cells outside `mask` with NaN in every field, then crop to `window`.
    pub fn apply_mask(&self, mask: &[bool], window: &GridWindow) -> ForecastResult<Dataset> {
        if mask.len() != self.plane_len() {
            return Err(ForecastError::shape_mismatch(self.plane_len(), mask.len()));
        }
        let mut masked = self.clone();
        for field in masked.fields.values_mut() {
            let field = Arc::make_mut(field);
            for plane in field.data.chunks_mut(mask.len()) {
                for (v, keep) in plane.iter_mut().zip(mask) {
                    if !keep {
                        *v = f32::NAN;
                    }
                }
            }
        }
        masked.crop(window)
    }

    /// Subset to a bounding box: index slicing on regular grids, masking plus
    /// removal of empty rows and columns otherwise.
    pub fn subset_bbox(&self, bbox: &BoundingBox) -> ForecastResult<Dataset> {
        let coords = &self.coords;
        let outside = || {
            ForecastError::InvalidInput(format!("bounding box {:?} does not overlap the grid", bbox))
        };

        if let (Some(lat_axis), Some(lon_axis)) = (coords.lat_axis(), coords.lon_axis()) {
            let rows = index_span(&lat_axis, bbox.min_y, bbox.max_y).ok_or_else(outside)?;
            let cols = index_span(&lon_axis, bbox.min_x, bbox.max_x).ok_or_else(outside)?;
            let window = GridWindow {
                y0: rows.start,
                y1: rows.end,
                x0: cols.start,
                x1: cols.end,
            };
            debug!(?window, "Slicing regular grid to bounding box");
            return self.crop(&window);
        }

        let mask: Vec<bool> = coords
            .lat
            .iter()
            .zip(&coords.lon)
            .map(|(&lat, &lon)| bbox.contains_point(lon, lat))
            .collect();
        let window = mask_window(&mask, coords.nx, coords.ny).ok_or_else(outside)?;
        debug!(?window, "Masking irregular grid to bounding box");
        self.apply_mask(&mask, &window)
    }
}

/// Span of indices whose axis value lies in `[lo, hi]`, for monotonic axes.
fn index_span(axis: &[f64], lo: f64, hi: f64) -> Option<Range<usize>> {
    let inside: Vec<usize> = axis
        .iter()
        .enumerate()
        .filter(|(_, &v)| v >= lo && v <= hi)
        .map(|(i, _)| i)
        .collect();
    Some(*inside.first()?..*inside.last()? + 1)
}

/// Smallest window containing every true cell of a mask.
pub fn mask_window(mask: &[bool], nx: usize, ny: usize) -> Option<GridWindow> {
    let mut window: Option<GridWindow> = None;
    for j in 0..ny {
        for i in 0..nx {
            if !mask[j * nx + i] {
                continue;
            }
            window = Some(match window {
                None => GridWindow { y0: j, y1: j + 1, x0: i, x1: i + 1 },
                Some(w) => GridWindow {
                    y0: w.y0.min(j),
                    y1: w.y1.max(j + 1),
                    x0: w.x0.min(i),
                    x1: w.x1.max(i + 1),
                },
            });
        }
    }
    window
}
