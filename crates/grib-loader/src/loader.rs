//! File selection and dataset assembly.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forecast_common::{
    parse_run_from_filename, BoundingBox, ForecastConfig, ForecastError, ForecastResult, Units,
};
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::dataset::{Dataset, Field};
use crate::decode::{decode_file, DecodedFile};
use crate::tables::ParameterTable;

/// Projections covering (nearly) the whole globe; never subset.
pub const GLOBAL_PROJECTIONS: &[&str] = &["nh", "world", "us", "nh_polar", "nh_shift"];

/// How input files are picked from the data folder.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSelector {
    /// One file per variable and run, e.g. `RAIN_GSP_2023121800.grib2`
    Variables(Vec<String>),
    /// A downloaded request group, e.g. `2D` or `3D_250`; newest run wins
    Group(String),
}

impl FileSelector {
    pub fn group(name: impl Into<String>) -> Self {
        FileSelector::Group(name.into())
    }

    pub fn variables<S: AsRef<str>>(names: &[S]) -> Self {
        FileSelector::Variables(names.iter().map(|n| n.as_ref().to_string()).collect())
    }

    /// Regex matched against the full file path.
    pub fn pattern(&self) -> String {
        match self {
            FileSelector::Variables(names) => {
                let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
                format!(r"/({})(?:_\d{{10}})", alternatives.join("|"))
            }
            FileSelector::Group(group) => format!(r"/\d{{10}}_{}\.grib2$", regex::escape(group)),
        }
    }

    fn regex(&self) -> ForecastResult<Regex> {
        Regex::new(&self.pattern())
            .map_err(|e| ForecastError::Config(format!("invalid file pattern: {}", e)))
    }
}

/// Options for [`read_dataset`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub selector: FileSelector,
    /// Keep only these short names; all fields when `None`
    pub variables: Option<Vec<String>>,
    /// Pressure level (hPa) to select, nearest match
    pub level: Option<f64>,
    /// Projection the data is read for
    pub projection: Option<String>,
    /// Region of the projection, used unless the projection is global
    pub bbox: Option<BoundingBox>,
}

impl ReadOptions {
    pub fn new(selector: FileSelector) -> Self {
        Self {
            selector,
            variables: None,
            level: None,
            projection: None,
            bbox: None,
        }
    }

    pub fn with_variables<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.variables = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    pub fn with_level(mut self, level: f64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_projection(mut self, name: impl Into<String>, bbox: Option<BoundingBox>) -> Self {
        self.projection = Some(name.into());
        self.bbox = bbox;
        self
    }

    /// Bounding box to cut to, if any.
    pub fn subset_region(&self) -> Option<&BoundingBox> {
        match &self.projection {
            Some(name) if GLOBAL_PROJECTIONS.contains(&name.as_str()) => None,
            _ => self.bbox.as_ref(),
        }
    }
}

/// Files in `folder` matching the selector, sorted by name.
pub fn select_files(folder: &Path, selector: &FileSelector) -> ForecastResult<Vec<PathBuf>> {
    let re = selector.regex()?;
    let glob_pattern = folder.join("*");
    let glob_pattern = glob_pattern.to_string_lossy();

    let mut files: Vec<PathBuf> = glob::glob(&glob_pattern)
        .map_err(|e| ForecastError::Config(format!("invalid glob {}: {}", glob_pattern, e)))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && re.is_match(&p.to_string_lossy()))
        .collect();
    files.sort();

    if let FileSelector::Group(_) = selector {
        let newest = files
            .iter()
            .filter_map(|p| parse_run_from_filename(&p.to_string_lossy()).ok())
            .max();
        if let Some(newest) = newest {
            files.retain(|p| parse_run_from_filename(&p.to_string_lossy()).ok() == Some(newest));
        }
    }

    if files.is_empty() {
        return Err(ForecastError::NoMatchingFiles {
            folder: folder.to_path_buf(),
            pattern: selector.pattern(),
        });
    }
    debug!(count = files.len(), "Selected input files");
    Ok(files)
}

/// Locate, decode and normalize the forecast files described by `options`.
#[instrument(skip(config), fields(folder = %config.data_folder.display()))]
pub fn read_dataset(config: &ForecastConfig, options: &ReadOptions) -> ForecastResult<Dataset> {
    let files = select_files(&config.data_folder, &options.selector)?;
    let run = parse_run_from_filename(&files[0].to_string_lossy())?;

    let table = ParameterTable::ecmwf();
    let decoded = files
        .par_iter()
        .map(|path| decode_file(path, &table))
        .collect::<ForecastResult<Vec<_>>>()?;

    let mut dataset = assemble(decoded, run, options.variables.as_deref())?;
    preprocess(&mut dataset);
    dataset.normalize_longitudes();

    if let Some(level) = options.level {
        dataset = dataset.sel_level_nearest(level)?;
    }
    if let Some(bbox) = options.subset_region() {
        dataset = dataset.subset_bbox(bbox)?;
    }

    info!(
        run = %run.format("%Y%m%d%H"),
        files = files.len(),
        steps = dataset.n_steps(),
        nx = dataset.nx(),
        ny = dataset.ny(),
        fields = ?dataset.field_names(),
        "Dataset loaded"
    );
    Ok(dataset)
}

/// Normalize a freshly assembled dataset.
pub fn preprocess(dataset: &mut Dataset) {
    if dataset.has_field("VMAX_10M") {
        // the field ships with a wrong unit attribute
        let _ = dataset.set_units("VMAX_10M", Units::MetrePerSecond);
    }
    if dataset.has_field("plev_bnds") {
        *dataset = dataset.drop_fields(&["plev_bnds"]);
    }
    dataset.squeeze_levels();
}

/// Stack decoded messages into fields on common step and level axes.
pub fn assemble(
    decoded: Vec<DecodedFile>,
    run: DateTime<Utc>,
    variables: Option<&[String]>,
) -> ForecastResult<Dataset> {
    let mut files = decoded.into_iter();
    let first = files
        .next()
        .ok_or_else(|| ForecastError::InvalidInput("no decoded files".to_string()))?;
    let coords = first.coords.clone();

    let mut messages = first.messages;
    for file in files {
        if (file.coords.nx, file.coords.ny) != (coords.nx, coords.ny) {
            return Err(ForecastError::shape_mismatch(
                (coords.nx, coords.ny),
                (file.coords.nx, file.coords.ny),
            ));
        }
        messages.extend(file.messages);
    }

    if let Some(wanted) = variables {
        messages.retain(|m| wanted.iter().any(|w| w == &m.short_name));
    }
    if messages.is_empty() {
        return Err(ForecastError::MissingField(
            variables.map(|v| v.join(",")).unwrap_or_default(),
        ));
    }

    let steps: Vec<u32> = messages
        .iter()
        .map(|m| m.step)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut levels: Vec<f64> = Vec::new();
    for level in messages.iter().filter_map(|m| m.level) {
        if !levels.iter().any(|l| (l - level).abs() < 1e-6) {
            levels.push(level);
        }
    }
    levels.sort_by(|a, b| b.total_cmp(a));

    let mut dataset = Dataset::new(run, steps.clone(), levels.clone(), coords);
    let plane = dataset.plane_len();
    let n_levels = dataset.n_levels();

    let mut by_name: BTreeMap<String, Vec<_>> = BTreeMap::new();
    for message in messages {
        by_name.entry(message.short_name.clone()).or_default().push(message);
    }

    for (name, group) in by_name {
        let has_level = group.iter().any(|m| m.level.is_some());
        let units = group[0].units.clone();
        let mut data = vec![f32::NAN; dataset.field_len(has_level)];
        let field_levels = if has_level { n_levels } else { 1 };
        let mut filled = 0usize;

        for message in group {
            let step_idx = steps.binary_search(&message.step).unwrap_or(0);
            let level_idx = match message.level {
                Some(level) if has_level => levels
                    .iter()
                    .position(|l| (l - level).abs() < 1e-6)
                    .unwrap_or(0),
                _ => 0,
            };
            let start = (step_idx * field_levels + level_idx) * plane;
            data[start..start + plane].copy_from_slice(&message.values);
            filled += 1;
        }

        let expected = steps.len() * field_levels;
        if filled < expected {
            warn!(field = %name, filled, expected, "Missing time steps filled with NaN");
        }
        dataset.insert_field(Field::new(name, units, has_level, data))?;
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Coordinates;
    use crate::decode::Message;
    use chrono::TimeZone;

    fn run() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 8, 31, 12, 0, 0).unwrap()
    }

    fn message(name: &str, level: Option<f64>, step: u32, value: f32) -> Message {
        Message {
            short_name: name.to_string(),
            units: Units::Kelvin,
            level,
            step,
            run: run(),
            values: vec![value; 4],
        }
    }

    fn decoded(messages: Vec<Message>) -> DecodedFile {
        DecodedFile {
            path: PathBuf::from("2022083112_3D_250.grib2"),
            coords: Coordinates::from_axes(&[10.0, 0.0], &[0.0, 1.0]),
            messages,
        }
    }

    #[test]
    fn test_variables_pattern() {
        let selector = FileSelector::variables(&["RAIN_GSP", "RAIN_CON"]);
        let re = Regex::new(&selector.pattern()).unwrap();
        assert!(re.is_match("/data/icon-d2/RAIN_GSP_2023121800.grib2"));
        assert!(re.is_match("/data/RAIN_CON_2023121800_001.grib2"));
        assert!(!re.is_match("/data/SNOW_GSP_2023121800.grib2"));
        assert!(!re.is_match("/data/RAIN_GSP.grib2"));
    }

    #[test]
    fn test_group_pattern() {
        let re = Regex::new(&FileSelector::group("3D_250").pattern()).unwrap();
        assert!(re.is_match("/data/2022083112_3D_250.grib2"));
        assert!(!re.is_match("/data/2022083112_3D_500.grib2"));
        assert!(!re.is_match("/data/2022083112_2D.grib2"));
    }

    #[test]
    fn test_global_projections_skip_subset() {
        let bbox = BoundingBox::new(-23.5, 29.5, 45.0, 70.5);
        let opts = ReadOptions::new(FileSelector::group("2D")).with_projection("nh", Some(bbox));
        assert!(opts.subset_region().is_none());
        let opts = ReadOptions::new(FileSelector::group("2D")).with_projection("euratl", Some(bbox));
        assert_eq!(opts.subset_region(), Some(&bbox));
    }

    #[test]
    fn test_assemble_sorts_steps_and_levels() {
        let file = decoded(vec![
            message("t", Some(250.0), 6, 3.0),
            message("t", Some(850.0), 0, 1.0),
            message("t", Some(250.0), 0, 2.0),
            message("t", Some(850.0), 6, 4.0),
        ]);
        let ds = assemble(vec![file], run(), None).unwrap();
        assert_eq!(ds.steps, vec![0, 6]);
        assert_eq!(ds.levels, vec![850.0, 250.0]);
        assert_eq!(ds.level_slice("t", 0, 0).unwrap()[0], 1.0);
        assert_eq!(ds.level_slice("t", 0, 1).unwrap()[0], 2.0);
        assert_eq!(ds.level_slice("t", 1, 1).unwrap()[0], 3.0);
    }

    #[test]
    fn test_assemble_fills_missing_steps() {
        let file = decoded(vec![
            message("2t", None, 0, 280.0),
            message("msl", None, 0, 1.0e5),
            message("msl", None, 3, 1.0e5),
        ]);
        let ds = assemble(vec![file], run(), None).unwrap();
        assert!(ds.step_slice("2t", 1).unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(ds.step_slice("msl", 1).unwrap()[0], 1.0e5);
    }

    #[test]
    fn test_assemble_filters_variables() {
        let file = decoded(vec![message("2t", None, 0, 1.0), message("msl", None, 0, 2.0)]);
        let wanted = vec!["msl".to_string()];
        let ds = assemble(vec![file], run(), Some(&wanted)).unwrap();
        assert_eq!(ds.field_names(), vec!["msl"]);

        let file = decoded(vec![message("2t", None, 0, 1.0)]);
        assert!(assemble(vec![file], run(), Some(&wanted)).is_err());
    }

    #[test]
    fn test_preprocess_squeezes_single_level() {
        let file = decoded(vec![message("gh", Some(250.0), 0, 1.0)]);
        let mut ds = assemble(vec![file], run(), None).unwrap();
        preprocess(&mut ds);
        assert!(ds.levels.is_empty());
        assert_eq!(ds.attrs.get("level").map(String::as_str), Some("250"));
    }

    #[test]
    fn test_preprocess_fixes_gust_units() {
        let mut ds = assemble(vec![decoded(vec![message("VMAX_10M", None, 0, 1.0)])], run(), None)
            .unwrap();
        preprocess(&mut ds);
        assert_eq!(ds.field("VMAX_10M").unwrap().units, Units::MetrePerSecond);
    }
}
