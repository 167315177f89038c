//! Run configuration for the download and plotting jobs.
//!
//! Built from the environment (`MODEL_DATA_FOLDER`, `HOME_FOLDER`,
//! `MAPBOX_KEY`) and optionally refined by a YAML file, then passed
//! explicitly into every component.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ForecastError, ForecastResult};

pub const DEFAULT_DATA_FOLDER: &str = "/home/ekman/ssd/guido/ecmwf-hres/";

/// Projections whose images are written straight into the images folder.
const ROOT_FOLDER_PROJECTIONS: &[&str] = &["nh", "mexico"];

/// Output figure geometry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FigureConfig {
    #[serde(default = "default_width_in")]
    pub width_in: f32,
    #[serde(default = "default_height_in")]
    pub height_in: f32,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_width_in() -> f32 {
    12.0
}

fn default_height_in() -> f32 {
    9.0
}

fn default_dpi() -> u32 {
    100
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            width_in: default_width_in(),
            height_in: default_height_in(),
            dpi: default_dpi(),
        }
    }
}

impl FigureConfig {
    /// Figure size in pixels.
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f32).round() as u32,
            (self.height_in * self.dpi as f32).round() as u32,
        )
    }
}

/// Optional settings read from a YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub data_folder: Option<PathBuf>,
    #[serde(default)]
    pub images_folder: Option<PathBuf>,
    #[serde(default)]
    pub home_folder: Option<PathBuf>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub processes: Option<usize>,
    #[serde(default)]
    pub figure: Option<FigureConfig>,
}

impl ConfigOverrides {
    pub fn from_yaml_file(path: &Path) -> ForecastResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let overrides: ConfigOverrides = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration overrides");
        Ok(overrides)
    }
}

/// Configuration shared by every stage of a plotting run.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Where the GRIB files live
    pub data_folder: PathBuf,
    /// Root of the image output tree
    pub images_folder: PathBuf,
    /// Project home holding palettes, shapefiles, fonts and the city cache
    pub home_folder: PathBuf,
    /// Geocoding credential, only needed on a city cache miss
    pub mapbox_key: Option<String>,
    /// Forecast steps handled by one worker task
    pub chunk_size: usize,
    /// Worker pool size
    pub processes: usize,
    pub figure: FigureConfig,
}

impl ForecastConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_folder = lookup("MODEL_DATA_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FOLDER));

        let home_folder = lookup("HOME_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(default_home_folder);

        let mapbox_key = lookup("MAPBOX_KEY").filter(|k| !k.is_empty());

        Self {
            images_folder: data_folder.clone(),
            data_folder,
            home_folder,
            mapbox_key,
            chunk_size: 10,
            processes: 4,
            figure: FigureConfig::default(),
        }
    }

    /// Apply settings from a YAML override file.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> ForecastResult<Self> {
        if let Some(folder) = overrides.data_folder {
            if overrides.images_folder.is_none() {
                self.images_folder = folder.clone();
            }
            self.data_folder = folder;
        }
        if let Some(folder) = overrides.images_folder {
            self.images_folder = folder;
        }
        if let Some(home) = overrides.home_folder {
            self.home_folder = home;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(processes) = overrides.processes {
            self.processes = processes;
        }
        if let Some(figure) = overrides.figure {
            self.figure = figure;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.chunk_size == 0 {
            return Err(ForecastError::Config("chunk_size must be positive".into()));
        }
        if self.processes == 0 {
            return Err(ForecastError::Config("processes must be positive".into()));
        }
        if self.figure.dpi == 0 || self.figure.width_in <= 0.0 || self.figure.height_in <= 0.0 {
            return Err(ForecastError::Config("figure size must be positive".into()));
        }
        Ok(())
    }

    /// Log the effective settings once at startup.
    pub fn log_summary(&self) {
        info!(
            data_folder = %self.data_folder.display(),
            images_folder = %self.images_folder.display(),
            home_folder = %self.home_folder.display(),
            chunk_size = self.chunk_size,
            processes = self.processes,
            geocoding = self.mapbox_key.is_some(),
            "Configuration loaded"
        );
    }

    /// Output folder for a projection.
    pub fn subfolder_for(&self, projection: &str) -> PathBuf {
        if ROOT_FOLDER_PROJECTIONS.contains(&projection) {
            self.images_folder.clone()
        } else {
            self.images_folder.join(projection)
        }
    }

    fn plotting_dir(&self) -> PathBuf {
        self.home_folder.join("plotting")
    }

    /// RGBA table backing a named palette.
    pub fn palette_path(&self, name: &str) -> PathBuf {
        self.plotting_dir().join(format!("cmap_{}.rgba", name))
    }

    pub fn cities_cache_path(&self) -> PathBuf {
        self.plotting_dir().join("cities_coordinates.csv")
    }

    pub fn shapefile_dir(&self) -> PathBuf {
        self.plotting_dir().join("shapefiles")
    }

    /// Font files tried in order for map text.
    pub fn font_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.plotting_dir().join("fonts").join("DejaVuSans.ttf"),
            PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            PathBuf::from("/usr/share/fonts/TTF/DejaVuSans.ttf"),
            PathBuf::from("/usr/share/fonts/dejavu/DejaVuSans.ttf"),
        ]
    }
}

/// Two levels above the running executable, mirroring a checkout layout
/// where binaries sit in `<home>/bin`.
fn default_home_folder() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
