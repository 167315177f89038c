//! Request groups: which parameters go into which file.
//!
//! The defaults match the figures the plotters draw. A YAML file
//! (`config/download.yaml`) can replace them:
//!
//! ```yaml
//! groups:
//!   - name: 2D
//!     params: [2t, tp, 10u, 10v, msl]
//!   - name: 3D_250
//!     params: [u, v, gh]
//!     level: 250
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Parameters fetched together and written to one file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestGroup {
    pub name: String,
    pub params: Vec<String>,
    /// Pressure level in hPa; `None` for surface parameters
    #[serde(default)]
    pub level: Option<u32>,
}

impl RequestGroup {
    pub fn surface(params: &[&str]) -> Self {
        Self {
            name: "2D".to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            level: None,
        }
    }

    pub fn pressure(level: u32, params: &[&str]) -> Self {
        Self {
            name: format!("3D_{}", level),
            params: params.iter().map(|p| p.to_string()).collect(),
            level: Some(level),
        }
    }

    /// Level type used in the open-data index.
    pub fn levtype(&self) -> &'static str {
        if self.level.is_some() {
            "pl"
        } else {
            "sfc"
        }
    }

    /// `{date}{time}_2D.grib2` or `{date}{time}_3D_{level}.grib2`.
    pub fn file_name(&self, date: &str, time: &str) -> String {
        match self.level {
            Some(level) => format!("{}{}_3D_{}.grib2", date, time, level),
            None => format!("{}{}_2D.grib2", date, time),
        }
    }
}

/// Where a group's file is written.
pub fn target_path(folder: &Path, date: &str, time: &str, group: &RequestGroup) -> PathBuf {
    folder.join(group.file_name(date, time))
}

/// The groups downloaded when no file overrides them.
pub fn default_groups() -> Vec<RequestGroup> {
    vec![
        RequestGroup::surface(&["2t", "tp", "10u", "10v", "msl"]),
        RequestGroup::pressure(850, &["t", "d", "r"]),
        RequestGroup::pressure(500, &["gh", "t"]),
        RequestGroup::pressure(250, &["u", "v", "gh"]),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_groups")]
    pub groups: Vec<RequestGroup>,
}

impl GroupsConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: GroupsConfig =
            serde_yaml::from_str(content).context("Failed to parse request groups")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a group file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(path = %path.display(), groups = config.groups.len(), "Loaded request groups");
        Ok(config)
    }

    /// Groups from `path` when given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("Using default request groups");
                Ok(Self {
                    groups: default_groups(),
                })
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            bail!("no request groups configured");
        }
        for group in &self.groups {
            if group.params.is_empty() {
                bail!("group {} has no parameters", group.name);
            }
        }
        let mut files: Vec<String> = self.groups.iter().map(|g| g.file_name("", "")).collect();
        files.sort();
        files.dedup();
        if files.len() != self.groups.len() {
            bail!("two request groups would write the same file");
        }
        Ok(())
    }
}
