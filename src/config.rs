//! Builder configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CALCULATION_CONFIGURATION: &str = "Default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid builder configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Stamped on every graph built with this configuration.
    pub calculation_configuration_name: String,
    /// Ceiling on the length of a chain of nested input requirements.
    pub max_resolution_depth: usize,
    /// Drop nodes no terminal output depends on after each requirement.
    pub prune_unreachable: bool,
    /// Where to write the structure dump when the graph is handed over.
    pub dump_path: Option<PathBuf>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            calculation_configuration_name: DEFAULT_CALCULATION_CONFIGURATION.to_string(),
            max_resolution_depth: 256,
            prune_unreachable: true,
            dump_path: None,
        }
    }
}

impl BuilderConfig {
    pub fn new(calculation_configuration_name: impl Into<String>) -> Self {
        Self { calculation_configuration_name: calculation_configuration_name.into(), ..Default::default() }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }
}
