
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::detection::{Algorithm, DetectionParams};
use crate::enrich::EnrichOptions;

pub const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".embedding-communities";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub enrich: EnrichOptions,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub algorithm: Algorithm,
    pub k_neighbors: usize,
    /// Omit for the size-based default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
    pub seed: u64,
    pub n_iterations: usize,
    pub resolution: f64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectionParams::default();
        Self {
            algorithm: params.algorithm,
            k_neighbors: params.k_neighbors,
            n_clusters: params.n_clusters,
            seed: params.seed,
            n_iterations: params.n_iterations,
            resolution: params.resolution,
            n_init: params.n_init,
            max_iter: params.max_iter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum rows read from an SQLite store, 0 for no limit
    pub limit: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { limit: 2000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid neighbor count: {0} (must be between 1 and 1000)")]
    InvalidKNeighbors(usize),
    #[error("Invalid cluster count: {0} (must be between 1 and 1000)")]
    InvalidClusterCount(usize),
    #[error("Invalid iteration count: {0} (must be between 1 and 1000)")]
    InvalidIterations(usize),
    #[error("Invalid resolution: {0} (must be a positive number)")]
    InvalidResolution(f64),
    #[error("Invalid restart count: {0} (must be between 1 and 100)")]
    InvalidRestarts(usize),
    #[error("Invalid max iterations: {0} (must be between 1 and 10000)")]
    InvalidMaxIter(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// `~/.embedding-communities`, or the platform data directory on Windows
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("embedding-communities"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`; a missing file yields the defaults
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Default::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::default_dir().context("Failed to determine config directory")?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()
    }

    /// Row limit for SQLite input, `None` when unlimited
    #[inline]
    pub fn database_limit(&self) -> Option<u32> {
        (self.database.limit > 0).then_some(self.database.limit)
    }

    #[inline]
    pub fn to_detection_params(&self) -> DetectionParams {
        let detection = &self.detection;
        DetectionParams {
            algorithm: detection.algorithm,
            k_neighbors: detection.k_neighbors,
            n_clusters: detection.n_clusters,
            seed: detection.seed,
            n_iterations: detection.n_iterations,
            resolution: detection.resolution,
            n_init: detection.n_init,
            max_iter: detection.max_iter,
        }
    }
}

impl DetectionConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.k_neighbors) {
            return Err(ConfigError::InvalidKNeighbors(self.k_neighbors));
        }

        if let Some(n_clusters) = self.n_clusters.filter(|n| !(1..=1000).contains(n)) {
            return Err(ConfigError::InvalidClusterCount(n_clusters));
        }

        if !(1..=1000).contains(&self.n_iterations) {
            return Err(ConfigError::InvalidIterations(self.n_iterations));
        }

        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(ConfigError::InvalidResolution(self.resolution));
        }

        if !(1..=100).contains(&self.n_init) {
            return Err(ConfigError::InvalidRestarts(self.n_init));
        }

        if !(1..=10_000).contains(&self.max_iter) {
            return Err(ConfigError::InvalidMaxIter(self.max_iter));
        }

        Ok(())
    }
}
