// Configuration management module
// TOML settings under ~/.embedding-communities and their display

pub mod display;
pub mod settings;

pub use display::{init_config, show_config};
pub use settings::{Config, ConfigError, DatabaseConfig, DetectionConfig, OutputConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
