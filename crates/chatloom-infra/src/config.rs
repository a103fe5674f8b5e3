//! File-based runtime configuration.
//!
//! Loads `RuntimeConfig` from a TOML file. A missing file is not an error:
//! every field has a default, so the runtime comes up with stock settings
//! and logs that it did.

use std::path::Path;

use chatloom_types::config::RuntimeConfig;
use thiserror::Error;
use tracing::info;

/// Errors from reading or parsing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load the runtime configuration from `path`.
///
/// A missing file yields the defaults; an unreadable or malformed file is
/// an error.
pub fn load_runtime_config(path: &Path) -> Result<RuntimeConfig, ConfigLoadError> {
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return Ok(RuntimeConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}
