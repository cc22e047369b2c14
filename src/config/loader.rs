// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConnectorConfig, RawConnectorConfig};
use crate::errors::{DeployError, Result};

/// Load a configuration file and return the raw, unvalidated model.
///
/// Only TOML deserialization happens here; use [`load_and_validate`] to also
/// apply defaults and check the values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConnectorConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| DeployError::at_path(path, e))?;

    let config: RawConnectorConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it into a [`ConnectorConfig`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConnectorConfig> {
    let raw = load_from_path(&path)?;
    ConnectorConfig::try_from(raw)
}

/// Config file picked up from the current directory when `--config` is not
/// given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("venvdeploy.toml")
}
