// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{ConnectorConfig, DEFAULT_PYTHON_PATH, RawConnectorConfig};
use crate::errors::{DeployError, Result};

static SEMVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+){0,2}$").expect("semver pattern is a valid regex"));

impl TryFrom<RawConnectorConfig> for ConnectorConfig {
    type Error = DeployError;

    fn try_from(raw: RawConnectorConfig) -> std::result::Result<Self, Self::Error> {
        let workdir = raw.workdir.ok_or_else(|| {
            DeployError::Configuration("`workdir` must be set (config file or --workdir)".into())
        })?;

        let python_path = raw
            .python_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PYTHON_PATH.to_string());

        let config = ConnectorConfig {
            python_path,
            workdir,
            python_semver: raw.python_semver.map(|v| v.trim().to_string()),
            module_pull_policy: raw.module_pull_policy.unwrap_or_default(),
        };
        validate_config(&config)?;
        Ok(config)
    }
}

/// Check a config's values independently of where it came from.
pub fn validate_config(cfg: &ConnectorConfig) -> Result<()> {
    if cfg.workdir.as_os_str().is_empty() {
        return Err(DeployError::Configuration(
            "`workdir` must not be empty".to_string(),
        ));
    }

    if cfg.python_path.trim().is_empty() {
        return Err(DeployError::Configuration(
            "`python_path` must not be empty".to_string(),
        ));
    }

    if let Some(semver) = &cfg.python_semver {
        if !SEMVER_RE.is_match(semver) {
            return Err(DeployError::Configuration(format!(
                "`python_semver` must look like 3.11.4 (got '{semver}')"
            )));
        }
    }

    Ok(())
}
