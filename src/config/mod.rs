// src/config/mod.rs

//! Connector configuration.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Apply defaults and validate values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConnectorConfig, RawConnectorConfig};
pub use validate::validate_config;
