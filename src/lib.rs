// src/lib.rs

pub mod cli;
pub mod config;
pub mod connector;
pub mod env;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod module;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{ConnectorConfig, RawConnectorConfig, default_config_path, load_from_path};
use crate::connector::ConnectorFactory;
use crate::exec::PluginHandle;

/// High-level entry point used by `main.rs`.
///
/// Builds a connector from the config file plus CLI overrides, then runs
/// the requested subcommand against it.
pub async fn run(args: CliArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    debug!(?config, "effective configuration");

    let factory = ConnectorFactory::new();
    let connector = factory
        .create(&config)
        .await
        .context("failed to create connector")?;

    match &args.command {
        Command::Path { module } => {
            let path = connector.environment_path(module)?;
            println!("{}", path.display());
        }
        Command::Pull { module } => {
            let spec = connector.pull(module).await?;
            let path = connector.environment_path(module)?;
            info!(module = %spec, ?path, "module environment ready");
            println!("{}", path.display());
        }
        Command::Run { module } => {
            let handle = connector.deploy(module).await?;
            bridge_stdio(handle).await?;
        }
    }

    Ok(())
}

/// Merge the optional config file with CLI overrides and validate.
fn resolve_config(args: &CliArgs) -> Result<ConnectorConfig> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_from_path(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?
            } else {
                RawConnectorConfig::default()
            }
        }
    };

    if let Some(workdir) = &args.workdir {
        raw.workdir = Some(workdir.clone());
    }
    if let Some(python) = &args.python {
        raw.python_path = Some(python.clone());
    }
    if let Some(semver) = &args.python_semver {
        raw.python_semver = Some(semver.clone());
    }
    if let Some(policy) = args.pull_policy {
        raw.module_pull_policy = Some(policy);
    }

    Ok(ConnectorConfig::try_from(raw)?)
}

/// Bridge this process's stdin/stdout to the plugin until the plugin closes
/// its stdout or Ctrl-C arrives.
async fn bridge_stdio(handle: PluginHandle) -> Result<()> {
    let module = handle.id().to_string();
    let stdin = exec::detached_stdin().context("failed to start stdin reader")?;
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(%module, error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let end = exec::bridge(handle, stdin, tokio::io::stdout(), interrupt).await?;
    debug!(?end, "plugin session finished");
    Ok(())
}
