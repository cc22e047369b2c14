// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::PullPolicy;

/// Command-line arguments for `venvdeploy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "venvdeploy",
    version,
    about = "Install Python plugin modules into isolated virtualenvs and run them over stdio.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `venvdeploy.toml` in the current working directory, if it
    /// exists.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory connectors and module environments are created under.
    #[arg(long, value_name = "DIR", global = true)]
    pub workdir: Option<PathBuf>,

    /// Interpreter used to create environments (path or name on PATH).
    #[arg(long, value_name = "PATH", global = true)]
    pub python: Option<String>,

    /// Interpreter version used in connector directory names.
    ///
    /// Detected with `python --version` when omitted.
    #[arg(long, value_name = "X.Y.Z", global = true)]
    pub python_semver: Option<String>,

    /// Module pull policy (Always, IfNotPresent).
    #[arg(long, value_name = "POLICY", global = true)]
    pub pull_policy: Option<PullPolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VENVDEPLOY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the environment directory a module identifier resolves to.
    Path {
        /// Module identifier, e.g. `pkg@1.2.3` or `pkg@git+https://host/repo.git@abc123`.
        module: String,
    },
    /// Materialize a module's environment without starting it.
    Pull { module: String },
    /// Deploy a module and bridge this process's stdin/stdout to it.
    Run { module: String },
}

impl Command {
    pub fn module(&self) -> &str {
        match self {
            Command::Path { module } | Command::Pull { module } | Command::Run { module } => {
                module
            }
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
