// src/env/mod.rs

//! Module environments on disk.
//!
//! - [`materializer`] runs `python -m venv` and `pip install` for a module.
//! - [`diagnostics`] holds the shared stderr capture used by both the
//!   install tools' callers and running plugins.

pub mod diagnostics;
pub mod materializer;

pub use diagnostics::{DEFAULT_DIAGNOSTIC_LIMIT, DiagnosticBuffer, spawn_relay};
pub use materializer::{Materializer, NON_INTERACTIVE_ENV, pip_install_args};
