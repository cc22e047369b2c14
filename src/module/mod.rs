// src/module/mod.rs

//! Module identifiers and where their environments live on disk.
//!
//! - [`spec`] parses identifiers into [`ModuleSpec`].
//! - [`path`] maps a spec to its environment directory and the tools inside it.

pub mod path;
pub mod spec;

pub use path::{resolve, venv_pip, venv_python};
pub use spec::{ModuleSource, ModuleSpec, VcsScheme, LATEST};
