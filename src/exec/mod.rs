// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ModuleBackend` trait and the production
//!   `PythonBackend`; tests swap in a fake.
//! - [`launcher`] spawns a module inside its environment with piped stdio.
//! - [`process`] abstracts the signal/wait capability of a spawned plugin.
//! - [`handle`] is the live plugin stream and its kill-and-clean teardown.
//! - [`bridge`] relays a local reader/writer pair through a plugin.

pub mod backend;
pub mod bridge;
pub mod handle;
pub mod launcher;
pub mod process;

pub use backend::{BackendFuture, ModuleBackend, PythonBackend};
pub use bridge::{BridgeEnd, bridge, detached_stdin};
pub use handle::PluginHandle;
pub use launcher::{ATP_FLAG, launch};
pub use process::{
    ChildProcess, LaunchedPlugin, PluginProcess, PluginStdin, PluginStdout, ProcessExit,
};
