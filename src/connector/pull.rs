// src/connector/pull.rs

//! Per-connector record of which environments are ready to deploy from.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ModuleBackend;
use crate::module::ModuleSpec;
use crate::types::PullPolicy;

/// Serializes materializations and remembers which environment paths have
/// been materialized successfully.
///
/// A single async mutex guards the set and is held for the whole
/// materialization, so concurrent requests for the same environment wait
/// for the first one and then find the path cached. Requests for different
/// environments also queue behind it.
#[derive(Debug)]
pub struct PullCoordinator {
    policy: PullPolicy,
    ready: Mutex<HashSet<PathBuf>>,
}

impl PullCoordinator {
    pub fn new(policy: PullPolicy) -> Self {
        Self {
            policy,
            ready: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> PullPolicy {
        self.policy
    }

    /// Make sure `spec`'s environment is materialized according to the pull
    /// policy.
    ///
    /// A failed materialization leaves the path unmarked, so the next call
    /// tries again.
    pub async fn ensure<B>(&self, backend: &B, spec: &ModuleSpec) -> Result<()>
    where
        B: ModuleBackend + ?Sized,
    {
        let path = backend.module_path(spec);
        let mut ready = self.ready.lock().await;

        if self.policy == PullPolicy::IfNotPresent && ready.contains(&path) {
            debug!(module = %spec, ?path, "environment already materialized");
            return Ok(());
        }

        let on_disk = backend.module_exists(spec);
        info!(
            module = %spec,
            ?path,
            policy = %self.policy,
            on_disk,
            "materializing module environment"
        );

        if let Err(err) = backend.pull_module(spec, self.policy).await {
            warn!(module = %spec, ?path, error = %err, "module pull failed");
            return Err(err);
        }

        ready.insert(path);
        Ok(())
    }

    /// Whether `path` has been materialized by this coordinator.
    pub async fn is_ready(&self, path: &Path) -> bool {
        self.ready.lock().await.contains(path)
    }

    pub async fn ready_count(&self) -> usize {
        self.ready.lock().await.len()
    }
}
