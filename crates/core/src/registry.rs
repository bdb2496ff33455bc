//! Sync unit registry
//!
//! Holds the bindings discovered from configuration and runs them one after
//! another: scan local, list remote, reconcile. A binding that fails does
//! not stop the ones after it.

use crate::binding::SyncBinding;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::listing::RemoteListing;
use crate::reconcile::{Reconciler, SyncReport};
use crate::scanner::LocalTree;
use crate::traits::ObjectStore;

/// Result of syncing one binding
#[derive(Debug)]
pub struct BindingOutcome {
    pub name: String,
    pub result: Result<SyncReport>,
}

impl BindingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_success())
    }
}

/// Per-binding outcomes of a whole run, in binding order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<BindingOutcome>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(BindingOutcome::is_success)
    }

    /// Failed bindings plus failed individual actions
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(report) => report.failed.len(),
                Err(_) => 1,
            })
            .sum()
    }

    pub fn uploaded(&self) -> usize {
        self.reports().map(|r| r.uploaded).sum()
    }

    pub fn deleted(&self) -> usize {
        self.reports().map(|r| r.deleted).sum()
    }

    fn reports(&self) -> impl Iterator<Item = &SyncReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Ordered set of bindings to keep in sync
#[derive(Debug, Clone, Default)]
pub struct SyncRegistry {
    bindings: Vec<SyncBinding>,
}

impl SyncRegistry {
    pub fn new(bindings: Vec<SyncBinding>) -> Self {
        Self { bindings }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.bindings.clone())
    }

    pub fn bindings(&self) -> &[SyncBinding] {
        &self.bindings
    }

    /// Sync every binding sequentially, in configuration order
    pub async fn sync_all(&self, store: &dyn ObjectStore, local: &dyn LocalTree) -> RunSummary {
        let mut summary = RunSummary::default();

        for binding in &self.bindings {
            tracing::info!(binding = %binding, "Syncing");
            let result = sync_binding(binding, store, local).await;

            match &result {
                Ok(report) => tracing::info!(
                    binding = %binding.name,
                    uploaded = report.uploaded,
                    deleted = report.deleted,
                    failed = report.failed.len(),
                    "Binding synced"
                ),
                Err(e) => tracing::error!(binding = %binding.name, error = %e, "Binding failed"),
            }

            summary.outcomes.push(BindingOutcome {
                name: binding.name.clone(),
                result,
            });
        }

        summary
    }
}

/// Scan, list and reconcile a single binding
///
/// Errors returned here are binding-level; per-action failures end up in the report.
pub async fn sync_binding(
    binding: &SyncBinding,
    store: &dyn ObjectStore,
    local: &dyn LocalTree,
) -> Result<SyncReport> {
    store.head_bucket(&binding.bucket).await?;

    let local_objects = local.scan(&binding.source)?;
    let remote_objects = RemoteListing::new(store, &binding.bucket, binding.prefix())
        .collect_map()
        .await?;
    tracing::debug!(
        binding = %binding.name,
        local = local_objects.len(),
        remote = remote_objects.len(),
        "Comparing object maps"
    );

    Ok(Reconciler::new(store, binding)
        .reconcile(&local_objects, &remote_objects)
        .await)
}
