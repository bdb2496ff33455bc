//! Reconciliation of local and remote object maps
//!
//! Planning is pure: [`plan_actions`] compares two maps and returns the
//! mutations that make the remote side mirror the local side. [`Reconciler`]
//! then executes a plan against an [`ObjectStore`] for one binding.
//!
//! Deletes are planned before uploads. A key present on both sides is only
//! re-uploaded when the local copy is strictly newer *and* its size differs;
//! a touched file with the same size, or a resized file whose mtime is not
//! newer, is left alone.

use std::fmt;

use humansize::{BINARY, format_size};

use crate::binding::SyncBinding;
use crate::error::Error;
use crate::traits::{ObjectMap, ObjectRecord, ObjectStore};

/// A single store mutation, keyed relative to the binding prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Delete { key: String },
    Upload { key: String },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            SyncAction::Delete { key } | SyncAction::Upload { key } => key,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Delete { key } => write!(f, "- {key}"),
            SyncAction::Upload { key } => write!(f, "+ {key}"),
        }
    }
}

/// Whether a file present on both sides must be uploaded again
pub fn needs_upload(local: &ObjectRecord, remote: &ObjectRecord) -> bool {
    let newer = local.mtime > remote.mtime;
    let resized = local.size != remote.size;
    newer && resized
}

/// Compute the actions that make `remote` mirror `local`
///
/// Deletes come first and only when `sync_deletes` is set; both groups are
/// ordered by key.
pub fn plan_actions(local: &ObjectMap, remote: &ObjectMap, sync_deletes: bool) -> Vec<SyncAction> {
    let mut actions = Vec::new();

    if sync_deletes {
        for key in remote.keys() {
            if !local.contains_key(key) {
                actions.push(SyncAction::Delete { key: key.clone() });
            }
        }
    }

    for (key, local_record) in local {
        match remote.get(key) {
            None => actions.push(SyncAction::Upload { key: key.clone() }),
            Some(remote_record) if needs_upload(local_record, remote_record) => {
                tracing::debug!(key = %key, "Local object differs from remote");
                actions.push(SyncAction::Upload { key: key.clone() });
            }
            Some(_) => {}
        }
    }

    actions
}

/// Outcome of applying a plan to one binding
#[derive(Debug, Default)]
pub struct SyncReport {
    pub uploaded: usize,
    pub deleted: usize,
    pub failed: Vec<(SyncAction, Error)>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of actions attempted
    pub fn total(&self) -> usize {
        self.uploaded + self.deleted + self.failed.len()
    }
}

/// Executes planned actions for one binding
pub struct Reconciler<'a> {
    store: &'a dyn ObjectStore,
    binding: &'a SyncBinding,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn ObjectStore, binding: &'a SyncBinding) -> Self {
        Self { store, binding }
    }

    /// Plan and apply in one step
    pub async fn reconcile(&self, local: &ObjectMap, remote: &ObjectMap) -> SyncReport {
        let actions = plan_actions(local, remote, self.binding.sync_deletes);
        tracing::debug!(
            binding = %self.binding.name,
            actions = actions.len(),
            "Planned reconciliation"
        );
        self.apply(&actions, local).await
    }

    /// Apply `actions` in order
    ///
    /// A failed action is logged and recorded; the remaining actions still run.
    pub async fn apply(&self, actions: &[SyncAction], local: &ObjectMap) -> SyncReport {
        let mut report = SyncReport::default();

        for action in actions {
            let remote_key = self.binding.remote_key(action.key());
            let result = match action {
                SyncAction::Delete { .. } => {
                    tracing::info!(bucket = %self.binding.bucket, key = %remote_key, "Deleting bucket object");
                    self.store
                        .delete_object(&self.binding.bucket, &remote_key)
                        .await
                }
                SyncAction::Upload { key } => {
                    let path = self.binding.local_path(key);
                    let size = local.get(key).map(|r| r.size).unwrap_or_default();
                    tracing::info!(
                        bucket = %self.binding.bucket,
                        key = %remote_key,
                        path = %path.display(),
                        size = %format_size(size, BINARY),
                        "Uploading"
                    );
                    self.store
                        .upload_file(&self.binding.bucket, &remote_key, &path)
                        .await
                }
            };

            match result {
                Ok(()) => match action {
                    SyncAction::Delete { .. } => report.deleted += 1,
                    SyncAction::Upload { .. } => report.uploaded += 1,
                },
                Err(e) => {
                    tracing::error!(key = %remote_key, error = %e, "Sync action failed");
                    report.failed.push((action.clone(), e));
                }
            }
        }

        report
    }
}
