//! ObjectStore trait definition
//!
//! This trait defines the interface for the remote side of a sync.
//! It is implemented by the S3 adapter and by mocks in tests.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::Result;

/// Metadata for a single file, local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Path relative to the binding's local root or remote prefix
    pub key: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time, whole seconds
    pub mtime: Timestamp,
}

impl ObjectRecord {
    /// Create a record, truncating `mtime` to whole seconds
    pub fn new(key: impl Into<String>, size: u64, mtime: Timestamp) -> Self {
        Self {
            key: key.into(),
            size,
            mtime: truncate_to_second(mtime),
        }
    }
}

/// Records keyed by their relative path
pub type ObjectMap = BTreeMap<String, ObjectRecord>;

/// One page of a remote listing
///
/// Record keys are raw store keys; prefix stripping happens in the aggregator.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<ObjectRecord>,
    pub next_token: Option<String>,
    pub truncated: bool,
}

/// Drop sub-second precision, rounding toward the past
pub fn truncate_to_second(ts: Timestamp) -> Timestamp {
    let mut secs = ts.as_second();
    if ts.subsec_nanosecond() < 0 {
        secs -= 1;
    }
    Timestamp::from_second(secs).unwrap_or(ts)
}

/// Remote object storage operations needed by the sync engine
///
/// Implementations hold no per-binding state; a single instance is shared
/// across all bindings of a run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check that the bucket exists and is reachable with the current credentials
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Fetch one page of objects under `prefix`, continuing from `continuation_token`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;

    /// Upload a local file to `key`
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    /// Delete the object at `key`
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}
