//! ssb-core: Core library for the ssbc S3 backup tool
//!
//! This crate provides everything needed to mirror local directory trees
//! into S3 bucket prefixes, including:
//! - Configuration discovery and parsing (`ssbconfig.ini`)
//! - Local tree scanning
//! - Paginated remote listing aggregation
//! - Reconciliation of local and remote object maps
//! - The ObjectStore trait the S3 adapter implements
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! so the sync logic can be tested against mocks.

pub mod binding;
pub mod config;
pub mod error;
pub mod listing;
pub mod reconcile;
pub mod registry;
pub mod scanner;
pub mod traits;

pub use binding::SyncBinding;
pub use config::{CONFIG_FILE_NAME, StoreSettings, SyncConfig, discover_config};
pub use error::{Error, Result};
pub use listing::{PaginationCursor, RemoteListing, normalize_key};
pub use reconcile::{Reconciler, SyncAction, SyncReport, needs_upload, plan_actions};
pub use registry::{BindingOutcome, RunSummary, SyncRegistry, sync_binding};
pub use scanner::{FsScanner, LocalTree};
pub use traits::{ListPage, ObjectMap, ObjectRecord, ObjectStore, truncate_to_second};
