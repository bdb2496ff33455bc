//! Local tree scanning
//!
//! Produces the local side of a reconciliation: every regular file under a
//! root, keyed by its `/`-separated path relative to that root.

use std::path::Path;

use jiff::Timestamp;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::traits::{ObjectMap, ObjectRecord};

/// Local filesystem operations needed by the sync engine
pub trait LocalTree: Send + Sync {
    /// Enumerate all regular files under `root`
    fn scan(&self, root: &Path) -> Result<ObjectMap>;
}

/// [`LocalTree`] backed by a recursive directory walk
#[derive(Debug, Clone, Default)]
pub struct FsScanner {
    /// Whether to descend into symlinked directories
    follow_links: bool,
}

impl FsScanner {
    /// Create a new scanner
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to follow symbolic links to directories
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

impl LocalTree for FsScanner {
    fn scan(&self, root: &Path) -> Result<ObjectMap> {
        if !root.exists() {
            return Err(Error::Filesystem(format!(
                "Source {} does not exist",
                root.display()
            )));
        }

        if !root.is_dir() {
            return Err(Error::Filesystem(format!(
                "Source {} is not a directory",
                root.display()
            )));
        }

        let mut files = ObjectMap::new();

        for entry in WalkDir::new(root).follow_links(self.follow_links) {
            let entry = entry.map_err(|e| {
                let failed = e.path().unwrap_or(root);
                Error::Filesystem(format!("Failed to read {}: {e}", failed.display()))
            })?;

            // Symlinked files count as files; their target supplies the metadata
            let metadata = std::fs::metadata(entry.path()).map_err(|e| {
                Error::Filesystem(format!("Failed to stat {}: {e}", entry.path().display()))
            })?;
            if !metadata.is_file() {
                continue;
            }

            let key = relative_key(root, entry.path())?;
            let modified = metadata.modified().map_err(|e| {
                Error::Filesystem(format!("No mtime for {}: {e}", entry.path().display()))
            })?;
            let mtime = Timestamp::try_from(modified).map_err(|e| {
                Error::Filesystem(format!("Bad mtime for {}: {e}", entry.path().display()))
            })?;

            tracing::trace!(key = %key, size = metadata.len(), "Found local file");
            files.insert(key.clone(), ObjectRecord::new(key, metadata.len(), mtime));
        }

        tracing::debug!(root = %root.display(), count = files.len(), "Scanned local tree");
        Ok(files)
    }
}

/// `/`-joined path of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::Filesystem(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;

    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                Error::Filesystem(format!("Non UTF-8 file name: {}", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(parts.join("/"))
}
