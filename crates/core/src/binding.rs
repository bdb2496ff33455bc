//! Sync bindings
//!
//! A binding ties one local source directory to one bucket prefix together
//! with its delete policy. Bindings are built once from configuration and
//! never mutated.

use std::fmt;
use std::path::PathBuf;

/// One (local root, bucket + prefix, delete policy) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBinding {
    /// Identifier from the `[dirs]` section
    pub name: String,

    /// Target bucket name
    pub bucket: String,

    /// Remote prefix, empty or ending with `/`
    prefix: String,

    /// Local source root
    pub source: PathBuf,

    /// Remove remote objects that no longer exist locally
    pub sync_deletes: bool,
}

impl SyncBinding {
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        folder: &str,
        source: impl Into<PathBuf>,
        sync_deletes: bool,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            prefix: normalize_prefix(folder),
            source: source.into(),
            sync_deletes,
        }
    }

    /// Remote prefix, always empty or terminated by `/`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full object key for a relative key
    pub fn remote_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Local file path for a relative key
    pub fn local_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.source.clone(), |path, part| path.join(part))
    }
}

impl fmt::Display for SyncBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> s3://{}/{})",
            self.name,
            self.source.display(),
            self.bucket,
            self.prefix
        )
    }
}

/// Trim leading separators and make sure a non-empty prefix ends with `/`
pub(crate) fn normalize_prefix(folder: &str) -> String {
    let trimmed = folder.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("backups"), "backups/");
        assert_eq!(normalize_prefix("backups/"), "backups/");
        assert_eq!(normalize_prefix("/backups/photos"), "backups/photos/");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_remote_key() {
        let binding = SyncBinding::new("docs", "my-bucket", "backups", "/data/docs", false);
        assert_eq!(binding.prefix(), "backups/");
        assert_eq!(binding.remote_key("a/b.txt"), "backups/a/b.txt");

        let root = SyncBinding::new("docs", "my-bucket", "", "/data/docs", false);
        assert_eq!(root.remote_key("a/b.txt"), "a/b.txt");
    }

    #[test]
    fn test_local_path() {
        let binding = SyncBinding::new("docs", "my-bucket", "", "/data/docs", true);
        assert_eq!(
            binding.local_path("sub/dir/file.txt"),
            PathBuf::from("/data/docs").join("sub").join("dir").join("file.txt")
        );
    }

    #[test]
    fn test_display() {
        let binding = SyncBinding::new("docs", "my-bucket", "backups", "/data/docs", true);
        assert_eq!(
            binding.to_string(),
            "docs (/data/docs -> s3://my-bucket/backups/)"
        );
    }
}
