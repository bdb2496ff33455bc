//! Error types for ssb-core
//!
//! Every failure the sync engine can report is a variant here. Adapter
//! crates map their SDK errors into these variants.

use thiserror::Error;

/// Result type alias for ssb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ssb operations
#[derive(Error, Debug)]
pub enum Error {
    /// No `ssbconfig.ini` in the start directory or any parent
    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    /// The config file exists but is malformed or incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bucket unreachable, misnamed, or credentials rejected
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    /// An upload or delete was rejected
    #[error("Object store write failed: {0}")]
    StoreWrite(String),

    /// The store reported more pages without a continuation token
    #[error("Invalid listing response: {0}")]
    InvalidListing(String),

    /// Local source root missing or unreadable
    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StoreWrite("backups/a.txt: AccessDenied".to_string());
        assert_eq!(
            err.to_string(),
            "Object store write failed: backups/a.txt: AccessDenied"
        );
    }
}
