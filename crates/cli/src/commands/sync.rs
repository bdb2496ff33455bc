//! sync command - Mirror every configured directory into its bucket folder
//!
//! Finds `ssbconfig.ini` from the current directory upward and runs each
//! binding it lists, in order.

use anyhow::Context;
use ssb_core::{FsScanner, RunSummary, SyncConfig, SyncRegistry};
use ssb_s3::S3Client;

use crate::exit_code::ExitCode;

/// Execute a sync run from the current directory
pub async fn execute() -> ExitCode {
    match run().await {
        Ok(summary) => finish(&summary),
        Err(e) => {
            if let Some(ssb_core::Error::ConfigNotFound(_)) = e.downcast_ref::<ssb_core::Error>() {
                tracing::error!("Config file not found. Are you sure this is a sync directory?");
            } else {
                tracing::error!("{e:#}");
            }
            ExitCode::GeneralError
        }
    }
}

async fn run() -> anyhow::Result<RunSummary> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config = SyncConfig::discover(&cwd)?;
    let registry = SyncRegistry::from_config(&config);

    if registry.bindings().is_empty() {
        tracing::warn!(path = %config.path.display(), "No directories listed in [dirs]");
        return Ok(RunSummary::default());
    }

    // One client for the whole run, shared by every binding
    let store = S3Client::new(&config.store).await;

    Ok(registry.sync_all(&store, &FsScanner::new()).await)
}

fn finish(summary: &RunSummary) -> ExitCode {
    tracing::info!(
        bindings = summary.outcomes.len(),
        uploaded = summary.uploaded(),
        deleted = summary.deleted(),
        failures = summary.failure_count(),
        "Sync complete"
    );

    if summary.is_success() {
        ExitCode::Success
    } else {
        tracing::error!(failures = summary.failure_count(), "Sync finished with errors");
        ExitCode::GeneralError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssb_core::{BindingOutcome, Error, SyncReport};

    #[test]
    fn test_finish_success() {
        let summary = RunSummary {
            outcomes: vec![BindingOutcome {
                name: "docs".to_string(),
                result: Ok(SyncReport {
                    uploaded: 2,
                    ..Default::default()
                }),
            }],
        };
        assert_eq!(finish(&summary), ExitCode::Success);
    }

    #[test]
    fn test_finish_with_binding_error() {
        let summary = RunSummary {
            outcomes: vec![BindingOutcome {
                name: "docs".to_string(),
                result: Err(Error::StoreUnavailable("NoSuchBucket".to_string())),
            }],
        };
        assert_eq!(finish(&summary), ExitCode::GeneralError);
    }

    #[test]
    fn test_finish_empty_run() {
        assert_eq!(finish(&RunSummary::default()), ExitCode::Success);
    }
}
