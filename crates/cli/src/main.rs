//! ssbc - S3 backup sync
//!
//! Mirrors local directories into S3 bucket folders as configured by the
//! nearest `ssbconfig.ini`.

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;

/// Synchronize local directories to S3 bucket folders
#[derive(Parser, Debug)]
#[command(name = "ssbc", version, about)]
struct Cli {
    /// Log verbosity (RUST_LOG overrides when set)
    #[arg(long, value_enum, default_value = "WARN")]
    log: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARN")]
    Warn,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    /// Filter directive: our crates at the chosen level, dependencies at warn or above
    fn directive(self) -> String {
        let (ours, deps) = match self {
            LogLevel::Debug => ("debug", "warn"),
            LogLevel::Info => ("info", "warn"),
            LogLevel::Warn => ("warn", "warn"),
            LogLevel::Error => ("error", "error"),
        };
        format!("{deps},ssbc={ours},ssb_core={ours},ssb_s3={ours}")
    }
}

fn init_logging(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log);

    commands::sync::execute().await.into()
}
