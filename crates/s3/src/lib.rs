//! ssb-s3: S3 adapter for ssbc
//!
//! This crate implements the ObjectStore trait from ssb-core using aws-sdk-s3.

mod client;

pub use client::S3Client;
