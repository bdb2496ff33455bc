//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from ssb-core.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::DateTime;
use jiff::Timestamp;
use ssb_core::{Error, ListPage, ObjectRecord, ObjectStore, Result, StoreSettings};

/// Fallback region when neither the config file nor the environment sets one
const DEFAULT_REGION: &str = "us-east-1";

/// Files larger than this are sent as multipart uploads
const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Smallest part size used for multipart uploads
const MIN_PART_SIZE: u64 = 64 * 1024 * 1024;

/// S3 limit on parts per upload
const MAX_PARTS: u64 = 10_000;

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    ///
    /// Settings from `[store]` override the AWS default provider chain.
    pub async fn new(settings: &StoreSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "ssb-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(region) = &settings.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.force_path_style);
        if config.region().is_none() {
            s3_config = s3_config.region(aws_config::Region::new(DEFAULT_REGION));
        }

        Self::from_client(aws_sdk_s3::Client::from_conf(s3_config.build()))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Upload `path` in parts; the upload is aborted if any step fails
    async fn upload_multipart(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut request = self.inner.create_multipart_upload().bucket(bucket).key(key);
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        let created = request
            .send()
            .await
            .map_err(|e| Error::StoreWrite(format!("{key}: {}", Self::format_sdk_error(&e))))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::StoreWrite(format!("{key}: no multipart upload id returned")))?
            .to_string();

        let result = self
            .send_parts(bucket, key, path, size, &upload_id)
            .await;

        if result.is_err() {
            tracing::warn!(bucket, key, upload_id = %upload_id, "Aborting multipart upload");
            if let Err(e) = self
                .inner
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::error!(key, error = %Self::format_sdk_error(&e), "Failed to abort multipart upload");
            }
        }

        result
    }

    async fn send_parts(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        size: u64,
        upload_id: &str,
    ) -> Result<()> {
        let ranges = part_ranges(size, part_size_for(size));
        tracing::debug!(key, parts = ranges.len(), "Starting multipart upload");

        let mut completed = Vec::with_capacity(ranges.len());
        for (index, (offset, length)) in ranges.into_iter().enumerate() {
            let part_number = index as i32 + 1;
            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| {
                    Error::StoreWrite(format!("{key}: cannot read {}: {e}", path.display()))
                })?;

            let response = self
                .inner
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    Error::StoreWrite(format!(
                        "{key} part {part_number}: {}",
                        Self::format_sdk_error(&e)
                    ))
                })?;

            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .build(),
            );
        }

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| Error::StoreWrite(format!("{key}: {}", Self::format_sdk_error(&e))))?;

        Ok(())
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &aws_sdk_s3::error::SdkError<E>) -> String {
        match error {
            aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {}", err);
                if let Some(code) = meta.headers().get("x-amz-error-code") {
                    msg.push_str(&format!(" (code: {})", code));
                }
                msg.push_str(&format!(" (status: {})", meta.status().as_u16()));
                msg
            }
            aws_sdk_s3::error::SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::TimeoutError(_) => "Request timeout".to_string(),
            aws_sdk_s3::error::SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::ResponseError(err) => {
                format!("Response error: {:?}", err)
            }
            _ => error.to_string(),
        }
    }
}

/// Part size for a file of `size` bytes, grown so the part count stays within S3's limit
fn part_size_for(size: u64) -> u64 {
    MIN_PART_SIZE.max(size.div_ceil(MAX_PARTS))
}

/// `(offset, length)` of each part; only the last part may be shorter
fn part_ranges(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    (0..size.div_ceil(part_size))
        .map(|i| {
            let offset = i * part_size;
            (offset, part_size.min(size - offset))
        })
        .collect()
}

/// Store timestamps are compared at whole-second precision
fn to_timestamp(dt: &DateTime) -> Option<Timestamp> {
    Timestamp::from_second(dt.secs()).ok()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                let err_str = Self::format_sdk_error(&e);
                if err_str.contains("NotFound") || err_str.contains("status: 404") {
                    Error::StoreUnavailable(format!("Bucket not found: {bucket}"))
                } else if err_str.contains("status: 403") {
                    Error::StoreUnavailable(format!("Access denied to bucket: {bucket}"))
                } else {
                    Error::StoreUnavailable(format!("{bucket}: {err_str}"))
                }
            })?;

        tracing::debug!(bucket, "Bucket reachable");
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| {
            Error::StoreUnavailable(format!("{bucket}: {}", Self::format_sdk_error(&e)))
        })?;

        let records = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().unwrap_or(0).max(0) as u64;
                let mtime = object
                    .last_modified()
                    .and_then(to_timestamp)
                    .unwrap_or(Timestamp::UNIX_EPOCH);
                Some(ObjectRecord::new(key, size, mtime))
            })
            .collect();

        Ok(ListPage {
            records,
            next_token: response.next_continuation_token().map(|s| s.to_string()),
            truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let size = std::fs::metadata(path)
            .map_err(|e| Error::StoreWrite(format!("{key}: cannot read {}: {e}", path.display())))?
            .len();
        let content_type = mime_guess::from_path(path).first_raw();

        if size > MULTIPART_THRESHOLD {
            return self
                .upload_multipart(bucket, key, path, size, content_type)
                .await;
        }

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::StoreWrite(format!("{key}: cannot read {}: {e}", path.display())))?;

        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body);

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| Error::StoreWrite(format!("{key}: {}", Self::format_sdk_error(&e))))?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::StoreWrite(format!("{key}: {}", Self::format_sdk_error(&e))))?;

        Ok(())
    }
}
