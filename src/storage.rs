use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;

/// StorageService
///
/// Contract for the object store holding uploaded news images. Handlers only see
/// this trait, so the S3 client and the in-memory mock are interchangeable.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if it is missing. Used for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Stores `body` under `key`. The error string is for logs only.
    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<(), String>;
}

/// S3StorageClient
///
/// S3-compatible client. Works against MinIO locally and any S3 endpoint in
/// production; path-style addressing is required by MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket_name).send().await {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<(), String> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never climb out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory stand-in used by the test-suite. Records every stored key and can
/// be switched to fail every write.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true, ..Self::default() }
    }

    /// Keys written so far, in order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn put_object(&self, key: &str, _content_type: &str, _body: Vec<u8>) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        self.stored
            .lock()
            .map_err(|e| e.to_string())?
            .push(sanitize_key(key));
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
