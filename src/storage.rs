//! Object storage collaborators.
//!
//! # Architecture
//!
//! - [`ObjectStore`]: the two calls the extractor needs, fetch and put
//! - [`S3Store`]: the deployed backend, built from a shared SDK config
//! - [`LocalStore`]: a directory tree laid out as `<root>/<bucket>/<key>`,
//!   used for offline runs against saved pages
//! - [`Store`]: whichever of the two the command line selected

use crate::error::PipelineError;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Fetch and store whole objects by `(bucket, key)`.
pub trait ObjectStore {
    /// Read every byte of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError>;

    /// Create or overwrite an object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError>;
}

/// S3-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

impl ObjectStore for S3Store {
    #[instrument(level = "info", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(DisplayErrorContext(&e).to_string()))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?
            .into_bytes();
        debug!(bytes = body.len(), "Fetched object");
        Ok(body.to_vec())
    }

    #[instrument(level = "info", skip(self, body), fields(bytes = body.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| PipelineError::Storage(DisplayErrorContext(&e).to_string()))?;
        info!("Stored object");
        Ok(())
    }
}

/// Filesystem-backed [`ObjectStore`]. Content types are not persisted.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map `(bucket, key)` to a path under the root. Keys that would climb
    /// out of the bucket directory are refused.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." || escapes {
            return Err(PipelineError::Storage(format!(
                "refusing object path outside store: {bucket}/{key}"
            )));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

impl ObjectStore for LocalStore {
    #[instrument(level = "info", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.object_path(bucket, key)?;
        let body = fs::read(&path).await.map_err(|e| {
            PipelineError::Storage(format!("reading {}: {}", path.display(), e))
        })?;
        debug!(bytes = body.len(), path = %path.display(), "Read local object");
        Ok(body)
    }

    #[instrument(level = "info", skip(self, body), fields(bytes = body.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;
        info!(path = %path.display(), content_type, "Wrote local object");
        Ok(())
    }
}

/// Backend chosen at startup.
#[derive(Debug, Clone)]
pub enum Store {
    S3(S3Store),
    Local(LocalStore),
}

impl ObjectStore for Store {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        match self {
            Store::S3(store) => store.get_object(bucket, key).await,
            Store::Local(store) => store.get_object(bucket, key).await,
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        match self {
            Store::S3(store) => store.put_object(bucket, key, body, content_type).await,
            Store::Local(store) => store.put_object(bucket, key, body, content_type).await,
        }
    }
}
