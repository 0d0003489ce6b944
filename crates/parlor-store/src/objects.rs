//! Object storage for encrypted file bytes
//!
//! Everything stored here is ciphertext under an opaque key; a breach of the
//! bucket alone yields nothing but blobs. Backed by any opendal service:
//! S3-compatible in production, the memory service in tests.

use anyhow::{Context, Result};
use opendal::Operator;

use parlor_core::config::StorageConfig;
use parlor_core::{ParlorError, ParlorResult};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    op: Operator,
}

impl ObjectStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// Build an S3-backed store (path-style addressing, required by MinIO
    /// and SeaweedFS; also the opendal default).
    ///
    /// If `enforce_tls` is set and the endpoint uses HTTP, this returns an
    /// error; otherwise a warning is logged for non-HTTPS endpoints.
    pub fn s3(
        config: &StorageConfig,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<Self> {
        if config.endpoint.starts_with("http://") {
            if config.enforce_tls {
                anyhow::bail!(
                    "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                    config.endpoint
                );
            }
            tracing::warn!(
                endpoint = %config.endpoint,
                "S3 endpoint uses plaintext HTTP — credentials are transmitted unencrypted"
            );
        }

        let builder = opendal::services::S3::default()
            .endpoint(&config.endpoint)
            .region(&config.region)
            .bucket(&config.bucket)
            .access_key_id(access_key_id)
            .secret_access_key(secret_access_key);

        let op = Operator::new(builder)
            .context("creating OpenDAL S3 operator")?
            .layer(opendal::layers::LoggingLayer::default())
            .layer(
                opendal::layers::RetryLayer::new()
                    .with_max_times(5)
                    .with_jitter(),
            )
            .finish();

        Ok(Self::new(op))
    }

    /// In-memory store for tests.
    pub fn memory() -> Result<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish();
        Ok(Self::new(op))
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>) -> ParlorResult<()> {
        self.op
            .write(key, bytes)
            .await
            .map_err(|e| ParlorError::Storage(format!("object put {key}: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> ParlorResult<Vec<u8>> {
        let buffer = self
            .op
            .read(key)
            .await
            .map_err(|e| match e.kind() {
                opendal::ErrorKind::NotFound => ParlorError::NotFound(format!("object {key}")),
                _ => ParlorError::Storage(format!("object get {key}: {e}")),
            })?;
        Ok(buffer.to_bytes().to_vec())
    }

    pub async fn delete(&self, key: &str) -> ParlorResult<()> {
        self.op
            .delete(key)
            .await
            .map_err(|e| ParlorError::Storage(format!("object delete {key}: {e}")))?;
        Ok(())
    }
}
