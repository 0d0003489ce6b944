use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from parlor.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParlorConfig {
    pub service: ServiceConfig,
    pub kms: KmsConfig,
    pub storage: StorageConfig,
    pub invite: InviteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsConfig {
    /// Identifier of the KMS master key DEKs are wrapped under
    pub key_id: String,
    /// Master key file for the local (non-cloud) KMS backend
    pub master_key_file: Option<PathBuf>,
    /// Per-call timeout for KMS wrap/unwrap (seconds)
    pub timeout_secs: u64,
    /// Retry limit for failed wrap calls during meeting creation
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint for encrypted file blobs
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    /// Default invite-token lifetime in seconds (default: 1 hour)
    pub default_ttl_secs: u64,
    /// Guest sessions stay valid this long past scheduled_end (seconds)
    pub grace_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            key_id: "parlor-master".into(),
            master_key_file: None,
            timeout_secs: 5,
            max_retries: 3,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "parlor-files".into(),
            enforce_tls: false,
        }
    }
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
            grace_secs: 900,
        }
    }
}
