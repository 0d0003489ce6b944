//! parlor-kms: the external key-management boundary
//!
//! The relational store only ever sees DEKs in wrapped form; wrapping and
//! unwrapping happen behind the [`KmsClient`] trait. Production deployments
//! implement it against a cloud KMS; [`LocalKms`] wraps under a process-local
//! master key for development and tests. Either way, compromise of the store
//! alone yields nothing decryptable.

pub mod local;

pub use local::LocalKms;

use parlor_crypto::MeetingDek;
use thiserror::Error;

pub type KmsResult<T> = Result<T, KmsError>;

#[derive(Debug, Error)]
pub enum KmsError {
    /// The KMS could not be reached or answered too slowly. Retryable.
    #[error("kms unavailable: {0}")]
    Unavailable(String),

    /// The caller named a master key this KMS does not hold.
    #[error("unknown kms key id: {0}")]
    UnknownKey(String),

    /// Wrapped material failed to unwrap: wrong master key or corruption.
    #[error("invalid wrapped key material: {0}")]
    InvalidMaterial(String),
}

impl KmsError {
    /// Only availability failures are worth retrying; a wrong key id or
    /// corrupt material will not get better on the second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Wrap/unwrap interface of the external KMS collaborator.
///
/// Calls are network-shaped: async, fallible, and expected to run under a
/// bounded timeout imposed by the caller.
#[allow(async_fn_in_trait)]
pub trait KmsClient: Send + Sync {
    /// Wrap a plaintext DEK under the master key named by `key_id`.
    async fn wrap_dek(&self, key_id: &str, dek: &MeetingDek) -> KmsResult<Vec<u8>>;

    /// Unwrap previously wrapped material back into a transient DEK.
    async fn unwrap_dek(&self, key_id: &str, wrapped: &[u8]) -> KmsResult<MeetingDek>;
}
