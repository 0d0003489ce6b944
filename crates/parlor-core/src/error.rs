use thiserror::Error;

use crate::types::NoteSnapshot;

pub type ParlorResult<T> = Result<T, ParlorError>;

/// Error taxonomy of the encrypted-session core.
///
/// `Conflict` is the only variant a caller is expected to recover from (by
/// rebasing its edit onto the carried tip and retrying). `IntegrityViolation`
/// is terminal for the affected chain and must never be masked or repaired.
#[derive(Debug, Error)]
pub enum ParlorError {
    /// Invalid, expired or revoked credentials, or a proof presented for the
    /// wrong meeting/role. Deliberately carries no detail: callers must not
    /// be able to distinguish "wrong token" from "expired" from "ended".
    #[error("link invalid or expired")]
    AccessDenied,

    /// Ledger sequence/hash mismatch. Carries the current tip (`None` when
    /// the chain is empty) so the writer can rebase and retry.
    #[error("snapshot conflict: ledger tip is at seq {tip_seq}")]
    Conflict {
        tip_seq: u64,
        current_tip: Option<Box<NoteSnapshot>>,
    },

    /// The external KMS could not wrap or unwrap a key within the bounded
    /// retry budget. A meeting must never be created without its key.
    #[error("key service unavailable: {0}")]
    KeyServiceUnavailable(String),

    /// Chain verification failed on read: corruption or tampering.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Advisory rejection of an exact nonce duplicate for one meeting.
    /// Distinct from `Conflict` so rebase logic never retries it.
    #[error("nonce already seen for this meeting")]
    NonceReuse,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParlorError {
    /// True for the rebase-and-retry case. Conflicts are part of normal
    /// concurrent editing and are not logged at error level.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_message_is_generic() {
        // One message for every failed precondition, so the error string
        // cannot be used as an oracle for which check failed.
        assert_eq!(ParlorError::AccessDenied.to_string(), "link invalid or expired");
    }

    #[test]
    fn conflict_is_recoverable() {
        let err = ParlorError::Conflict {
            tip_seq: 4,
            current_tip: None,
        };
        assert!(err.is_conflict());
        assert!(!ParlorError::AccessDenied.is_conflict());
    }
}
