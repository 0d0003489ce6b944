//! Session proofs
//!
//! Proofs are explicit values passed through call parameters, never ambient
//! process-wide state, so the boundary can be exercised without a network
//! stack. Holding a proof is necessary but not sufficient: every operation
//! re-validates it against the store (see `SessionBoundary`).

use chrono::{DateTime, Utc};

use parlor_core::types::{MeetingId, ProfessionalId, Role};

/// Opaque professional identity supplied by the external account-session
/// collaborator. How it was established (cookies, OIDC, ...) is out of
/// scope here; the boundary only checks meeting ownership.
#[derive(Debug, Clone)]
pub struct ProfessionalProof {
    pub professional_id: ProfessionalId,
}

/// A meeting-scoped authentication result.
///
/// Professional proofs are bounded only by the meeting lifecycle; guest
/// proofs additionally carry an expiry (`min(invite expiry, scheduled end +
/// grace)`) and the digest of the token they were minted from, which ties
/// them to the currently installed invite.
#[derive(Debug, Clone)]
pub struct SessionProof {
    meeting_id: MeetingId,
    role: Role,
    professional_id: Option<ProfessionalId>,
    expires_at: Option<DateTime<Utc>>,
    token_digest: Option<String>,
}

impl SessionProof {
    pub(crate) fn professional(meeting_id: MeetingId, professional_id: ProfessionalId) -> Self {
        Self {
            meeting_id,
            role: Role::Professional,
            professional_id: Some(professional_id),
            expires_at: None,
            token_digest: None,
        }
    }

    pub(crate) fn guest(
        meeting_id: MeetingId,
        expires_at: DateTime<Utc>,
        token_digest: String,
    ) -> Self {
        Self {
            meeting_id,
            role: Role::Guest,
            professional_id: None,
            expires_at: Some(expires_at),
            token_digest: Some(token_digest),
        }
    }

    pub fn meeting_id(&self) -> MeetingId {
        self.meeting_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub(crate) fn professional_id(&self) -> Option<ProfessionalId> {
        self.professional_id
    }

    pub(crate) fn token_digest(&self) -> Option<&str> {
        self.token_digest.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn guest_proof_carries_expiry_and_digest() {
        let proof = SessionProof::guest(Uuid::new_v4(), Utc::now(), "abc123".into());
        assert_eq!(proof.role(), Role::Guest);
        assert!(proof.expires_at().is_some());
        assert_eq!(proof.token_digest(), Some("abc123"));
    }

    #[test]
    fn professional_proof_has_no_expiry() {
        let professional = Uuid::new_v4();
        let proof = SessionProof::professional(Uuid::new_v4(), professional);
        assert_eq!(proof.role(), Role::Professional);
        assert!(proof.expires_at().is_none());
        assert_eq!(proof.professional_id(), Some(professional));
    }
}
