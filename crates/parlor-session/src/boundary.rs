//! Session boundary
//!
//! The single gate deciding who may ask the key vault for key material.
//! States: `Unauthenticated → Authenticated(professional | guest) →
//! Expired/Revoked`. Professional proofs come from the account-session
//! collaborator and are checked against meeting ownership; guest proofs come
//! only from token validation.
//!
//! Freshness is re-validated on every call rather than cached: a leaked
//! in-memory proof stays dangerous only for its remaining TTL, and a revoked
//! or re-issued invite kills in-flight guest sessions at their next call.

use std::sync::Arc;

use parlor_core::types::{Meeting, MeetingId, MeetingStatus, Role};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_store::MeetingRepository;

use crate::proof::{ProfessionalProof, SessionProof};

/// A freshness-checked session, valid for the duration of one request.
///
/// Only the boundary can construct this; components that need key material
/// take it as a parameter, which makes "validated before use" a property of
/// the type system instead of a calling convention.
pub struct LiveSession {
    pub meeting: Meeting,
    pub role: Role,
}

pub struct SessionBoundary<M> {
    meetings: Arc<M>,
    clock: Arc<dyn Clock>,
}

impl<M: MeetingRepository> SessionBoundary<M> {
    pub fn new(meetings: Arc<M>, clock: Arc<dyn Clock>) -> Self {
        Self { meetings, clock }
    }

    /// Exchange an externally-established professional identity for a
    /// meeting-scoped proof. Fails `AccessDenied` unless the identity owns
    /// the meeting.
    pub async fn authenticate_professional(
        &self,
        meeting_id: MeetingId,
        proof: &ProfessionalProof,
    ) -> ParlorResult<SessionProof> {
        let meeting = self
            .meetings
            .meeting(meeting_id)
            .await?
            .ok_or_else(|| ParlorError::NotFound(format!("meeting {meeting_id}")))?;

        if meeting.professional_id != proof.professional_id {
            tracing::warn!(
                meeting_id = %meeting_id,
                "professional proof rejected: not the meeting owner"
            );
            return Err(ParlorError::AccessDenied);
        }
        if meeting.status == MeetingStatus::Shredded {
            return Err(ParlorError::AccessDenied);
        }

        Ok(SessionProof::professional(meeting_id, proof.professional_id))
    }

    /// Re-validate a proof and return the session for this one request.
    ///
    /// Checks, in order: the meeting still exists and is not shredded; for
    /// professionals, ownership still holds; for guests, the meeting is
    /// still active, the proof's expiry has not passed, and the invite
    /// digest the proof was minted from is still the installed one.
    pub async fn require_live(&self, proof: &SessionProof) -> ParlorResult<LiveSession> {
        let meeting = self
            .meetings
            .meeting(proof.meeting_id())
            .await?
            .ok_or(ParlorError::AccessDenied)?;

        if meeting.status == MeetingStatus::Shredded {
            return Err(ParlorError::AccessDenied);
        }

        match proof.role() {
            Role::Professional => {
                if proof.professional_id() != Some(meeting.professional_id) {
                    return Err(ParlorError::AccessDenied);
                }
            }
            Role::Guest => {
                // Token validity is the intersection of its own TTL and the
                // meeting lifecycle; an ended meeting denies the guest even
                // inside the TTL.
                if !meeting.is_active() {
                    return Err(ParlorError::AccessDenied);
                }
                let now = self.clock.now();
                match proof.expires_at() {
                    Some(expires_at) if now <= expires_at => {}
                    _ => return Err(ParlorError::AccessDenied),
                }
                let digest_current = match (proof.token_digest(), meeting.invite_token_hash.as_deref())
                {
                    // Both digests are server-held values; the secret
                    // comparison happened at validation time.
                    (Some(bound), Some(stored)) => bound == stored,
                    _ => false,
                };
                if !digest_current {
                    return Err(ParlorError::AccessDenied);
                }
            }
        }

        Ok(LiveSession {
            role: proof.role(),
            meeting,
        })
    }
}
