//! Invite token issuance and validation
//!
//! A token is returned in plaintext exactly once, at issuance; afterwards
//! only its digest exists. Validation is the single source of guest session
//! proofs, and succeeds at most once per issued token: the winning validate
//! marks the redemption atomically in the store, so two racing guests with
//! the same link admit exactly one session.
//!
//! Every failure is the same `AccessDenied` ("link invalid or expired"),
//! so callers cannot probe which precondition failed.

use std::sync::Arc;

use chrono::Duration;

use parlor_core::config::InviteConfig;
use parlor_core::types::MeetingId;
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::{digest_matches, generate_invite_token, token_digest};
use parlor_store::MeetingRepository;

use crate::proof::SessionProof;

pub struct AccessTokenController<M> {
    meetings: Arc<M>,
    clock: Arc<dyn Clock>,
    config: InviteConfig,
}

impl<M: MeetingRepository> AccessTokenController<M> {
    pub fn new(meetings: Arc<M>, clock: Arc<dyn Clock>, config: InviteConfig) -> Self {
        Self {
            meetings,
            clock,
            config,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::seconds(self.config.default_ttl_secs as i64)
    }

    /// Issue a fresh invite token for a meeting.
    ///
    /// Persists only the digest and expiry; the plaintext return value is
    /// the only copy that will ever exist. Re-issuing replaces the stored
    /// digest, which invalidates the previous token and any guest session
    /// minted from it.
    pub async fn issue_invite(&self, meeting_id: MeetingId, ttl: Duration) -> ParlorResult<String> {
        let meeting = self
            .meetings
            .meeting(meeting_id)
            .await?
            .ok_or_else(|| ParlorError::NotFound(format!("meeting {meeting_id}")))?;
        if !meeting.is_active() {
            return Err(ParlorError::AccessDenied);
        }

        let token = generate_invite_token();
        let expires_at = self.clock.now() + ttl;
        self.meetings
            .set_invite(meeting_id, &token_digest(&token), expires_at)
            .await?;

        tracing::info!(
            meeting_id = %meeting_id,
            expires_at = %expires_at,
            "invite issued"
        );
        Ok(token)
    }

    /// Validate a candidate token and mint the guest session proof.
    ///
    /// Token validity is the intersection of digest match (constant-time),
    /// its own TTL, the meeting lifecycle, and the single-redemption rule.
    /// The proof expires at `min(invite expiry, scheduled end + grace)`.
    pub async fn validate(
        &self,
        meeting_id: MeetingId,
        candidate: &str,
    ) -> ParlorResult<SessionProof> {
        let meeting = self
            .meetings
            .meeting(meeting_id)
            .await?
            .ok_or(ParlorError::AccessDenied)?;

        let (Some(stored_digest), Some(invite_expires_at)) =
            (meeting.invite_token_hash.clone(), meeting.invite_expires_at)
        else {
            return Err(ParlorError::AccessDenied);
        };

        if !digest_matches(&stored_digest, candidate) {
            return Err(ParlorError::AccessDenied);
        }

        let now = self.clock.now();
        if now > invite_expires_at || !meeting.is_active() || meeting.invite_redeemed_at.is_some() {
            return Err(ParlorError::AccessDenied);
        }

        // Atomic compare-and-redeem: loses (and denies) if the digest was
        // replaced, revoked, or redeemed since the read above.
        let redeemed = self
            .meetings
            .redeem_invite(meeting_id, &stored_digest, now)
            .await?;
        let Some(meeting) = redeemed else {
            return Err(ParlorError::AccessDenied);
        };

        let grace = Duration::seconds(self.config.grace_secs as i64);
        let session_expires_at = invite_expires_at.min(meeting.scheduled_end + grace);

        tracing::info!(meeting_id = %meeting_id, expires_at = %session_expires_at, "invite redeemed");
        Ok(SessionProof::guest(
            meeting_id,
            session_expires_at,
            stored_digest,
        ))
    }

    /// Invalidate the current token immediately by clearing its digest.
    pub async fn revoke(&self, meeting_id: MeetingId) -> ParlorResult<()> {
        self.meetings.clear_invite(meeting_id).await?;
        tracing::info!(meeting_id = %meeting_id, "invite revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::types::{Meeting, MeetingStatus, Role};
    use parlor_core::ManualClock;
    use parlor_store::MemoryStore;
    use uuid::Uuid;

    struct Fixture {
        controller: AccessTokenController<MemoryStore>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        meeting_id: MeetingId,
    }

    /// Meeting scheduled from t=0 to t=1800 with the default 900s grace.
    async fn setup() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let now = clock.now();
        let meeting = store
            .create_meeting(Meeting {
                id: Uuid::new_v4(),
                professional_id: Uuid::new_v4(),
                title: None,
                client_name: "Jo Client".into(),
                client_email: "jo@example.com".into(),
                scheduled_start: now,
                scheduled_end: now + Duration::seconds(1800),
                status: MeetingStatus::InProgress,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await
            .unwrap();

        let controller = AccessTokenController::new(
            Arc::clone(&store),
            clock.clone() as Arc<dyn Clock>,
            InviteConfig::default(),
        );
        Fixture {
            controller,
            store,
            clock,
            meeting_id: meeting.id,
        }
    }

    #[tokio::test]
    async fn issue_and_validate() {
        let fx = setup().await;
        let token = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        let proof = fx.controller.validate(fx.meeting_id, &token).await.unwrap();
        assert_eq!(proof.role(), Role::Guest);
        // min(invite expiry 3600, scheduled_end 1800 + grace 900) = 2700
        assert_eq!(proof.expires_at().unwrap().timestamp(), 2700);
    }

    #[tokio::test]
    async fn validate_succeeds_exactly_once() {
        let fx = setup().await;
        let token = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        fx.controller.validate(fx.meeting_id, &token).await.unwrap();
        let second = fx.controller.validate(fx.meeting_id, &token).await;
        assert!(matches!(second, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn validate_before_issuance_fails() {
        let fx = setup().await;
        let result = fx
            .controller
            .validate(fx.meeting_id, &generate_invite_token())
            .await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn wrong_token_fails() {
        let fx = setup().await;
        fx.controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        let result = fx
            .controller
            .validate(fx.meeting_id, &generate_invite_token())
            .await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn expired_token_fails() {
        let fx = setup().await;
        let token = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(600))
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(601));
        let result = fx.controller.validate(fx.meeting_id, &token).await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn ended_meeting_fails_inside_ttl() {
        let fx = setup().await;
        let token = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        fx.store
            .set_status(fx.meeting_id, MeetingStatus::Ended)
            .await
            .unwrap();

        fx.clock.advance(Duration::seconds(10));
        let result = fx.controller.validate(fx.meeting_id, &token).await;
        assert!(
            matches!(result, Err(ParlorError::AccessDenied)),
            "meeting lifecycle must cap token validity"
        );
    }

    #[tokio::test]
    async fn revoked_token_fails() {
        let fx = setup().await;
        let token = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        fx.controller.revoke(fx.meeting_id).await.unwrap();
        let result = fx.controller.validate(fx.meeting_id, &token).await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_token() {
        let fx = setup().await;
        let first = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();
        let second = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await
            .unwrap();

        let result = fx.controller.validate(fx.meeting_id, &first).await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));

        fx.controller.validate(fx.meeting_id, &second).await.unwrap();
    }

    #[tokio::test]
    async fn issue_for_ended_meeting_fails() {
        let fx = setup().await;
        fx.store
            .set_status(fx.meeting_id, MeetingStatus::Ended)
            .await
            .unwrap();

        let result = fx
            .controller
            .issue_invite(fx.meeting_id, Duration::seconds(3600))
            .await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn unknown_meeting_validate_is_denied_not_found_free() {
        let fx = setup().await;
        let result = fx.controller.validate(Uuid::new_v4(), "whatever").await;
        // Deliberately AccessDenied, not NotFound: validation must not leak
        // meeting existence.
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }
}
