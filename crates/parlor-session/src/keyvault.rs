//! Key vault: per-meeting DEK lifecycle
//!
//! The raw DEK is minted here, immediately wrapped by the KMS, and persisted
//! only in wrapped form; even a full dump of the relational store yields
//! nothing decryptable without KMS access. Unwrapping requires a
//! [`LiveSession`] from the boundary, and the returned handle zeroizes
//! itself on drop on every exit path.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use parlor_core::config::KmsConfig;
use parlor_core::types::{Meeting, MeetingId, MeetingKeyRecord};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::{generate_dek, MeetingDek};
use parlor_kms::KmsClient;
use parlor_store::MeetingKeyRepository;

use crate::boundary::LiveSession;

const BACKOFF_BASE_MS: u64 = 50;

pub struct KeyVault<K, R> {
    kms: Arc<K>,
    keys: Arc<R>,
    clock: Arc<dyn Clock>,
    config: KmsConfig,
}

impl<K: KmsClient, R: MeetingKeyRepository> KeyVault<K, R> {
    pub fn new(kms: Arc<K>, keys: Arc<R>, clock: Arc<dyn Clock>, config: KmsConfig) -> Self {
        Self {
            kms,
            keys,
            clock,
            config,
        }
    }

    /// Mint a fresh DEK for a meeting and persist it KMS-wrapped.
    ///
    /// The wrap call runs under the configured timeout and is retried with
    /// exponential backoff up to `max_retries` times for transient KMS
    /// failures; anything else surfaces as `KeyServiceUnavailable` so the
    /// meeting is never created keyless.
    pub async fn create_meeting_key(&self, meeting_id: MeetingId) -> ParlorResult<MeetingKeyRecord> {
        let dek = generate_dek();
        let wrapped = self.wrap_with_retry(&dek).await?;

        let record = self
            .keys
            .put_key(MeetingKeyRecord {
                meeting_id,
                wrapped_dek: BASE64.encode(&wrapped),
                kms_key_id: self.config.key_id.clone(),
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            meeting_id = %meeting_id,
            kms_key_id = %record.kms_key_id,
            "meeting key created"
        );
        Ok(record)
    }

    async fn wrap_with_retry(&self, dek: &MeetingDek) -> ParlorResult<Vec<u8>> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome =
                tokio::time::timeout(timeout, self.kms.wrap_dek(&self.config.key_id, dek)).await;

            let err = match outcome {
                Ok(Ok(wrapped)) => return Ok(wrapped),
                Ok(Err(e)) if !e.is_transient() => {
                    // A wrong key id or rejected material will not get better
                    // on the next attempt.
                    return Err(ParlorError::KeyServiceUnavailable(e.to_string()));
                }
                Ok(Err(e)) => ParlorError::KeyServiceUnavailable(e.to_string()),
                Err(_) => ParlorError::KeyServiceUnavailable(format!(
                    "kms wrap timed out after {}s",
                    self.config.timeout_secs
                )),
            };

            if attempt > self.config.max_retries {
                return Err(err);
            }

            let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1).min(6));
            tracing::warn!(attempt, error = %err, "kms wrap failed, retrying");
            tokio::time::sleep(backoff).await;
        }
    }

    /// Unwrap the meeting DEK for one validated session.
    ///
    /// The handle lives in volatile memory only; callers let it drop at the
    /// end of the request. Fails `NotFound` when no key record exists (the
    /// meeting was shredded or never keyed).
    pub async fn unwrap_for_session(&self, session: &LiveSession) -> ParlorResult<MeetingDek> {
        let meeting_id = session.meeting.id;
        let record = self
            .keys
            .key(meeting_id)
            .await?
            .ok_or_else(|| ParlorError::NotFound(format!("key record for meeting {meeting_id}")))?;

        let wrapped = BASE64
            .decode(&record.wrapped_dek)
            .map_err(|e| ParlorError::Storage(format!("wrapped dek is not valid base64: {e}")))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let dek = tokio::time::timeout(timeout, self.kms.unwrap_dek(&record.kms_key_id, &wrapped))
            .await
            .map_err(|_| {
                ParlorError::KeyServiceUnavailable(format!(
                    "kms unwrap timed out after {}s",
                    self.config.timeout_secs
                ))
            })?
            .map_err(|e| ParlorError::KeyServiceUnavailable(e.to_string()))?;

        tracing::debug!(meeting_id = %meeting_id, role = %session.role, "dek unwrapped for session");
        Ok(dek)
    }

    /// Destroy the wrapped key record: the crypto-shredding step. Terminal:
    /// every ciphertext of the meeting becomes permanently unreadable. The
    /// store couples this with the meeting's `Shredded` transition.
    pub async fn destroy_meeting_key(&self, meeting_id: MeetingId) -> ParlorResult<Meeting> {
        let meeting = self.keys.shred(meeting_id, self.clock.now()).await?;
        tracing::info!(meeting_id = %meeting_id, "meeting key destroyed (crypto-shred)");
        Ok(meeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use parlor_core::types::{MeetingStatus, Role};
    use parlor_core::SystemClock;
    use parlor_kms::{KmsError, KmsResult, LocalKms};
    use parlor_store::{MemoryStore, MeetingRepository};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Fails the first `failures` wrap calls with a transient error, then
    /// behaves like the inner KMS.
    struct FlakyKms {
        inner: LocalKms,
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyKms {
        fn new(failures: u32) -> Self {
            Self {
                inner: LocalKms::new("test-key", [42u8; 32]),
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl KmsClient for FlakyKms {
        async fn wrap_dek(&self, key_id: &str, dek: &MeetingDek) -> KmsResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
                .is_ok()
            {
                return Err(KmsError::Unavailable("connection refused".into()));
            }
            self.inner.wrap_dek(key_id, dek).await
        }

        async fn unwrap_dek(&self, key_id: &str, wrapped: &[u8]) -> KmsResult<MeetingDek> {
            self.inner.unwrap_dek(key_id, wrapped).await
        }
    }

    /// Always rejects with a non-transient error; counts calls.
    struct RejectingKms {
        calls: AtomicU32,
    }

    impl KmsClient for RejectingKms {
        async fn wrap_dek(&self, key_id: &str, _dek: &MeetingDek) -> KmsResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KmsError::UnknownKey(key_id.to_string()))
        }

        async fn unwrap_dek(&self, _key_id: &str, _wrapped: &[u8]) -> KmsResult<MeetingDek> {
            Err(KmsError::UnknownKey("nope".into()))
        }
    }

    fn vault_config() -> KmsConfig {
        KmsConfig {
            key_id: "test-key".into(),
            master_key_file: None,
            timeout_secs: 2,
            max_retries: 3,
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, parlor_core::types::Meeting) {
        let store = Arc::new(MemoryStore::new());
        let now = chrono::Utc::now();
        let meeting = store
            .create_meeting(parlor_core::types::Meeting {
                id: Uuid::new_v4(),
                professional_id: Uuid::new_v4(),
                title: None,
                client_name: "Jo Client".into(),
                client_email: "jo@example.com".into(),
                scheduled_start: now,
                scheduled_end: now + ChronoDuration::hours(1),
                status: MeetingStatus::Scheduled,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await
            .unwrap();
        (store, meeting)
    }

    fn live(meeting: parlor_core::types::Meeting) -> LiveSession {
        LiveSession {
            meeting,
            role: Role::Professional,
        }
    }

    #[tokio::test]
    async fn test_create_then_unwrap_roundtrip() {
        let (store, meeting) = seeded_store().await;
        let kms = Arc::new(LocalKms::new("test-key", [42u8; 32]));
        let vault = KeyVault::new(kms, Arc::clone(&store), Arc::new(SystemClock), vault_config());

        let record = vault.create_meeting_key(meeting.id).await.unwrap();
        assert_eq!(record.kms_key_id, "test-key");

        let dek_a = vault.unwrap_for_session(&live(meeting.clone())).await.unwrap();
        let dek_b = vault.unwrap_for_session(&live(meeting)).await.unwrap();
        assert_eq!(dek_a.as_bytes(), dek_b.as_bytes(), "unwrap must be stable");
    }

    #[tokio::test]
    async fn test_wrap_retries_transient_failures() {
        let (store, meeting) = seeded_store().await;
        let kms = Arc::new(FlakyKms::new(2));
        let vault = KeyVault::new(
            Arc::clone(&kms),
            Arc::clone(&store),
            Arc::new(SystemClock),
            vault_config(),
        );

        vault.create_meeting_key(meeting.id).await.unwrap();
        assert_eq!(kms.calls.load(Ordering::SeqCst), 3, "two failures + one success");
    }

    #[tokio::test]
    async fn test_wrap_gives_up_after_retry_budget() {
        let (store, meeting) = seeded_store().await;
        // More failures than 1 + max_retries attempts.
        let kms = Arc::new(FlakyKms::new(10));
        let vault = KeyVault::new(
            Arc::clone(&kms),
            Arc::clone(&store),
            Arc::new(SystemClock),
            vault_config(),
        );

        let result = vault.create_meeting_key(meeting.id).await;
        assert!(matches!(result, Err(ParlorError::KeyServiceUnavailable(_))));
        assert_eq!(kms.calls.load(Ordering::SeqCst), 4, "1 initial + 3 retries");
        assert!(store.key(meeting.id).await.unwrap().is_none(), "no key persisted");
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let (store, meeting) = seeded_store().await;
        let kms = Arc::new(RejectingKms {
            calls: AtomicU32::new(0),
        });
        let vault = KeyVault::new(
            Arc::clone(&kms),
            Arc::clone(&store),
            Arc::new(SystemClock),
            vault_config(),
        );

        let result = vault.create_meeting_key(meeting.id).await;
        assert!(matches!(result, Err(ParlorError::KeyServiceUnavailable(_))));
        assert_eq!(kms.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unwrap_without_key_record_is_not_found() {
        let (store, meeting) = seeded_store().await;
        let kms = Arc::new(LocalKms::new("test-key", [42u8; 32]));
        let vault = KeyVault::new(kms, Arc::clone(&store), Arc::new(SystemClock), vault_config());

        let result = vault.unwrap_for_session(&live(meeting)).await;
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_destroy_makes_key_unresolvable() {
        let (store, meeting) = seeded_store().await;
        let kms = Arc::new(LocalKms::new("test-key", [42u8; 32]));
        let vault = KeyVault::new(kms, Arc::clone(&store), Arc::new(SystemClock), vault_config());

        vault.create_meeting_key(meeting.id).await.unwrap();
        let shredded = vault.destroy_meeting_key(meeting.id).await.unwrap();
        assert_eq!(shredded.status, MeetingStatus::Shredded);

        let result = vault.unwrap_for_session(&live(meeting)).await;
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }
}
