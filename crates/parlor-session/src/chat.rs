//! Chat channel: encrypted ephemeral messages
//!
//! A thin, stateless wrapper over the shared payload AEAD, keyed by the
//! session's content key. The sender role is audit metadata, not a security
//! boundary, but it is bound into the AAD, so the stored tag cannot be
//! flipped after the fact without failing decryption.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use parlor_core::types::{ChatMessage, MessageId, Role};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::{
    chat_aad, decrypt_payload, derive_content_key, encrypt_payload, ContentKind, MeetingDek,
};
use parlor_store::ChatRepository;

use crate::boundary::LiveSession;

/// A decrypted message as handed back to callers.
#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub id: MessageId,
    pub sender_role: Role,
    pub sent_at: DateTime<Utc>,
    pub body: Vec<u8>,
}

pub struct ChatChannel<S> {
    messages: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ChatRepository> ChatChannel<S> {
    pub fn new(messages: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { messages, clock }
    }

    /// Encrypt and append one message under the session's role tag.
    pub async fn send(
        &self,
        session: &LiveSession,
        dek: &MeetingDek,
        body: &[u8],
    ) -> ParlorResult<ChatMessage> {
        let key = derive_content_key(dek, ContentKind::Chat)?;
        let aad = chat_aad(session.meeting.id.as_bytes(), session.role.as_byte());
        let sealed = encrypt_payload(&key, &aad, body)?;

        let message = self
            .messages
            .append_message(ChatMessage {
                id: Uuid::new_v4(),
                meeting_id: session.meeting.id,
                sender_role: session.role,
                ciphertext: sealed.ciphertext,
                nonce: sealed.nonce,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::debug!(
            meeting_id = %message.meeting_id,
            role = %message.sender_role,
            "chat message stored"
        );
        Ok(message)
    }

    /// Read and decrypt the whole stream, in creation order.
    pub async fn read(
        &self,
        session: &LiveSession,
        dek: &MeetingDek,
    ) -> ParlorResult<Vec<ChatEntry>> {
        let key = derive_content_key(dek, ContentKind::Chat)?;
        let meeting_id = session.meeting.id;

        let mut entries = Vec::new();
        for message in self.messages.messages(meeting_id).await? {
            let aad = chat_aad(meeting_id.as_bytes(), message.sender_role.as_byte());
            let body = decrypt_payload(&key, &aad, &message.nonce, &message.ciphertext)
                .map_err(|_| {
                    ParlorError::IntegrityViolation(format!(
                        "chat message {} failed authentication",
                        message.id
                    ))
                })?;
            entries.push(ChatEntry {
                id: message.id,
                sender_role: message.sender_role,
                sent_at: message.created_at,
                body,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parlor_core::types::{Meeting, MeetingStatus};
    use parlor_core::SystemClock;
    use parlor_crypto::generate_dek;
    use parlor_store::{MeetingRepository, MemoryStore};

    async fn setup() -> (ChatChannel<MemoryStore>, Arc<MemoryStore>, Meeting) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let meeting = store
            .create_meeting(Meeting {
                id: Uuid::new_v4(),
                professional_id: Uuid::new_v4(),
                title: None,
                client_name: "Jo Client".into(),
                client_email: "jo@example.com".into(),
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
                status: MeetingStatus::InProgress,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await
            .unwrap();
        let channel = ChatChannel::new(Arc::clone(&store), Arc::new(SystemClock));
        (channel, store, meeting)
    }

    fn session(meeting: &Meeting, role: Role) -> LiveSession {
        LiveSession {
            meeting: meeting.clone(),
            role,
        }
    }

    #[tokio::test]
    async fn send_read_roundtrip_both_roles() {
        let (channel, _store, meeting) = setup().await;
        let dek = generate_dek();

        channel
            .send(&session(&meeting, Role::Professional), &dek, b"hello")
            .await
            .unwrap();
        channel
            .send(&session(&meeting, Role::Guest), &dek, b"hi back")
            .await
            .unwrap();

        let entries = channel
            .read(&session(&meeting, Role::Guest), &dek)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender_role, Role::Professional);
        assert_eq!(entries[0].body, b"hello");
        assert_eq!(entries[1].sender_role, Role::Guest);
        assert_eq!(entries[1].body, b"hi back");
    }

    #[tokio::test]
    async fn stored_ciphertext_is_not_plaintext() {
        let (channel, store, meeting) = setup().await;
        let dek = generate_dek();

        channel
            .send(&session(&meeting, Role::Guest), &dek, b"confidential line")
            .await
            .unwrap();

        let raw = store.messages(meeting.id).await.unwrap();
        assert!(!raw[0]
            .ciphertext
            .windows(b"confidential".len())
            .any(|w| w == b"confidential"));
    }

    #[tokio::test]
    async fn flipped_role_tag_fails_decryption() {
        let (channel, store, meeting) = setup().await;
        let dek = generate_dek();

        let sent = channel
            .send(&session(&meeting, Role::Guest), &dek, b"who said this")
            .await
            .unwrap();

        // Re-store the same ciphertext under the other role, simulating a
        // tampered role column.
        store
            .append_message(ChatMessage {
                id: Uuid::new_v4(),
                sender_role: Role::Professional,
                ..sent
            })
            .await
            .unwrap();

        let result = channel.read(&session(&meeting, Role::Guest), &dek).await;
        assert!(matches!(result, Err(ParlorError::IntegrityViolation(_))));
    }

    #[tokio::test]
    async fn wrong_dek_fails() {
        let (channel, _store, meeting) = setup().await;
        let dek = generate_dek();

        channel
            .send(&session(&meeting, Role::Guest), &dek, b"msg")
            .await
            .unwrap();

        let other_dek = generate_dek();
        let result = channel.read(&session(&meeting, Role::Guest), &other_dek).await;
        assert!(matches!(result, Err(ParlorError::IntegrityViolation(_))));
    }
}
