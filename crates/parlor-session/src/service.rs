//! Meeting service: the façade the rest of the application consumes
//!
//! Wires the key vault, token controller, boundary, ledger, chat and file
//! vault over one store. Every operation takes an explicit proof and
//! re-validates it through the boundary before anything touches key
//! material; lifecycle changes (start/end/delete, invites) additionally
//! require the professional role.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use parlor_core::config::ParlorConfig;
use parlor_core::types::{
    ChatMessage, FileId, FileMetadata, FileRecord, Meeting, MeetingId, MeetingStatus,
    NoteSnapshot, ProfessionalId, Role,
};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::MeetingDek;
use parlor_kms::KmsClient;
use parlor_store::{
    ChatRepository, FileRepository, MeetingKeyRepository, MeetingRepository, ObjectStore,
    SnapshotRepository,
};

use crate::access::AccessTokenController;
use crate::boundary::{LiveSession, SessionBoundary};
use crate::chat::{ChatChannel, ChatEntry};
use crate::files::{FileEntry, FileVault};
use crate::keyvault::KeyVault;
use crate::ledger::{NoteDraft, NotesLedger};
use crate::proof::{ProfessionalProof, SessionProof};

/// Parameters for a new meeting.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub professional_id: ProfessionalId,
    pub title: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub scheduled_start: chrono::DateTime<chrono::Utc>,
    pub scheduled_end: chrono::DateTime<chrono::Utc>,
}

pub struct MeetingService<K, S> {
    store: Arc<S>,
    boundary: SessionBoundary<S>,
    keyvault: KeyVault<K, S>,
    access: AccessTokenController<S>,
    ledger: NotesLedger<S>,
    chat: ChatChannel<S>,
    files: FileVault<S>,
    clock: Arc<dyn Clock>,
}

impl<K, S> MeetingService<K, S>
where
    K: KmsClient,
    S: MeetingRepository
        + MeetingKeyRepository
        + SnapshotRepository
        + ChatRepository
        + FileRepository,
{
    pub fn new(
        kms: Arc<K>,
        store: Arc<S>,
        objects: ObjectStore,
        clock: Arc<dyn Clock>,
        config: ParlorConfig,
    ) -> Self {
        Self {
            boundary: SessionBoundary::new(Arc::clone(&store), Arc::clone(&clock)),
            keyvault: KeyVault::new(kms, Arc::clone(&store), Arc::clone(&clock), config.kms),
            access: AccessTokenController::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.invite,
            ),
            ledger: NotesLedger::new(Arc::clone(&store), Arc::clone(&clock)),
            chat: ChatChannel::new(Arc::clone(&store), Arc::clone(&clock)),
            files: FileVault::new(Arc::clone(&store), objects, Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// Create a meeting. Key issuance happens first and is mandatory: if the
    /// KMS is down, no meeting comes into existence.
    pub async fn create_meeting(&self, new: NewMeeting) -> ParlorResult<Meeting> {
        let meeting_id = Uuid::new_v4();

        // Key before row: the meeting is never observable without its key.
        self.keyvault.create_meeting_key(meeting_id).await?;

        let now = self.clock.now();
        let meeting = self
            .store
            .create_meeting(Meeting {
                id: meeting_id,
                professional_id: new.professional_id,
                title: new.title,
                client_name: new.client_name,
                client_email: new.client_email,
                scheduled_start: new.scheduled_start,
                scheduled_end: new.scheduled_end,
                status: MeetingStatus::Scheduled,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await?;

        tracing::info!(meeting_id = %meeting.id, "meeting created");
        Ok(meeting)
    }

    /// Exchange an externally-established professional identity for a
    /// meeting-scoped proof.
    pub async fn authenticate_professional(
        &self,
        meeting_id: MeetingId,
        proof: &ProfessionalProof,
    ) -> ParlorResult<SessionProof> {
        self.boundary.authenticate_professional(meeting_id, proof).await
    }

    /// Issue (or re-issue, invalidating the previous token) the guest invite.
    /// Returns the plaintext token exactly once.
    pub async fn issue_invite(
        &self,
        proof: &SessionProof,
        ttl: Option<Duration>,
    ) -> ParlorResult<String> {
        let live = self.require_professional(proof).await?;
        let ttl = ttl.unwrap_or_else(|| self.access.default_ttl());
        self.access.issue_invite(live.meeting.id, ttl).await
    }

    /// Redeem an invite token into a guest session proof. Succeeds at most
    /// once per issued token.
    pub async fn redeem_invite(
        &self,
        meeting_id: MeetingId,
        token: &str,
    ) -> ParlorResult<SessionProof> {
        self.access.validate(meeting_id, token).await
    }

    /// Invalidate the current invite immediately.
    pub async fn revoke_invite(&self, proof: &SessionProof) -> ParlorResult<()> {
        let live = self.require_professional(proof).await?;
        self.access.revoke(live.meeting.id).await
    }

    /// Unwrap the meeting DEK for this request. The handle is transient;
    /// drop it when the request ends.
    pub async fn unwrap_for_session(&self, proof: &SessionProof) -> ParlorResult<MeetingDek> {
        let live = self.boundary.require_live(proof).await?;
        self.keyvault.unwrap_for_session(&live).await
    }

    /// Append one encrypted notes snapshot. `Conflict` carries the current
    /// tip for a client-side rebase.
    pub async fn append_note(
        &self,
        proof: &SessionProof,
        draft: NoteDraft,
    ) -> ParlorResult<NoteSnapshot> {
        let live = self.boundary.require_live(proof).await?;
        self.ledger.append_snapshot(&live, draft).await
    }

    /// The full, link-verified snapshot chain.
    pub async fn read_notes(&self, proof: &SessionProof) -> ParlorResult<Vec<NoteSnapshot>> {
        let live = self.boundary.require_live(proof).await?;
        self.ledger.read_chain(&live).await
    }

    /// The current tip alone.
    pub async fn latest_note(&self, proof: &SessionProof) -> ParlorResult<Option<NoteSnapshot>> {
        let live = self.boundary.require_live(proof).await?;
        self.ledger.latest(&live).await
    }

    /// Encrypt and append a chat message under the caller's role.
    pub async fn send_chat(&self, proof: &SessionProof, body: &[u8]) -> ParlorResult<ChatMessage> {
        let live = self.boundary.require_live(proof).await?;
        let dek = self.keyvault.unwrap_for_session(&live).await?;
        self.chat.send(&live, &dek, body).await
    }

    /// Read and decrypt the chat stream.
    pub async fn read_chat(&self, proof: &SessionProof) -> ParlorResult<Vec<ChatEntry>> {
        let live = self.boundary.require_live(proof).await?;
        let dek = self.keyvault.unwrap_for_session(&live).await?;
        self.chat.read(&live, &dek).await
    }

    /// Encrypt and store a file (bytes out-of-band, metadata in-band).
    pub async fn upload_file(
        &self,
        proof: &SessionProof,
        metadata: FileMetadata,
        bytes: &[u8],
    ) -> ParlorResult<FileRecord> {
        let live = self.boundary.require_live(proof).await?;
        let dek = self.keyvault.unwrap_for_session(&live).await?;
        self.files.upload(&live, &dek, metadata, bytes).await
    }

    /// Fetch and decrypt one file.
    pub async fn download_file(
        &self,
        proof: &SessionProof,
        file_id: FileId,
    ) -> ParlorResult<(FileMetadata, Vec<u8>)> {
        let live = self.boundary.require_live(proof).await?;
        let dek = self.keyvault.unwrap_for_session(&live).await?;
        self.files.download(&live, &dek, file_id).await
    }

    /// List the meeting's files with decrypted metadata.
    pub async fn list_files(&self, proof: &SessionProof) -> ParlorResult<Vec<FileEntry>> {
        let live = self.boundary.require_live(proof).await?;
        let dek = self.keyvault.unwrap_for_session(&live).await?;
        self.files.list(&live, &dek).await
    }

    /// `Scheduled → InProgress`. Idempotent while the meeting is running.
    pub async fn start_meeting(&self, proof: &SessionProof) -> ParlorResult<Meeting> {
        let live = self.require_professional(proof).await?;
        match live.meeting.status {
            MeetingStatus::Scheduled => {
                self.store
                    .set_status(live.meeting.id, MeetingStatus::InProgress)
                    .await
            }
            MeetingStatus::InProgress => Ok(live.meeting),
            _ => Err(ParlorError::AccessDenied),
        }
    }

    /// End the meeting. Guests lose access immediately; the key record is
    /// retained so the professional can keep reading until deletion.
    pub async fn end_meeting(&self, proof: &SessionProof) -> ParlorResult<Meeting> {
        let live = self.require_professional(proof).await?;
        match live.meeting.status {
            MeetingStatus::Scheduled | MeetingStatus::InProgress => {
                let meeting = self
                    .store
                    .set_status(live.meeting.id, MeetingStatus::Ended)
                    .await?;
                tracing::info!(meeting_id = %meeting.id, "meeting ended");
                Ok(meeting)
            }
            MeetingStatus::Ended => Ok(live.meeting),
            MeetingStatus::Shredded => Err(ParlorError::AccessDenied),
        }
    }

    /// Delete the meeting: the crypto-shredding transition. Destroys the
    /// wrapped DEK, rendering every snapshot, message and file of this
    /// meeting permanently unreadable.
    pub async fn delete_meeting(&self, proof: &SessionProof) -> ParlorResult<Meeting> {
        let live = self.require_professional(proof).await?;
        self.keyvault.destroy_meeting_key(live.meeting.id).await
    }

    async fn require_professional(&self, proof: &SessionProof) -> ParlorResult<LiveSession> {
        let live = self.boundary.require_live(proof).await?;
        if live.role != Role::Professional {
            return Err(ParlorError::AccessDenied);
        }
        Ok(live)
    }
}
