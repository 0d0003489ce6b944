//! Repository trait definitions
//!
//! One trait per aggregate; method names are unique across traits because a
//! single store type implements all of them. All methods are async and
//! fallible; storage failures surface as `ParlorError::Storage`,
//! integrity-relevant rejections as their dedicated variants (`Conflict`,
//! `NonceReuse`).

use chrono::{DateTime, Utc};

use parlor_core::types::{
    ChatMessage, FileId, FileRecord, Meeting, MeetingId, MeetingKeyRecord, MeetingStatus,
    NoteSnapshot,
};
use parlor_core::ParlorResult;

/// Meetings, including their invite state.
#[allow(async_fn_in_trait)]
pub trait MeetingRepository: Send + Sync {
    async fn create_meeting(&self, meeting: Meeting) -> ParlorResult<Meeting>;

    async fn meeting(&self, id: MeetingId) -> ParlorResult<Option<Meeting>>;

    async fn set_status(&self, id: MeetingId, status: MeetingStatus) -> ParlorResult<Meeting>;

    /// Install a new invite digest and expiry, clearing any redemption
    /// marker. Replacing the digest invalidates the previous token.
    async fn set_invite(
        &self,
        id: MeetingId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> ParlorResult<Meeting>;

    /// Clear the stored invite digest (revocation).
    async fn clear_invite(&self, id: MeetingId) -> ParlorResult<Meeting>;

    /// Atomic compare-and-redeem: marks the invite redeemed iff `token_hash`
    /// is still the stored digest and no redemption has happened yet.
    /// Returns `None` when the compare fails (digest replaced, revoked, or
    /// already redeemed); the caller treats that as a denied validation.
    ///
    /// Both operands are server-held digests here; the secret-vs-candidate
    /// comparison has already happened in constant time at the caller.
    async fn redeem_invite(
        &self,
        id: MeetingId,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> ParlorResult<Option<Meeting>>;
}

/// Wrapped per-meeting DEKs (1:1 with meetings).
#[allow(async_fn_in_trait)]
pub trait MeetingKeyRepository: Send + Sync {
    async fn put_key(&self, record: MeetingKeyRecord) -> ParlorResult<MeetingKeyRecord>;

    async fn key(&self, meeting_id: MeetingId) -> ParlorResult<Option<MeetingKeyRecord>>;

    /// Destroy the wrapped key record together with the meeting's transition
    /// to `Shredded` in one atomic step, so no orphaned ciphertext ever
    /// outlives its key reference or vice versa. Returns the updated meeting.
    async fn shred(&self, meeting_id: MeetingId, at: DateTime<Utc>) -> ParlorResult<Meeting>;
}

/// The per-meeting snapshot chain.
#[allow(async_fn_in_trait)]
pub trait SnapshotRepository: Send + Sync {
    /// Compare-and-append: accepts the snapshot iff its `seq` is exactly
    /// `tip.seq + 1` (1 on an empty chain) and its `prev_snapshot_hash`
    /// equals the digest of the tip's ciphertext (the genesis sentinel on an
    /// empty chain). Exactly one writer wins a race for a given `seq`; every
    /// loser gets `ParlorError::Conflict` carrying the current tip.
    /// An exact nonce duplicate already seen for the meeting is rejected
    /// with `ParlorError::NonceReuse`.
    async fn append_snapshot(&self, snapshot: NoteSnapshot) -> ParlorResult<NoteSnapshot>;

    /// Full chain in `seq` order.
    async fn chain(&self, meeting_id: MeetingId) -> ParlorResult<Vec<NoteSnapshot>>;

    /// Latest accepted snapshot, if any.
    async fn tip(&self, meeting_id: MeetingId) -> ParlorResult<Option<NoteSnapshot>>;
}

/// Encrypted chat messages, ordered by creation time.
#[allow(async_fn_in_trait)]
pub trait ChatRepository: Send + Sync {
    async fn append_message(&self, message: ChatMessage) -> ParlorResult<ChatMessage>;

    async fn messages(&self, meeting_id: MeetingId) -> ParlorResult<Vec<ChatMessage>>;
}

/// File records (metadata side; bytes live in object storage).
#[allow(async_fn_in_trait)]
pub trait FileRepository: Send + Sync {
    async fn create_file(&self, record: FileRecord) -> ParlorResult<FileRecord>;

    async fn file(&self, file_id: FileId) -> ParlorResult<Option<FileRecord>>;

    async fn files(&self, meeting_id: MeetingId) -> ParlorResult<Vec<FileRecord>>;
}
