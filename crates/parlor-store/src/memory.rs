//! In-memory store
//!
//! Backs all repository traits with `HashMap`s behind one `RwLock`. The
//! single write lock is what makes `redeem_invite` and snapshot appends
//! atomic: no validate can observe a half-applied revocation, and exactly
//! one append wins a `(meeting_id, seq)` race.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use parlor_core::types::{
    ChatMessage, FileId, FileRecord, Meeting, MeetingId, MeetingKeyRecord, MeetingStatus,
    NoteSnapshot,
};
use parlor_core::{ParlorError, ParlorResult};
use parlor_crypto::{snapshot_digest, GENESIS_SNAPSHOT_HASH};

use crate::repository::{
    ChatRepository, FileRepository, MeetingKeyRepository, MeetingRepository, SnapshotRepository,
};

#[derive(Default)]
struct Inner {
    meetings: HashMap<MeetingId, Meeting>,
    keys: HashMap<MeetingId, MeetingKeyRecord>,
    snapshots: HashMap<MeetingId, Vec<NoteSnapshot>>,
    chat: HashMap<MeetingId, Vec<ChatMessage>>,
    files: HashMap<FileId, FileRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn meeting_not_found(id: MeetingId) -> ParlorError {
    ParlorError::NotFound(format!("meeting {id}"))
}

impl MeetingRepository for MemoryStore {
    async fn create_meeting(&self, meeting: Meeting) -> ParlorResult<Meeting> {
        let mut inner = self.inner.write().await;
        if inner.meetings.contains_key(&meeting.id) {
            return Err(ParlorError::Storage(format!(
                "meeting {} already exists",
                meeting.id
            )));
        }
        inner.meetings.insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    async fn meeting(&self, id: MeetingId) -> ParlorResult<Option<Meeting>> {
        Ok(self.inner.read().await.meetings.get(&id).cloned())
    }

    async fn set_status(&self, id: MeetingId, status: MeetingStatus) -> ParlorResult<Meeting> {
        let mut inner = self.inner.write().await;
        let meeting = inner
            .meetings
            .get_mut(&id)
            .ok_or_else(|| meeting_not_found(id))?;
        meeting.status = status;
        Ok(meeting.clone())
    }

    async fn set_invite(
        &self,
        id: MeetingId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> ParlorResult<Meeting> {
        let mut inner = self.inner.write().await;
        let meeting = inner
            .meetings
            .get_mut(&id)
            .ok_or_else(|| meeting_not_found(id))?;
        meeting.invite_token_hash = Some(token_hash.to_string());
        meeting.invite_expires_at = Some(expires_at);
        meeting.invite_redeemed_at = None;
        Ok(meeting.clone())
    }

    async fn clear_invite(&self, id: MeetingId) -> ParlorResult<Meeting> {
        let mut inner = self.inner.write().await;
        let meeting = inner
            .meetings
            .get_mut(&id)
            .ok_or_else(|| meeting_not_found(id))?;
        meeting.invite_token_hash = None;
        meeting.invite_expires_at = None;
        Ok(meeting.clone())
    }

    async fn redeem_invite(
        &self,
        id: MeetingId,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> ParlorResult<Option<Meeting>> {
        let mut inner = self.inner.write().await;
        let meeting = inner
            .meetings
            .get_mut(&id)
            .ok_or_else(|| meeting_not_found(id))?;

        let digest_current = meeting
            .invite_token_hash
            .as_deref()
            .is_some_and(|stored| stored == token_hash);
        if !digest_current || meeting.invite_redeemed_at.is_some() {
            return Ok(None);
        }

        meeting.invite_redeemed_at = Some(at);
        Ok(Some(meeting.clone()))
    }
}

impl MeetingKeyRepository for MemoryStore {
    async fn put_key(&self, record: MeetingKeyRecord) -> ParlorResult<MeetingKeyRecord> {
        // No meeting-existence check: key issuance precedes the meeting row
        // during creation, so the meeting is never observable without its key.
        let mut inner = self.inner.write().await;
        inner.keys.insert(record.meeting_id, record.clone());
        Ok(record)
    }

    async fn key(&self, meeting_id: MeetingId) -> ParlorResult<Option<MeetingKeyRecord>> {
        Ok(self.inner.read().await.keys.get(&meeting_id).cloned())
    }

    async fn shred(&self, meeting_id: MeetingId, _at: DateTime<Utc>) -> ParlorResult<Meeting> {
        // Key destruction and the lifecycle transition happen under one
        // write-lock acquisition: a reader never sees one without the other.
        let mut inner = self.inner.write().await;
        if !inner.meetings.contains_key(&meeting_id) {
            return Err(meeting_not_found(meeting_id));
        }
        inner.keys.remove(&meeting_id);
        let meeting = inner
            .meetings
            .get_mut(&meeting_id)
            .ok_or_else(|| meeting_not_found(meeting_id))?;
        meeting.status = MeetingStatus::Shredded;
        meeting.invite_token_hash = None;
        meeting.invite_expires_at = None;
        Ok(meeting.clone())
    }
}

impl SnapshotRepository for MemoryStore {
    async fn append_snapshot(&self, snapshot: NoteSnapshot) -> ParlorResult<NoteSnapshot> {
        let mut inner = self.inner.write().await;
        if !inner.meetings.contains_key(&snapshot.meeting_id) {
            return Err(meeting_not_found(snapshot.meeting_id));
        }

        let chain = inner.snapshots.entry(snapshot.meeting_id).or_default();
        let tip = chain.last();

        let (expected_seq, expected_prev) = match tip {
            None => (1, GENESIS_SNAPSHOT_HASH.to_string()),
            Some(tip) => (tip.seq + 1, snapshot_digest(&tip.ciphertext)),
        };

        if snapshot.seq != expected_seq || snapshot.prev_snapshot_hash != expected_prev {
            return Err(ParlorError::Conflict {
                tip_seq: tip.map(|t| t.seq).unwrap_or(0),
                current_tip: tip.cloned().map(Box::new),
            });
        }

        if chain.iter().any(|s| s.nonce == snapshot.nonce) {
            return Err(ParlorError::NonceReuse);
        }

        chain.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn chain(&self, meeting_id: MeetingId) -> ParlorResult<Vec<NoteSnapshot>> {
        Ok(self
            .inner
            .read()
            .await
            .snapshots
            .get(&meeting_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn tip(&self, meeting_id: MeetingId) -> ParlorResult<Option<NoteSnapshot>> {
        Ok(self
            .inner
            .read()
            .await
            .snapshots
            .get(&meeting_id)
            .and_then(|chain| chain.last().cloned()))
    }
}

impl ChatRepository for MemoryStore {
    async fn append_message(&self, message: ChatMessage) -> ParlorResult<ChatMessage> {
        let mut inner = self.inner.write().await;
        if !inner.meetings.contains_key(&message.meeting_id) {
            return Err(meeting_not_found(message.meeting_id));
        }
        inner
            .chat
            .entry(message.meeting_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages(&self, meeting_id: MeetingId) -> ParlorResult<Vec<ChatMessage>> {
        Ok(self
            .inner
            .read()
            .await
            .chat
            .get(&meeting_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl FileRepository for MemoryStore {
    async fn create_file(&self, record: FileRecord) -> ParlorResult<FileRecord> {
        let mut inner = self.inner.write().await;
        if !inner.meetings.contains_key(&record.meeting_id) {
            return Err(meeting_not_found(record.meeting_id));
        }
        inner.files.insert(record.id, record.clone());
        Ok(record)
    }

    async fn file(&self, file_id: FileId) -> ParlorResult<Option<FileRecord>> {
        Ok(self.inner.read().await.files.get(&file_id).cloned())
    }

    async fn files(&self, meeting_id: MeetingId) -> ParlorResult<Vec<FileRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<FileRecord> = inner
            .files
            .values()
            .filter(|f| f.meeting_id == meeting_id)
            .cloned()
            .collect();
        records.sort_by_key(|f| f.created_at);
        Ok(records)
    }
}
