//! Notes ledger: the hash-chained snapshot history
//!
//! Concurrency control is rebase, not merge: the server cannot see note
//! plaintext, so a writer whose `claimed_prev_hash` no longer matches the
//! tip gets `Conflict` (with the tip attached) and recomputes its edit
//! client-side. Acceptance itself is the store's atomic compare-and-append.
//!
//! Verification re-walks every link on read. A tampered middle record breaks
//! the link to its successor; the final record is covered by AEAD and the
//! writer's `client_hash`, both checked in [`open_snapshot`].

use std::sync::Arc;

use uuid::Uuid;

use parlor_core::types::{MeetingId, NoteSnapshot};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::{
    decrypt_payload, derive_content_key, encrypt_payload, note_aad, plaintext_digest,
    snapshot_digest, ContentKind, MeetingDek, GENESIS_SNAPSHOT_HASH,
};
use parlor_store::SnapshotRepository;

use crate::boundary::LiveSession;

/// Writer-side input to an append: everything the client computed before
/// calling in. The server never sees the plaintext behind `ciphertext`.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub seq: u64,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub aad: Option<String>,
    pub client_hash: Option<String>,
    pub claimed_prev_hash: String,
}

/// Output of [`seal_snapshot`].
#[derive(Debug, Clone)]
pub struct SealedNote {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub client_hash: String,
}

/// Encrypt one notes state for appending at `seq`.
///
/// Writer-side helper: derives the notes content key, binds the ciphertext
/// to `(meeting, seq, section)` via AAD, and records the plaintext digest as
/// `client_hash` for end-to-end integrity independent of the server.
pub fn seal_snapshot(
    dek: &MeetingDek,
    meeting_id: MeetingId,
    seq: u64,
    section: Option<&str>,
    plaintext: &[u8],
) -> ParlorResult<SealedNote> {
    let key = derive_content_key(dek, ContentKind::Notes)?;
    let aad = note_aad(meeting_id.as_bytes(), seq, section);
    let sealed = encrypt_payload(&key, &aad, plaintext)?;

    Ok(SealedNote {
        ciphertext: sealed.ciphertext,
        nonce: sealed.nonce,
        client_hash: plaintext_digest(plaintext),
    })
}

/// Decrypt one accepted snapshot and check the writer's `client_hash`.
pub fn open_snapshot(dek: &MeetingDek, snapshot: &NoteSnapshot) -> ParlorResult<Vec<u8>> {
    let key = derive_content_key(dek, ContentKind::Notes)?;
    let aad = note_aad(
        snapshot.meeting_id.as_bytes(),
        snapshot.seq,
        snapshot.aad.as_deref(),
    );

    let plaintext = decrypt_payload(&key, &aad, &snapshot.nonce, &snapshot.ciphertext)
        .map_err(|_| {
            ParlorError::IntegrityViolation(format!(
                "snapshot seq {} failed authentication",
                snapshot.seq
            ))
        })?;

    if let Some(expected) = &snapshot.client_hash {
        if plaintext_digest(&plaintext) != *expected {
            return Err(ParlorError::IntegrityViolation(format!(
                "snapshot seq {} plaintext does not match its client hash",
                snapshot.seq
            )));
        }
    }

    Ok(plaintext)
}

/// Walk a chain and check it end to end: `seq` contiguous from 1, each
/// `prev_snapshot_hash` equal to the digest of its predecessor's ciphertext,
/// genesis anchored at the sentinel. Never repairs; a broken link is a hard
/// failure.
pub fn verify_chain(chain: &[NoteSnapshot]) -> ParlorResult<()> {
    let mut expected_prev = GENESIS_SNAPSHOT_HASH.to_string();

    for (i, snapshot) in chain.iter().enumerate() {
        let expected_seq = (i + 1) as u64;
        if snapshot.seq != expected_seq {
            return Err(ParlorError::IntegrityViolation(format!(
                "sequence gap: expected seq {expected_seq}, found {}",
                snapshot.seq
            )));
        }
        if snapshot.prev_snapshot_hash != expected_prev {
            return Err(ParlorError::IntegrityViolation(format!(
                "broken chain link at seq {expected_seq}"
            )));
        }
        expected_prev = snapshot_digest(&snapshot.ciphertext);
    }

    Ok(())
}

pub struct NotesLedger<S> {
    snapshots: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: SnapshotRepository> NotesLedger<S> {
    pub fn new(snapshots: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { snapshots, clock }
    }

    /// Append one snapshot for a validated session.
    ///
    /// Accepted only when `draft.seq` and `draft.claimed_prev_hash` match
    /// the current tip exactly; otherwise `Conflict` carries the tip back to
    /// the writer for a rebase.
    pub async fn append_snapshot(
        &self,
        session: &LiveSession,
        draft: NoteDraft,
    ) -> ParlorResult<NoteSnapshot> {
        let snapshot = NoteSnapshot {
            id: Uuid::new_v4(),
            meeting_id: session.meeting.id,
            seq: draft.seq,
            ciphertext: draft.ciphertext,
            nonce: draft.nonce,
            aad: draft.aad,
            client_hash: draft.client_hash,
            prev_snapshot_hash: draft.claimed_prev_hash,
            created_at: self.clock.now(),
        };

        match self.snapshots.append_snapshot(snapshot).await {
            Ok(accepted) => {
                tracing::debug!(
                    meeting_id = %accepted.meeting_id,
                    seq = accepted.seq,
                    role = %session.role,
                    "snapshot accepted"
                );
                Ok(accepted)
            }
            Err(err @ ParlorError::Conflict { .. }) => {
                // Expected under concurrent editing; the caller rebases.
                tracing::debug!(meeting_id = %session.meeting.id, "snapshot append lost to the current tip");
                Err(err)
            }
            Err(other) => Err(other),
        }
    }

    /// Full chain, verified link by link before it is returned.
    pub async fn read_chain(&self, session: &LiveSession) -> ParlorResult<Vec<NoteSnapshot>> {
        let chain = self.snapshots.chain(session.meeting.id).await?;
        verify_chain(&chain)?;
        Ok(chain)
    }

    /// The current tip alone, for normal consumption.
    pub async fn latest(&self, session: &LiveSession) -> ParlorResult<Option<NoteSnapshot>> {
        self.snapshots.tip(session.meeting.id).await
    }
}
