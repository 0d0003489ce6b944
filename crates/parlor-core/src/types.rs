//! Record types mirroring the relational schema
//!
//! Ciphertext and nonces are raw bytes here; hex/base64 encoding is a
//! storage-layer concern. Digests (`client_hash`, `prev_snapshot_hash`) are
//! lowercase hex strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MeetingId = Uuid;
pub type SnapshotId = Uuid;
pub type MessageId = Uuid;
pub type FileId = Uuid;
pub type ProfessionalId = Uuid;

/// Who is acting inside a meeting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Professional,
    Guest,
}

impl Role {
    /// Stable single-byte tag, bound into AEAD associated data.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Professional => 0x01,
            Self::Guest => 0x02,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

/// Meeting lifecycle.
///
/// `Shredded` is the crypto-shredding transition: the meeting's wrapped DEK
/// has been destroyed and every ciphertext belonging to it is permanently
/// unreadable. The transition is recorded here, on the meeting itself, so it
/// can be asserted independently of storage cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Ended,
    Shredded,
}

/// One scheduled professional/guest session.
///
/// Invite state lives on the meeting row: only the one-way digest of the
/// current invite token is stored, never the token itself. `invite_redeemed_at`
/// marks the single allowed redemption of that token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub professional_id: ProfessionalId,
    pub title: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: MeetingStatus,
    /// Hex SHA-256 digest of the current invite token; `None` once revoked.
    pub invite_token_hash: Option<String>,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub invite_redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    /// A meeting accepts new session activity only before it has ended.
    pub fn is_active(&self) -> bool {
        matches!(self.status, MeetingStatus::Scheduled | MeetingStatus::InProgress)
    }
}

/// The KMS-wrapped data-encryption key for one meeting (1:1).
///
/// Destroying this record is the crypto-shredding mechanism: without it the
/// meeting's ciphertext can never be decrypted again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingKeyRecord {
    pub meeting_id: MeetingId,
    /// Base64 of the wrapped DEK as returned by the KMS.
    pub wrapped_dek: String,
    /// Identifier of the KMS master key the DEK is wrapped under.
    pub kms_key_id: String,
    pub created_at: DateTime<Utc>,
}

/// One versioned, encrypted state of a meeting's structured notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub id: SnapshotId,
    pub meeting_id: MeetingId,
    /// Strictly contiguous per meeting, starting at 1.
    pub seq: u64,
    pub ciphertext: Vec<u8>,
    /// 24-byte XChaCha20 nonce, unique per encryption under one DEK.
    pub nonce: Vec<u8>,
    /// Authenticated-but-not-encrypted section context, if any.
    pub aad: Option<String>,
    /// Hex BLAKE3 the writer computed over its own plaintext, for end-to-end
    /// integrity independent of the server.
    pub client_hash: Option<String>,
    /// Hex BLAKE3 of the previous accepted snapshot's ciphertext
    /// (the genesis sentinel for seq 1).
    pub prev_snapshot_hash: String,
    pub created_at: DateTime<Utc>,
}

/// An encrypted, role-tagged chat message. Ephemeral stream: ordered by
/// creation time, no chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub meeting_id: MeetingId,
    pub sender_role: Role,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Relational-side record of an uploaded file. The bytes themselves live in
/// object storage under `storage_key`; name and type are only readable through
/// the encrypted metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub meeting_id: MeetingId,
    pub uploader_role: Role,
    /// Opaque object-storage key; reveals nothing about name or type.
    pub storage_key: String,
    pub size_bytes: u64,
    pub ciphertext_meta: Vec<u8>,
    pub nonce_meta: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Plaintext of the encrypted per-file metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub original_name: String,
    pub mime_type: String,
}
