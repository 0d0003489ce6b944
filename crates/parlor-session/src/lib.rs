//! parlor-session: the encrypted-session core
//!
//! Composition, leaves first:
//!
//! - [`KeyVault`] mints and unwraps the per-meeting DEK through the KMS
//!   boundary; the unwrapped key lives only in a request-scoped handle.
//! - [`AccessTokenController`] issues, validates and revokes invite tokens;
//!   a successful validation is the only source of guest [`SessionProof`]s.
//! - [`SessionBoundary`] is the sole gate in front of the key vault: every
//!   operation re-validates proof freshness and yields a [`LiveSession`],
//!   the capability the other components demand before touching key
//!   material.
//! - [`NotesLedger`] keeps the hash-chained snapshot history per meeting.
//! - [`ChatChannel`] and [`FileVault`] are stateless AEAD wrappers over the
//!   session's content keys.
//!
//! [`MeetingService`] wires the five together into the API the rest of the
//! application consumes.

pub mod access;
pub mod boundary;
pub mod chat;
pub mod files;
pub mod keyvault;
pub mod ledger;
pub mod proof;
pub mod service;

pub use access::AccessTokenController;
pub use boundary::{LiveSession, SessionBoundary};
pub use chat::{ChatChannel, ChatEntry};
pub use files::{FileEntry, FileVault};
pub use keyvault::KeyVault;
pub use ledger::{open_snapshot, seal_snapshot, verify_chain, NoteDraft, NotesLedger, SealedNote};
pub use proof::{ProfessionalProof, SessionProof};
pub use service::{MeetingService, NewMeeting};
