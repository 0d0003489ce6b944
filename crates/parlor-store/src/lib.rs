//! parlor-store: the persistence boundary of the encrypted-session core
//!
//! Repository traits decouple the services from the concrete relational
//! backend. [`MemoryStore`] implements all of them behind a single write
//! lock, which linearizes the two operations that must be atomic: the
//! invite compare-and-redeem and the per-meeting snapshot
//! compare-and-append. A relational implementation gets the same guarantees
//! from a transaction plus a `UNIQUE (meeting_id, seq)` constraint.
//!
//! Encrypted file bytes live out-of-band in object storage ([`ObjectStore`],
//! opendal-backed); the relational side only ever sees opaque storage keys.

pub mod memory;
pub mod objects;
pub mod repository;

pub use memory::MemoryStore;
pub use objects::ObjectStore;
pub use repository::{
    ChatRepository, FileRepository, MeetingKeyRepository, MeetingRepository, SnapshotRepository,
};
