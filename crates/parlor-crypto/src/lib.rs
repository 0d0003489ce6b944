//! parlor-crypto: encryption primitives for the encrypted-session core
//!
//! One AEAD primitive (XChaCha20-Poly1305) covers notes, chat and file
//! metadata; what differs per surface is the derived subkey and the AAD
//! binding.
//!
//! Key hierarchy:
//! ```text
//! Meeting DEK (256-bit random, wrapped by the external KMS)
//!   ├── Notes key      (HKDF-SHA256, domain="parlor-notes")
//!   ├── Chat key       (HKDF-SHA256, domain="parlor-chat")
//!   ├── File-meta key  (HKDF-SHA256, domain="parlor-filemeta")
//!   └── File-bytes key (HKDF-SHA256, domain="parlor-filebytes")
//! ```
//!
//! Snapshot chain digests are BLAKE3 over ciphertext; invite tokens are
//! stored only as SHA-256 digests and compared in constant time.

pub mod dek;
pub mod digest;
pub mod payload;
pub mod token;

pub use dek::{derive_content_key, generate_dek, ContentKind, MeetingDek};
pub use digest::{plaintext_digest, snapshot_digest, GENESIS_SNAPSHOT_HASH};
pub use payload::{
    chat_aad, decrypt_payload, encrypt_payload, file_bytes_aad, file_meta_aad, note_aad,
    EncryptedPayload,
};
pub use token::{digest_matches, generate_invite_token, token_digest};

/// Size of a DEK or derived content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a BLAKE3 or SHA-256 digest
pub const DIGEST_SIZE: usize = 32;
