//! Snapshot chain digests
//!
//! Each accepted note snapshot commits to the BLAKE3 digest of its
//! predecessor's ciphertext, forming the hash chain that makes retroactive
//! tampering detectable. The digest function and the genesis sentinel are
//! fixed here and are part of the wire contract with verifying clients.

/// `prev_snapshot_hash` of the first snapshot in every chain: the all-zero
/// 32-byte digest.
pub const GENESIS_SNAPSHOT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// BLAKE3 digest of a snapshot's ciphertext, as 64 lowercase hex chars.
pub fn snapshot_digest(ciphertext: &[u8]) -> String {
    blake3::hash(ciphertext).to_hex().to_string()
}

/// BLAKE3 digest of plaintext bytes, for the writer-side `client_hash`.
pub fn plaintext_digest(plaintext: &[u8]) -> String {
    blake3::hash(plaintext).to_hex().to_string()
}
