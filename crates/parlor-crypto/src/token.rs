//! Invite tokens
//!
//! A token is 32 bytes of CSPRNG entropy, URL-safe base64 encoded for the
//! invite link. Only its SHA-256 digest is ever stored; comparison against a
//! candidate is constant-time over the full digest width, so the comparison
//! cannot leak a matching prefix through timing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::DIGEST_SIZE;

/// Entropy of a plaintext invite token in bytes.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh plaintext invite token (URL-safe base64, no padding).
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a plaintext token, as 64 lowercase hex chars. This is
/// the only form a token is persisted in.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Constant-time check of a candidate token against a stored hex digest.
///
/// Returns `false` for a malformed stored digest rather than erroring: a
/// corrupt digest means no token can validate, which is the safe direction.
pub fn digest_matches(stored_hex: &str, candidate_token: &str) -> bool {
    let Ok(stored) = hex::decode(stored_hex) else {
        return false;
    };
    if stored.len() != DIGEST_SIZE {
        return false;
    }

    let candidate = Sha256::digest(candidate_token.as_bytes());
    stored.ct_eq(candidate.as_slice()).into()
}
