//! Shared XChaCha20-Poly1305 payload encryption
//!
//! Every encrypted surface (note snapshots, chat bodies, file metadata, file
//! bytes) goes through this one primitive. The nonce is random per
//! encryption and stored alongside the ciphertext, never embedded in it.
//!
//! AAD binds each ciphertext to the meeting and its position/role context,
//! preventing cross-meeting substitution and role or sequence reshuffling:
//! ```text
//! note:       "note"  || meeting_id (16) || seq (8, BE) [|| section bytes]
//! chat:       "chat"  || meeting_id (16) || role tag (1)
//! file meta:  "fmeta" || meeting_id (16) || file_id (16)
//! file bytes: "fbody" || meeting_id (16) || storage_key bytes
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Output of [`encrypt_payload`]: nonce and ciphertext as separate columns.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    /// 24-byte random nonce
    pub nonce: Vec<u8>,
    /// Ciphertext including the 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
}

/// Encrypt one payload under a derived content key.
pub fn encrypt_payload(
    key: &[u8; KEY_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> anyhow::Result<EncryptedPayload> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("payload encryption failed: {e}"))?;

    Ok(EncryptedPayload {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt one payload under a derived content key.
///
/// Fails on a wrong key, a tampered ciphertext, or an AAD mismatch
/// (wrong meeting, wrong position, flipped role tag).
pub fn decrypt_payload(
    key: &[u8; KEY_SIZE],
    aad: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> anyhow::Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        anyhow::bail!("nonce has wrong size: {} bytes (expected {})", nonce.len(), NONCE_SIZE);
    }
    if ciphertext.len() < TAG_SIZE {
        anyhow::bail!(
            "ciphertext too short: {} bytes (minimum {})",
            ciphertext.len(),
            TAG_SIZE
        );
    }

    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| {
            anyhow::anyhow!("payload decryption failed: wrong key, corrupted data, or AAD mismatch")
        })
}

/// AAD for a note snapshot: binds it to the meeting, its chain position, and
/// the optional authenticated section context.
pub fn note_aad(meeting_id: &[u8; 16], seq: u64, section: Option<&str>) -> Vec<u8> {
    let section_bytes = section.map(str::as_bytes).unwrap_or_default();
    let mut aad = Vec::with_capacity(4 + 16 + 8 + section_bytes.len());
    aad.extend_from_slice(b"note");
    aad.extend_from_slice(meeting_id);
    aad.extend_from_slice(&seq.to_be_bytes());
    aad.extend_from_slice(section_bytes);
    aad
}

/// AAD for a chat message: binds it to the meeting and the sender role, so a
/// stored role tag cannot be flipped without failing decryption.
pub fn chat_aad(meeting_id: &[u8; 16], role_tag: u8) -> Vec<u8> {
    let mut aad = Vec::with_capacity(4 + 16 + 1);
    aad.extend_from_slice(b"chat");
    aad.extend_from_slice(meeting_id);
    aad.push(role_tag);
    aad
}

/// AAD for a file's encrypted metadata document.
pub fn file_meta_aad(meeting_id: &[u8; 16], file_id: &[u8; 16]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(5 + 16 + 16);
    aad.extend_from_slice(b"fmeta");
    aad.extend_from_slice(meeting_id);
    aad.extend_from_slice(file_id);
    aad
}

/// AAD for a file's encrypted bytes in object storage.
pub fn file_bytes_aad(meeting_id: &[u8; 16], storage_key: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(5 + 16 + storage_key.len());
    aad.extend_from_slice(b"fbody");
    aad.extend_from_slice(meeting_id);
    aad.extend_from_slice(storage_key.as_bytes());
    aad
}
