//! Local master-key KMS backend
//!
//! Wraps DEKs with XChaCha20-Poly1305 under a single in-process master key.
//! Wire format: `[24-byte nonce][ciphertext + 16-byte tag]`.
//!
//! Master key discovery, in order of precedence:
//!   1. `PARLOR_KMS_MASTER_KEY` env var (64 hex chars)
//!   2. `kms.master_key_file` from config (64 hex chars, surrounding
//!      whitespace ignored)

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use parlor_core::config::KmsConfig;
use parlor_crypto::{MeetingDek, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

use crate::{KmsClient, KmsError, KmsResult};

const MASTER_KEY_ENV: &str = "PARLOR_KMS_MASTER_KEY";

pub struct LocalKms {
    key_id: String,
    master: [u8; KEY_SIZE],
}

impl LocalKms {
    pub fn new(key_id: impl Into<String>, master: [u8; KEY_SIZE]) -> Self {
        Self {
            key_id: key_id.into(),
            master,
        }
    }

    /// A KMS with a random master key, for tests and throwaway environments.
    /// Everything wrapped by it is unrecoverable once the process exits.
    pub fn ephemeral(key_id: impl Into<String>) -> Self {
        let mut master = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut master);
        Self::new(key_id, master)
    }

    /// Load the master key via the discovery chain.
    pub fn from_config(config: &KmsConfig) -> anyhow::Result<Self> {
        if let Ok(hex_key) = std::env::var(MASTER_KEY_ENV) {
            let master = parse_master_hex(hex_key.trim())?;
            tracing::info!(key_id = %config.key_id, source = "env", "local kms master key loaded");
            return Ok(Self::new(config.key_id.clone(), master));
        }

        if let Some(path) = &config.master_key_file {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading master key file {}: {e}", path.display()))?;
            let master = parse_master_hex(content.trim())?;
            tracing::info!(key_id = %config.key_id, source = "file", "local kms master key loaded");
            return Ok(Self::new(config.key_id.clone(), master));
        }

        anyhow::bail!(
            "no master key configured: set {MASTER_KEY_ENV} or kms.master_key_file"
        )
    }

    fn check_key_id(&self, key_id: &str) -> KmsResult<()> {
        if key_id != self.key_id {
            return Err(KmsError::UnknownKey(key_id.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKms")
            .field("key_id", &self.key_id)
            .field("master", &"[REDACTED]")
            .finish()
    }
}

impl Drop for LocalKms {
    fn drop(&mut self) {
        self.master.zeroize();
    }
}

impl KmsClient for LocalKms {
    async fn wrap_dek(&self, key_id: &str, dek: &MeetingDek) -> KmsResult<Vec<u8>> {
        self.check_key_id(key_id)?;

        let cipher = XChaCha20Poly1305::new((&self.master).into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, dek.as_bytes().as_ref())
            .map_err(|e| KmsError::Unavailable(format!("dek wrapping failed: {e}")))?;

        let mut wrapped = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        wrapped.extend_from_slice(&nonce_bytes);
        wrapped.extend_from_slice(&ciphertext);
        Ok(wrapped)
    }

    async fn unwrap_dek(&self, key_id: &str, wrapped: &[u8]) -> KmsResult<MeetingDek> {
        self.check_key_id(key_id)?;

        if wrapped.len() < NONCE_SIZE + KEY_SIZE + TAG_SIZE {
            return Err(KmsError::InvalidMaterial(format!(
                "wrapped dek too short: {} bytes (expected at least {})",
                wrapped.len(),
                NONCE_SIZE + KEY_SIZE + TAG_SIZE
            )));
        }

        let (nonce_bytes, ciphertext) = wrapped.split_at(NONCE_SIZE);
        let nonce = XNonce::from_slice(nonce_bytes);
        let cipher = XChaCha20Poly1305::new((&self.master).into());

        let mut plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
            KmsError::InvalidMaterial("wrong master key or corrupted data".to_string())
        })?;

        if plaintext.len() != KEY_SIZE {
            plaintext.zeroize();
            return Err(KmsError::InvalidMaterial(format!(
                "unwrapped dek has wrong size: {} bytes (expected {KEY_SIZE})",
                plaintext.len()
            )));
        }

        let mut dek_bytes = [0u8; KEY_SIZE];
        dek_bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();

        Ok(MeetingDek::from_bytes(dek_bytes))
    }
}

fn parse_master_hex(hex_key: &str) -> anyhow::Result<[u8; KEY_SIZE]> {
    let mut decoded = hex::decode(hex_key)
        .map_err(|e| anyhow::anyhow!("master key is not valid hex: {e}"))?;
    if decoded.len() != KEY_SIZE {
        decoded.zeroize();
        anyhow::bail!(
            "master key has wrong size: {} bytes (expected {KEY_SIZE})",
            decoded.len()
        );
    }
    let mut master = [0u8; KEY_SIZE];
    master.copy_from_slice(&decoded);
    decoded.zeroize();
    Ok(master)
}
