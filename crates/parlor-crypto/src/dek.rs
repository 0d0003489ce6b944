//! Meeting DEK and per-surface content keys

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// The per-meeting 256-bit data-encryption key. Exists only transiently in
/// process memory; zeroized on drop, never serialized or logged.
#[derive(Clone)]
pub struct MeetingDek {
    bytes: [u8; KEY_SIZE],
}

impl MeetingDek {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MeetingDek {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MeetingDek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingDek")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random meeting DEK.
pub fn generate_dek() -> MeetingDek {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    MeetingDek::from_bytes(bytes)
}

/// Content surface a subkey is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Notes,
    Chat,
    FileMeta,
    FileBytes,
}

impl ContentKind {
    fn domain(self) -> &'static [u8] {
        match self {
            Self::Notes => b"parlor-notes",
            Self::Chat => b"parlor-chat",
            Self::FileMeta => b"parlor-filemeta",
            Self::FileBytes => b"parlor-filebytes",
        }
    }
}

/// Derive the content key for one surface from the meeting DEK via
/// HKDF-SHA256 with a domain-specific info string.
pub fn derive_content_key(dek: &MeetingDek, kind: ContentKind) -> anyhow::Result<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(None, dek.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(kind.domain(), &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dek_generation_is_random() {
        let k1 = generate_dek();
        let k2 = generate_dek();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_derive_different_domains() {
        let dek = MeetingDek::from_bytes([42u8; KEY_SIZE]);
        let notes = derive_content_key(&dek, ContentKind::Notes).unwrap();
        let chat = derive_content_key(&dek, ContentKind::Chat).unwrap();
        let meta = derive_content_key(&dek, ContentKind::FileMeta).unwrap();

        assert_ne!(notes, chat, "different domains must produce different keys");
        assert_ne!(chat, meta);
        assert_ne!(notes, meta);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let dek = MeetingDek::from_bytes([7u8; KEY_SIZE]);
        let a = derive_content_key(&dek, ContentKind::Notes).unwrap();
        let b = derive_content_key(&dek, ContentKind::Notes).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let dek = generate_dek();
        let formatted = format!("{dek:?}");
        assert!(formatted.contains("REDACTED"));
        assert!(!formatted.contains(&hex::encode(dek.as_bytes())));
    }
}
