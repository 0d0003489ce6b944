//! File vault: encrypted bytes out-of-band, encrypted metadata in-band
//!
//! Bytes go to object storage as `[24-byte nonce][ciphertext]` under an
//! opaque per-file storage key; the descriptive metadata (original name,
//! mime type) is a separately encrypted JSON document on the relational
//! side. A breach of either store alone yields only opaque ciphertext.

use std::sync::Arc;

use uuid::Uuid;

use parlor_core::types::{FileId, FileMetadata, FileRecord};
use parlor_core::{Clock, ParlorError, ParlorResult};
use parlor_crypto::{
    decrypt_payload, derive_content_key, encrypt_payload, file_bytes_aad, file_meta_aad,
    ContentKind, MeetingDek, NONCE_SIZE,
};
use parlor_store::{FileRepository, ObjectStore};

use crate::boundary::LiveSession;

/// A file record with its decrypted metadata.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub record: FileRecord,
    pub metadata: FileMetadata,
}

pub struct FileVault<F> {
    files: Arc<F>,
    objects: ObjectStore,
    clock: Arc<dyn Clock>,
}

impl<F: FileRepository> FileVault<F> {
    pub fn new(files: Arc<F>, objects: ObjectStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            files,
            objects,
            clock,
        }
    }

    /// Encrypt and store one file: bytes to object storage, metadata to the
    /// relational side. The storage key is a fresh UUID path and reveals
    /// nothing about name or type.
    pub async fn upload(
        &self,
        session: &LiveSession,
        dek: &MeetingDek,
        metadata: FileMetadata,
        bytes: &[u8],
    ) -> ParlorResult<FileRecord> {
        let meeting_id = session.meeting.id;
        let file_id = Uuid::new_v4();
        let storage_key = format!("meetings/{meeting_id}/{}", Uuid::new_v4());

        let bytes_key = derive_content_key(dek, ContentKind::FileBytes)?;
        let sealed_body = encrypt_payload(
            &bytes_key,
            &file_bytes_aad(meeting_id.as_bytes(), &storage_key),
            bytes,
        )?;
        let mut blob = sealed_body.nonce;
        blob.extend_from_slice(&sealed_body.ciphertext);
        self.objects.put(&storage_key, blob).await?;

        let meta_key = derive_content_key(dek, ContentKind::FileMeta)?;
        let meta_plain = serde_json::to_vec(&metadata)
            .map_err(|e| anyhow::anyhow!("file metadata serialization: {e}"))?;
        let sealed_meta = encrypt_payload(
            &meta_key,
            &file_meta_aad(meeting_id.as_bytes(), file_id.as_bytes()),
            &meta_plain,
        )?;

        let record = self
            .files
            .create_file(FileRecord {
                id: file_id,
                meeting_id,
                uploader_role: session.role,
                storage_key,
                size_bytes: bytes.len() as u64,
                ciphertext_meta: sealed_meta.ciphertext,
                nonce_meta: sealed_meta.nonce,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            meeting_id = %meeting_id,
            file_id = %record.id,
            size_bytes = record.size_bytes,
            role = %record.uploader_role,
            "file stored"
        );
        Ok(record)
    }

    /// Fetch and decrypt one file: metadata and bytes.
    pub async fn download(
        &self,
        session: &LiveSession,
        dek: &MeetingDek,
        file_id: FileId,
    ) -> ParlorResult<(FileMetadata, Vec<u8>)> {
        let record = self
            .files
            .file(file_id)
            .await?
            .ok_or_else(|| ParlorError::NotFound(format!("file {file_id}")))?;
        if record.meeting_id != session.meeting.id {
            // A proof for one meeting buys nothing in another.
            return Err(ParlorError::AccessDenied);
        }

        let metadata = self.decrypt_metadata(dek, &record)?;

        let blob = self.objects.get(&record.storage_key).await?;
        if blob.len() < NONCE_SIZE {
            return Err(ParlorError::IntegrityViolation(format!(
                "stored object {} is truncated",
                record.storage_key
            )));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

        let bytes_key = derive_content_key(dek, ContentKind::FileBytes)?;
        let bytes = decrypt_payload(
            &bytes_key,
            &file_bytes_aad(record.meeting_id.as_bytes(), &record.storage_key),
            nonce,
            ciphertext,
        )
        .map_err(|_| {
            ParlorError::IntegrityViolation(format!(
                "file {} bytes failed authentication",
                record.id
            ))
        })?;

        Ok((metadata, bytes))
    }

    /// List the meeting's files with decrypted metadata.
    pub async fn list(
        &self,
        session: &LiveSession,
        dek: &MeetingDek,
    ) -> ParlorResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for record in self.files.files(session.meeting.id).await? {
            let metadata = self.decrypt_metadata(dek, &record)?;
            entries.push(FileEntry { record, metadata });
        }
        Ok(entries)
    }

    fn decrypt_metadata(&self, dek: &MeetingDek, record: &FileRecord) -> ParlorResult<FileMetadata> {
        let meta_key = derive_content_key(dek, ContentKind::FileMeta)?;
        let plain = decrypt_payload(
            &meta_key,
            &file_meta_aad(record.meeting_id.as_bytes(), record.id.as_bytes()),
            &record.nonce_meta,
            &record.ciphertext_meta,
        )
        .map_err(|_| {
            ParlorError::IntegrityViolation(format!(
                "file {} metadata failed authentication",
                record.id
            ))
        })?;

        serde_json::from_slice(&plain)
            .map_err(|e| anyhow::anyhow!("file metadata deserialization: {e}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use parlor_core::types::{Meeting, MeetingStatus, Role};
    use parlor_core::SystemClock;
    use parlor_crypto::generate_dek;
    use parlor_store::{MeetingRepository, MemoryStore};

    async fn setup() -> (FileVault<MemoryStore>, Arc<MemoryStore>, Meeting) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let meeting = store
            .create_meeting(Meeting {
                id: Uuid::new_v4(),
                professional_id: Uuid::new_v4(),
                title: None,
                client_name: "Jo Client".into(),
                client_email: "jo@example.com".into(),
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
                status: MeetingStatus::InProgress,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await
            .unwrap();
        let vault = FileVault::new(
            Arc::clone(&store),
            ObjectStore::memory().unwrap(),
            Arc::new(SystemClock),
        );
        (vault, store, meeting)
    }

    fn session(meeting: &Meeting, role: Role) -> LiveSession {
        LiveSession {
            meeting: meeting.clone(),
            role,
        }
    }

    fn report_metadata() -> FileMetadata {
        FileMetadata {
            original_name: "assessment-report.pdf".into(),
            mime_type: "application/pdf".into(),
        }
    }

    #[tokio::test]
    async fn upload_download_roundtrip() {
        let (vault, _store, meeting) = setup().await;
        let dek = generate_dek();
        let bytes = b"%PDF-1.7 fake report body";

        let record = vault
            .upload(&session(&meeting, Role::Guest), &dek, report_metadata(), bytes)
            .await
            .unwrap();
        assert_eq!(record.size_bytes, bytes.len() as u64);
        assert_eq!(record.uploader_role, Role::Guest);

        let (metadata, downloaded) = vault
            .download(&session(&meeting, Role::Professional), &dek, record.id)
            .await
            .unwrap();
        assert_eq!(metadata, report_metadata());
        assert_eq!(downloaded, bytes);
    }

    #[tokio::test]
    async fn storage_key_reveals_nothing() {
        let (vault, store, meeting) = setup().await;
        let dek = generate_dek();

        let record = vault
            .upload(&session(&meeting, Role::Guest), &dek, report_metadata(), b"x")
            .await
            .unwrap();

        assert!(!record.storage_key.contains("assessment"));
        assert!(!record.storage_key.contains("pdf"));

        // Relational side also carries no plaintext name.
        let stored = store.file(record.id).await.unwrap().unwrap();
        assert!(!stored
            .ciphertext_meta
            .windows(b"assessment".len())
            .any(|w| w == b"assessment"));
    }

    #[tokio::test]
    async fn cross_meeting_download_is_denied() {
        let (vault, store, meeting) = setup().await;
        let dek = generate_dek();

        let record = vault
            .upload(&session(&meeting, Role::Guest), &dek, report_metadata(), b"x")
            .await
            .unwrap();

        let now = Utc::now();
        let other = store
            .create_meeting(Meeting {
                id: Uuid::new_v4(),
                professional_id: Uuid::new_v4(),
                title: None,
                client_name: "Other".into(),
                client_email: "other@example.com".into(),
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
                status: MeetingStatus::InProgress,
                invite_token_hash: None,
                invite_expires_at: None,
                invite_redeemed_at: None,
                created_at: now,
            })
            .await
            .unwrap();

        let result = vault
            .download(&session(&other, Role::Professional), &dek, record.id)
            .await;
        assert!(matches!(result, Err(ParlorError::AccessDenied)));
    }

    #[tokio::test]
    async fn tampered_blob_fails() {
        let (vault, _store, meeting) = setup().await;
        let dek = generate_dek();

        let record = vault
            .upload(
                &session(&meeting, Role::Guest),
                &dek,
                report_metadata(),
                b"bytes to tamper",
            )
            .await
            .unwrap();

        // Overwrite the stored object with a corrupted copy.
        let mut blob = vault.objects.get(&record.storage_key).await.unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        vault.objects.put(&record.storage_key, blob).await.unwrap();

        let result = vault
            .download(&session(&meeting, Role::Guest), &dek, record.id)
            .await;
        assert!(matches!(result, Err(ParlorError::IntegrityViolation(_))));
    }
}
