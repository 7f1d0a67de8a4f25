use rand::RngCore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::mime::{sniff, DetectedType};

/// Random bytes in a stored file name (hex encoded, so twice as many chars)
const STORED_NAME_BYTES: usize = 16;

/// Upload rejected before anything touched the disk
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("The file is empty")]
    Empty,

    #[error("The file is too large ({size} bytes, maximum {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file type; allowed: {allowed}")]
    UnsupportedType { allowed: String },
}

/// File store failure
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Rejected(#[from] UploadError),

    /// Stored name not found on disk
    #[error("File not found")]
    NotFound,

    /// Name does not look like something this store generated
    #[error("Invalid stored file name")]
    InvalidName,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which content types and sizes an upload slot accepts
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed: HashSet<DetectedType>,
    max_bytes: usize,
}

impl UploadPolicy {
    pub fn new(allowed: impl IntoIterator<Item = DetectedType>, max_bytes: usize) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            max_bytes,
        }
    }

    /// User and admin documents: PDF, images, Word and Excel, 10 MiB
    pub fn documents() -> Self {
        Self::new(
            [
                DetectedType::Pdf,
                DetectedType::Jpeg,
                DetectedType::Png,
                DetectedType::Webp,
                DetectedType::Doc,
                DetectedType::Docx,
                DetectedType::Xls,
                DetectedType::Xlsx,
            ],
            10 * 1024 * 1024,
        )
    }

    /// Project gallery images: JPEG, PNG, WebP, 5 MiB each
    pub fn project_images() -> Self {
        Self::new(
            [DetectedType::Jpeg, DetectedType::Png, DetectedType::Webp],
            5 * 1024 * 1024,
        )
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validates an upload and returns its sniffed type
    ///
    /// # Errors
    ///
    /// - `UploadError::Empty` for zero bytes
    /// - `UploadError::TooLarge` above the size limit
    /// - `UploadError::UnsupportedType` when sniffing fails or the type is not allowed
    pub fn check(&self, bytes: &[u8]) -> Result<DetectedType, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        match sniff(bytes) {
            Some(detected) if self.allowed.contains(&detected) => Ok(detected),
            _ => Err(UploadError::UnsupportedType {
                allowed: self.allowed_extensions(),
            }),
        }
    }

    fn allowed_extensions(&self) -> String {
        let mut extensions: Vec<&str> = self.allowed.iter().map(|t| t.extension()).collect();
        extensions.sort_unstable();
        extensions.join(", ")
    }
}

/// A file accepted into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated name: 32 hex chars and the sniffed extension
    pub stored_name: String,

    pub detected: DetectedType,

    pub size: usize,
}

impl StoredFile {
    pub fn mime_type(&self) -> &'static str {
        self.detected.mime_type()
    }
}

/// Flat directory of uploaded files
///
/// Names are generated here and validated again on every read and removal,
/// so a name coming back from the database or a URL can never address a path
/// outside the root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "File store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and persists an upload under a fresh random name
    ///
    /// The bytes are written to a temporary name first and renamed into
    /// place, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// - `StorageError::Rejected` if the policy refuses the bytes
    /// - `StorageError::Io` on write failure
    pub async fn save(&self, bytes: &[u8], policy: &UploadPolicy) -> Result<StoredFile, StorageError> {
        let detected = policy.check(bytes)?;
        let stored_name = generate_stored_name(detected);

        let final_path = self.root.join(&stored_name);
        let temp_path = self.root.join(format!(".{}.part", stored_name));

        let mut file = fs::File::create(&temp_path).await?;
        if let Err(e) = write_all_synced(&mut file, bytes).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(stored_name = %stored_name, size = bytes.len(), mime = detected.mime_type(), "Stored upload");

        Ok(StoredFile {
            stored_name,
            detected,
            size: bytes.len(),
        })
    }

    /// Reads a stored file
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidName` for names this store could not have generated
    /// - `StorageError::NotFound` if the file is gone from disk
    pub async fn read(&self, stored_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(stored_name)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(stored_name = %stored_name, "Stored file missing on disk");
                Err(StorageError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a stored file; a file already gone is not an error
    pub async fn remove(&self, stored_name: &str) -> Result<(), StorageError> {
        let path = self.path_for(stored_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(stored_name = %stored_name, "Removed stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(stored_name = %stored_name, "Stored file already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes several files, logging failures instead of returning them
    ///
    /// Used after a database commit, when the rows are already gone and a
    /// leftover file is preferable to a failed request.
    pub async fn remove_all_logged<S>(&self, stored_names: &[S])
    where
        S: AsRef<str> + Sync,
    {
        for name in stored_names {
            let name = name.as_ref();
            if let Err(e) = self.remove(name).await {
                warn!(stored_name = %name, error = %e, "Could not remove stored file");
            }
        }
    }

    /// Path of a stored file, after checking the name shape
    pub fn path_for(&self, stored_name: &str) -> Result<PathBuf, StorageError> {
        if !is_stored_name(stored_name) {
            return Err(StorageError::InvalidName);
        }
        Ok(self.root.join(stored_name))
    }
}

async fn write_all_synced(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

/// 16 random bytes as hex plus the sniffed extension
fn generate_stored_name(detected: DetectedType) -> String {
    let mut bytes = [0u8; STORED_NAME_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}.{}", hex::encode(bytes), detected.extension())
}

/// Whether a name has the `[0-9a-f]{32}.[a-z]{3,4}` shape of generated names
pub fn is_stored_name(name: &str) -> bool {
    let Some((stem, extension)) = name.split_once('.') else {
        return false;
    };

    stem.len() == STORED_NAME_BYTES * 2
        && stem.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        && (3..=4).contains(&extension.len())
        && extension.bytes().all(|b| b.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mime::fixtures;
    use uuid::Uuid;

    async fn temp_store() -> FileStore {
        let root = std::env::temp_dir().join(format!("atelier-store-{}", Uuid::new_v4()));
        FileStore::open(root).await.unwrap()
    }

    #[test]
    fn test_policy_rejects_empty_and_oversized() {
        let policy = UploadPolicy::new([DetectedType::Pdf], 16);

        assert!(matches!(policy.check(b""), Err(UploadError::Empty)));
        assert!(matches!(
            policy.check(&[b'%'; 17]),
            Err(UploadError::TooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn test_image_policy_rejects_documents() {
        let policy = UploadPolicy::project_images();

        assert_eq!(policy.check(&fixtures::png()).unwrap(), DetectedType::Png);
        let err = policy.check(&fixtures::pdf()).unwrap_err();
        match err {
            UploadError::UnsupportedType { allowed } => assert_eq!(allowed, "jpg, png, webp"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_document_policy_accepts_office_files() {
        let policy = UploadPolicy::documents();

        assert_eq!(policy.check(&fixtures::docx()).unwrap(), DetectedType::Docx);
        assert_eq!(policy.check(&fixtures::xls()).unwrap(), DetectedType::Xls);
        assert!(policy.check(b"#!/bin/sh\nrm -rf /").is_err());
        assert_eq!(policy.max_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_generated_names_are_random_and_well_formed() {
        let a = generate_stored_name(DetectedType::Jpeg);
        let b = generate_stored_name(DetectedType::Jpeg);

        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(is_stored_name(&a));
        assert!(is_stored_name(&generate_stored_name(DetectedType::Xlsx)));
    }

    #[test]
    fn test_is_stored_name_rejects_traversal_and_client_names() {
        assert!(!is_stored_name("../etc/passwd"));
        assert!(!is_stored_name("rapport-final.pdf"));
        assert!(!is_stored_name(&format!("{}.pdf/../x", "a".repeat(32))));
        assert!(!is_stored_name(&format!("{}.PDF", "a".repeat(32))));
        assert!(!is_stored_name(&format!("{}.pdf", "A".repeat(32))));
        assert!(!is_stored_name(&"a".repeat(32)));
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let store = temp_store().await;
        let bytes = fixtures::pdf();

        let stored = store.save(&bytes, &UploadPolicy::documents()).await.unwrap();
        assert_eq!(stored.detected, DetectedType::Pdf);
        assert_eq!(stored.mime_type(), "application/pdf");
        assert_eq!(stored.size, bytes.len());

        assert_eq!(store.read(&stored.stored_name).await.unwrap(), bytes);

        store.remove(&stored.stored_name).await.unwrap();
        assert!(matches!(
            store.read(&stored.stored_name).await,
            Err(StorageError::NotFound)
        ));

        // Removing twice is fine
        store.remove(&stored.stored_name).await.unwrap();

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn test_stored_name_ignores_client_input() {
        let store = temp_store().await;

        // A PNG body whose client-side name would have been "evil.php"
        let stored = store.save(&fixtures::png(), &UploadPolicy::project_images()).await.unwrap();
        assert!(stored.stored_name.ends_with(".png"));
        assert!(!stored.stored_name.contains("evil"));
        assert!(store.root().join(&stored.stored_name).exists());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let store = temp_store().await;

        let result = store.save(b"<?php system($_GET['c']);", &UploadPolicy::documents()).await;
        assert!(matches!(result, Err(StorageError::Rejected(UploadError::UnsupportedType { .. }))));

        let entries = std::fs::read_dir(store.root()).unwrap().count();
        assert_eq!(entries, 0);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn test_remove_all_logged_from_spawned_task() {
        let store = temp_store().await;
        let first = store.save(&fixtures::pdf(), &UploadPolicy::documents()).await.unwrap();
        let second = store.save(&fixtures::png(), &UploadPolicy::documents()).await.unwrap();

        let names: Vec<String> = [&first, &second]
            .iter()
            .map(|file| file.stored_name.clone())
            .chain(["../outside.pdf".to_string()])
            .collect();

        // Handlers await this inside a Send future
        let task_store = store.clone();
        tokio::spawn(async move { task_store.remove_all_logged(&names).await })
            .await
            .unwrap();

        for file in [&first, &second] {
            assert!(matches!(store.read(&file.stored_name).await, Err(StorageError::NotFound)));
        }

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn test_read_rejects_invalid_names() {
        let store = temp_store().await;

        assert!(matches!(
            store.read("../../etc/passwd").await,
            Err(StorageError::InvalidName)
        ));

        let _ = std::fs::remove_dir_all(store.root());
    }
}
