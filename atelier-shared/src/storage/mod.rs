/// Upload validation and on-disk file storage
///
/// # Modules
///
/// - [`mime`]: content type detection from magic bytes
/// - [`store`]: upload policies and the flat-directory [`FileStore`]
///
/// # Example
///
/// ```no_run
/// use atelier_shared::storage::{FileStore, UploadPolicy};
///
/// # async fn example(upload: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileStore::open("./var/documents").await?;
/// let stored = store.save(&upload, &UploadPolicy::documents()).await?;
/// println!("stored as {} ({})", stored.stored_name, stored.mime_type());
/// # Ok(())
/// # }
/// ```

pub mod mime;
pub mod store;

pub use mime::{sniff, DetectedType};
pub use store::{FileStore, StorageError, StoredFile, UploadError, UploadPolicy};
