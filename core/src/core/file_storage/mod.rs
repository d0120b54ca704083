use std::path::{Path, PathBuf};

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum FileStorageError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Invalid attachment id: {0:?}")]
        InvalidAttachmentId(String),
    }
}

use error::FileStorageError;

/// Attachment payloads, one directory per record:
/// `<blobs_path>/<record hash>/<attachment id>.bin`.
///
/// Bytes are written as given; encryption happens in the caller.
pub struct FileStorage {
    pub blobs_path: PathBuf,
}

const BLOB_EXTENSION: &str = "bin";

fn remove_dir_if_empty(path: &Path) -> Result<(), FileStorageError> {
    if path.exists() && path.read_dir()?.next().is_none() {
        std::fs::remove_dir(path)?;
    }
    Ok(())
}

/// Attachment ids become file names, so only plain names are accepted.
pub(crate) fn check_attachment_id(attachment_id: &str) -> Result<(), FileStorageError> {
    let valid = !attachment_id.is_empty()
        && attachment_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FileStorageError::InvalidAttachmentId(attachment_id.to_string()))
    }
}

/// Attachment file operations.
impl FileStorage {
    pub fn attachment_path(&self, record_hash: &Path, attachment_id: &str) -> PathBuf {
        self.blobs_path
            .join(record_hash)
            .join(attachment_id)
            .with_extension(BLOB_EXTENSION)
    }

    /// Writes the payload, replacing any previous file with the same id.
    pub fn write_attachment(
        &self,
        record_hash: &Path,
        attachment_id: &str,
        bytes: &[u8],
    ) -> Result<(), FileStorageError> {
        check_attachment_id(attachment_id)?;

        let dest_dir = self.blobs_path.join(record_hash);
        std::fs::create_dir_all(&dest_dir)?;

        std::fs::write(self.attachment_path(record_hash, attachment_id), bytes)?;
        Ok(())
    }

    /// Returns `None` if no payload file exists.
    pub fn read_attachment(
        &self,
        record_hash: &Path,
        attachment_id: &str,
    ) -> Result<Option<Vec<u8>>, FileStorageError> {
        check_attachment_id(attachment_id)?;

        match std::fs::read(self.attachment_path(record_hash, attachment_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove_attachment(
        &self,
        record_hash: &Path,
        attachment_id: &str,
    ) -> Result<(), FileStorageError> {
        check_attachment_id(attachment_id)?;

        let file_path = self.attachment_path(record_hash, attachment_id);
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
        }

        // Clean up empty record directory
        remove_dir_if_empty(&self.blobs_path.join(record_hash))?;

        Ok(())
    }
}

/// Cleanup operations.
impl FileStorage {
    pub fn remove_all(&self, record_hash: &Path) -> Result<(), FileStorageError> {
        let record_dir = self.blobs_path.join(record_hash);
        if record_dir.exists() {
            std::fs::remove_dir_all(&record_dir)?;
        }
        Ok(())
    }

    pub fn list_blob_key_hashes(&self) -> Result<Vec<PathBuf>, FileStorageError> {
        if !self.blobs_path.exists() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.blobs_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir()
                && let Some(name) = path.file_name()
            {
                dirs.push(PathBuf::from(name));
            }
        }

        Ok(dirs)
    }
}
