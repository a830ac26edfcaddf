//! On-disk store for uploaded files.
//!
//! Uploads are streamed into a temporary file under `<root>/.tmp`, counted
//! against the size limit as they arrive, and renamed into
//! `<root>/<user_id>/<generated name>` once the request has been validated.
//! An upload that is dropped before it is persisted removes its temp file.

use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Longest sanitized original file name
const MAX_FILE_NAME_LEN: usize = 120;

/// Longest extension kept on generated names, dot included
const MAX_EXTENSION_LEN: usize = 16;

/// Name used when nothing of the original survives sanitizing
const DEFAULT_FILE_NAME: &str = "file";

const TEMP_DIR: &str = ".tmp";

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File exceeds maximum allowed size of {0} bytes")]
    TooLarge(u64),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to move upload into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`, cap the
/// length and fall back to "file" for an empty result.
pub fn sanitize_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();

    if safe.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        safe
    }
}

/// Extension of a sanitized name including the dot, truncated to 16
/// characters. Dotfiles without a further dot have no extension.
pub fn file_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].chars().take(MAX_EXTENSION_LEN).collect(),
        _ => String::new(),
    }
}

/// MIME type of an upload: the declared content type, else a guess from
/// the file name, else `application/octet-stream`.
pub fn resolve_mime_type(declared: Option<&str>, file_name: &str) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
        return declared.to_string();
    }
    mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

/// Root directory holding every user's uploads
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    max_bytes: u64,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Absolute location of a recorded storage path
    pub fn resolve(&self, storage_path: &str) -> PathBuf {
        self.root.join(storage_path)
    }

    /// Start receiving an upload into a fresh temp file
    pub async fn begin_upload(&self) -> Result<PendingUpload, StorageError> {
        let temp_dir = self.root.join(TEMP_DIR);
        tokio::fs::create_dir_all(&temp_dir).await?;

        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&temp_dir)?;
        let file = tokio::fs::File::from_std(temp.reopen()?);

        Ok(PendingUpload {
            temp,
            file,
            size: 0,
            limit: self.max_bytes,
        })
    }
}

/// An upload being written to its temp file
#[derive(Debug)]
pub struct PendingUpload {
    temp: NamedTempFile,
    file: tokio::fs::File,
    size: u64,
    limit: u64,
}

impl PendingUpload {
    /// Append a chunk, failing once the total passes the size limit
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.size += chunk.len() as u64;
        if self.size > self.limit {
            return Err(StorageError::TooLarge(self.limit));
        }
        self.file.write_all(chunk).await?;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Flush and move the file to `<root>/<user_id>/<file_name>`.
    /// Returns the path relative to the store root.
    pub async fn persist(
        mut self,
        store: &FileStore,
        user_id: &str,
        file_name: &str,
    ) -> Result<String, StorageError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        let user_dir = store.root.join(user_id);
        tokio::fs::create_dir_all(&user_dir).await?;

        let dest = user_dir.join(file_name);
        let temp = self.temp;
        tokio::task::spawn_blocking(move || temp.persist(dest))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(format!("{}/{}", user_id, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("invoice 2024.pdf"), "invoice_2024.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("résumé.docx"), "r_sum_.docx");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(&"a".repeat(200)).len(), 120);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("scan.pdf"), ".pdf");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(".bashrc"), "");
        assert_eq!(file_extension("x.abcdefghijklmnopqrstu"), ".abcdefghijklmno");
    }

    #[test]
    fn test_resolve_mime_type() {
        assert_eq!(resolve_mime_type(Some("image/png"), "x.pdf"), "image/png");
        assert_eq!(resolve_mime_type(None, "x.pdf"), "application/pdf");
        assert_eq!(resolve_mime_type(Some(" "), "noext"), DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_upload_is_persisted_under_user_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), 1024);

        let mut upload = store.begin_upload().await.unwrap();
        upload.write(b"hello ").await.unwrap();
        upload.write(b"world").await.unwrap();
        assert_eq!(upload.size(), 11);

        let path = upload.persist(&store, "user-1", "abc.txt").await.unwrap();
        assert_eq!(path, "user-1/abc.txt");
        let content = std::fs::read_to_string(store.resolve(&path)).unwrap();
        assert_eq!(content, "hello world");

        let leftovers = std::fs::read_dir(dir.path().join(TEMP_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), 8);
        assert_eq!(store.max_bytes(), 8);

        let mut upload = store.begin_upload().await.unwrap();
        upload.write(b"12345678").await.unwrap();
        let err = upload.write(b"9").await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge(8)));

        drop(upload);
        let leftovers = std::fs::read_dir(dir.path().join(TEMP_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
