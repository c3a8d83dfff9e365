use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StorageError;

pub mod local;
pub mod memory;
pub mod null;
#[cfg(feature = "object-storage")]
pub mod s3;
pub mod webdav;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Object metadata as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub mime_type: Option<String>,
}

/// Object visibility as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// The uniform operation set every storage backend implements.
///
/// Paths are backend-relative; prefix routing happens one level up in the
/// mount manager. Implementations must be shareable across concurrent
/// callers (`Send + Sync`), either inherently or via internal
/// synchronization.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Check whether an object exists.
    async fn has(&self, path: &str) -> Result<bool, StorageError>;

    /// Retrieve all bytes of an object.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.read_stream(path).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve an object as a streaming async reader.
    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError>;

    /// Store bytes at a path, replacing any existing object.
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.write_stream(path, reader).await
    }

    /// Store data from an async reader at a path.
    async fn write_stream(&self, path: &str, reader: BoxReader) -> Result<(), StorageError>;

    /// Copy an object within this backend.
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let reader = self.read_stream(src).await?;
        self.write_stream(dst, reader).await
    }

    /// Move an object within this backend.
    async fn rename(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        self.copy(src, dst).await?;
        self.delete(src).await
    }

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Delete a directory and everything under it.
    async fn delete_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Create a directory (and any missing parents).
    async fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Fetch object metadata.
    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError>;

    /// Last-modified timestamp of an object.
    async fn timestamp(&self, path: &str) -> Result<DateTime<Utc>, StorageError> {
        let meta = self.metadata(path).await?;
        meta.last_modified
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    /// Object visibility.
    async fn visibility(&self, path: &str) -> Result<Visibility, StorageError>;
}
