use async_trait::async_trait;

use super::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::error::StorageError;

/// No-op backend for deliberately disabled mounts.
///
/// Accepts and discards every write; reports nothing as stored. Configuring
/// a backend with the `null` adapter lets deployments turn a storage target
/// off without touching the code paths that write to it.
pub struct NullBackend;

#[async_trait]
impl Backend for NullBackend {
    async fn has(&self, _path: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn write_stream(&self, _path: &str, mut reader: BoxReader) -> Result<(), StorageError> {
        // Drain so upstream pipes complete normally.
        let mut sink = tokio::io::sink();
        tokio::io::copy(&mut reader, &mut sink).await?;
        Ok(())
    }

    async fn delete(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete_dir(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn create_dir(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn visibility(&self, path: &str) -> Result<Visibility, StorageError> {
        Err(StorageError::NotFound(path.to_string()))
    }
}
