use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use super::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::error::StorageError;

struct Entry {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory backend. Used by the test suite and for embedding scenarios
/// where durability does not matter; safe for concurrent callers via an
/// internal async lock.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|e| e.data.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        let data = self.read(path).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn write_stream(&self, path: &str, mut reader: BoxReader) -> Result<(), StorageError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.objects.write().await.insert(
            path.to_string(),
            Entry {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(path);
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> Result<(), StorageError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.objects
            .write()
            .await
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn create_dir(&self, _path: &str) -> Result<(), StorageError> {
        // Directories are implicit in the key space.
        Ok(())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|e| ObjectMetadata {
                size: e.data.len() as u64,
                last_modified: Some(e.modified),
                mime_type: mime_guess::from_path(path).first().map(|m| m.to_string()),
            })
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn visibility(&self, path: &str) -> Result<Visibility, StorageError> {
        if self.has(path).await? {
            Ok(Visibility::Public)
        } else {
            Err(StorageError::NotFound(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_round_trip() {
        let backend = MemoryBackend::new();
        backend.write("a/b.txt", b"bytes").await.unwrap();
        assert_eq!(backend.read("a/b.txt").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn delete_dir_drops_prefixed_keys_only() {
        let backend = MemoryBackend::new();
        backend.write("0/0/1/a.txt", b"x").await.unwrap();
        backend.write("0/0/1/thumb_a.txt", b"y").await.unwrap();
        backend.write("0/0/10/other.txt", b"z").await.unwrap();

        backend.delete_dir("0/0/1").await.unwrap();

        assert!(!backend.has("0/0/1/a.txt").await.unwrap());
        assert!(!backend.has("0/0/1/thumb_a.txt").await.unwrap());
        assert!(backend.has("0/0/10/other.txt").await.unwrap());
    }

    #[tokio::test]
    async fn metadata_tracks_size() {
        let backend = MemoryBackend::new();
        backend.write("f.bin", b"12345678").await.unwrap();
        assert_eq!(backend.metadata("f.bin").await.unwrap().size, 8);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.read("nope").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
