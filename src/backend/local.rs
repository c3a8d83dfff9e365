use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::BufReader;

use super::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::error::StorageError;
use crate::path::contains_path_traversal;

/// Local-disk backend rooted at a base directory.
///
/// Writes go through a temp file in `{root}/.tmp` followed by a rename, so a
/// crash mid-write never leaves a partial object at its final path.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend, creating the root and temp directories.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    fn full(&self, path: &str) -> Result<PathBuf, StorageError> {
        if contains_path_traversal(path) || path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root.join(".tmp").join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.full(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        let full = self.full(path)?;
        match fs::File::open(&full).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_stream(&self, path: &str, mut reader: BoxReader) -> Result<(), StorageError> {
        let full = self.full(path)?;
        let temp_path = self.temp_path();

        let mut temp_file = fs::File::create(&temp_path).await?;
        if let Err(e) = tokio::io::copy(&mut reader, &mut temp_file).await {
            drop(temp_file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        drop(temp_file);

        if let Some(parent) = full.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        }

        if let Err(e) = fs::rename(&temp_path, &full).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let src_full = self.full(src)?;
        let dst_full = self.full(dst)?;
        if let Some(parent) = dst_full.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::copy(&src_full, &dst_full).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(src.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let src_full = self.full(src)?;
        let dst_full = self.full(dst)?;
        if let Some(parent) = dst_full.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::rename(&src_full, &dst_full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(src.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full(path)?;
        match fs::remove_dir_all(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full(path)?;
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let full = self.full(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(ObjectMetadata {
                size: meta.len(),
                last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                mime_type: mime_guess::from_path(path).first().map(|m| m.to_string()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn visibility(&self, path: &str) -> Result<Visibility, StorageError> {
        let full = self.full(path)?;
        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o004 != 0 {
                Ok(Visibility::Public)
            } else {
                Ok(Visibility::Private)
            }
        }
        #[cfg(not(unix))]
        {
            let _ = meta;
            Ok(Visibility::Public)
        }
    }
}
