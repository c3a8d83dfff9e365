use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::backend::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::registry;

/// Routes prefixed paths of the form `backend://relative/path` to the
/// configured backend connections.
///
/// Built once at startup; any registry error during construction is surfaced
/// immediately as a deployment misconfiguration. Holds one shared connection
/// per backend name; connections are `Send + Sync` and shared across callers.
pub struct MountManager {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl MountManager {
    /// Build every configured backend through the adapter registry.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let mut backends = HashMap::new();
        for (name, entry) in &config.backends {
            let backend = registry::resolve(entry, config).await?;
            info!(backend = %name, adapter = %entry.adapter, "mounted storage backend");
            backends.insert(name.clone(), backend);
        }
        Ok(Self { backends })
    }

    /// Mount a backend under a name directly, bypassing the registry. Mainly
    /// useful for tests and custom [`Backend`] implementations.
    pub fn mount(&mut self, name: impl Into<String>, backend: Arc<dyn Backend>) {
        self.backends.insert(name.into(), backend);
    }

    /// An empty manager with no mounts.
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn has_backend(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Split `backend://relative` and resolve the backend connection.
    fn route<'p>(&self, path: &'p str) -> Result<(&Arc<dyn Backend>, &'p str), StorageError> {
        let (name, rel) = split_prefix(path)?;
        let backend = self
            .backends
            .get(name)
            .ok_or_else(|| StorageError::UnknownBackend(name.to_string()))?;
        Ok((backend, rel))
    }

    pub async fn has(&self, path: &str) -> Result<bool, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.has(rel).await
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.read(rel).await
    }

    pub async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.read_stream(rel).await
    }

    pub async fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.write(rel, data).await
    }

    pub async fn write_stream(&self, path: &str, reader: BoxReader) -> Result<(), StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.write_stream(rel, reader).await
    }

    /// Copy between prefixed paths. Same-backend copies delegate natively;
    /// cross-backend copies pipe a read stream into a write.
    pub async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let (src_name, src_rel) = split_prefix(src)?;
        let (dst_name, dst_rel) = split_prefix(dst)?;

        if src_name == dst_name {
            let (backend, _) = self.route(src)?;
            return backend.copy(src_rel, dst_rel).await;
        }

        let reader = self.read_stream(src).await?;
        let (dst_backend, _) = self.route(dst)?;
        dst_backend.write_stream(dst_rel, reader).await
    }

    /// Move between prefixed paths; cross-backend moves are copy-then-delete.
    pub async fn rename(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let (src_name, src_rel) = split_prefix(src)?;
        let (dst_name, dst_rel) = split_prefix(dst)?;

        if src_name == dst_name {
            let (backend, _) = self.route(src)?;
            return backend.rename(src_rel, dst_rel).await;
        }

        self.copy(src, dst).await?;
        let (src_backend, _) = self.route(src)?;
        src_backend.delete(src_rel).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.delete(rel).await
    }

    pub async fn delete_dir(&self, path: &str) -> Result<(), StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.delete_dir(rel).await
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.create_dir(rel).await
    }

    pub async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.metadata(rel).await
    }

    pub async fn timestamp(&self, path: &str) -> Result<DateTime<Utc>, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.timestamp(rel).await
    }

    pub async fn visibility(&self, path: &str) -> Result<Visibility, StorageError> {
        let (backend, rel) = self.route(path)?;
        backend.visibility(rel).await
    }
}

/// Split a prefixed path on its first `://`.
fn split_prefix(path: &str) -> Result<(&str, &str), StorageError> {
    match path.split_once("://") {
        Some((name, rel)) if !name.is_empty() => Ok((name, rel)),
        _ => Err(StorageError::InvalidPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn two_mounts() -> MountManager {
        let mut mounts = MountManager::empty();
        mounts.mount("hot", Arc::new(MemoryBackend::new()));
        mounts.mount("cold", Arc::new(MemoryBackend::new()));
        mounts
    }

    #[test]
    fn split_prefix_takes_first_separator() {
        assert_eq!(split_prefix("hot://a/b.txt").unwrap(), ("hot", "a/b.txt"));
        assert_eq!(
            split_prefix("hot://dir/weird://name").unwrap(),
            ("hot", "dir/weird://name")
        );
        assert!(matches!(
            split_prefix("no-prefix.txt"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            split_prefix("://rel"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn routes_to_the_named_backend() {
        let mounts = two_mounts();
        mounts.write("hot://a.txt", b"hot data").await.unwrap();

        assert!(mounts.has("hot://a.txt").await.unwrap());
        assert!(!mounts.has("cold://a.txt").await.unwrap());
        assert_eq!(mounts.read("hot://a.txt").await.unwrap(), b"hot data");
    }

    #[tokio::test]
    async fn unknown_backend_fails() {
        let mounts = two_mounts();
        assert!(matches!(
            mounts.read("warm://a.txt").await,
            Err(StorageError::UnknownBackend(name)) if name == "warm"
        ));
    }

    #[tokio::test]
    async fn cross_backend_copy_materializes_bytes() {
        let mounts = two_mounts();
        mounts.write("hot://src.txt", b"payload").await.unwrap();

        mounts.copy("hot://src.txt", "cold://dst.txt").await.unwrap();

        assert_eq!(mounts.read("cold://dst.txt").await.unwrap(), b"payload");
        assert!(mounts.has("hot://src.txt").await.unwrap());
    }

    #[tokio::test]
    async fn cross_backend_rename_removes_source() {
        let mounts = two_mounts();
        mounts.write("hot://src.txt", b"payload").await.unwrap();

        mounts.rename("hot://src.txt", "cold://dst.txt").await.unwrap();

        assert_eq!(mounts.read("cold://dst.txt").await.unwrap(), b"payload");
        assert!(!mounts.has("hot://src.txt").await.unwrap());
    }

    #[tokio::test]
    async fn same_backend_rename_removes_source() {
        let mounts = two_mounts();
        mounts.write("hot://a/src.txt", b"payload").await.unwrap();

        mounts.rename("hot://a/src.txt", "hot://b/dst.txt").await.unwrap();

        assert!(!mounts.has("hot://a/src.txt").await.unwrap());
        assert_eq!(mounts.read("hot://b/dst.txt").await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn from_config_builds_configured_mounts() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::StorageConfig::local_only(
            dir.path().to_string_lossy().to_string(),
            "/files",
        )
        .with_backend("scratch", crate::config::BackendEntry::new("memory"));

        let mounts = MountManager::from_config(&config).await.unwrap();
        assert!(mounts.has_backend("local"));
        assert!(mounts.has_backend("scratch"));
        assert!(!mounts.has_backend("other"));
    }
}
