//! Adapter registry: maps adapter names to backend constructors.
//!
//! The table is closed: a name not present here (including names whose
//! backing feature is compiled out) fails with [`StorageError::UnknownAdapter`].
//! The `null` adapter is a deliberate entry building a no-op backend that
//! accepts writes and never stores data; configure it to disable a storage
//! target without touching the code that writes to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::local::LocalBackend;
use crate::backend::memory::MemoryBackend;
use crate::backend::null::NullBackend;
#[cfg(feature = "object-storage")]
use crate::backend::s3::{S3Backend, S3Params};
use crate::backend::webdav::{DavAuth, WebdavBackend};
use crate::backend::Backend;
use crate::config::{BackendEntry, StorageConfig};
use crate::error::StorageError;

/// The closed set of backend kinds this build can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Local,
    Memory,
    Null,
    Webdav,
    #[cfg(feature = "object-storage")]
    S3,
}

/// Registry row: adapter name, kind, and the connection parameters that must
/// be present before construction is attempted.
#[derive(Debug, Clone, Copy)]
pub struct AdapterSpec {
    pub name: &'static str,
    pub kind: AdapterKind,
    pub required: &'static [&'static str],
}

const LOCAL: AdapterSpec = AdapterSpec {
    name: "local",
    kind: AdapterKind::Local,
    required: &[],
};
const MEMORY: AdapterSpec = AdapterSpec {
    name: "memory",
    kind: AdapterKind::Memory,
    required: &[],
};
const NULL: AdapterSpec = AdapterSpec {
    name: "null",
    kind: AdapterKind::Null,
    required: &[],
};
const WEBDAV: AdapterSpec = AdapterSpec {
    name: "webdav",
    kind: AdapterKind::Webdav,
    required: &["endpoint"],
};
#[cfg(feature = "object-storage")]
const S3: AdapterSpec = AdapterSpec {
    name: "s3",
    kind: AdapterKind::S3,
    required: &["bucket", "region"],
};

/// Look up an adapter by name.
pub fn adapter_spec(name: &str) -> Option<&'static AdapterSpec> {
    match name {
        "local" => Some(&LOCAL),
        "memory" => Some(&MEMORY),
        "null" => Some(&NULL),
        "webdav" => Some(&WEBDAV),
        #[cfg(feature = "object-storage")]
        "s3" => Some(&S3),
        _ => None,
    }
}

/// Validate an entry's configuration and construct a live backend.
///
/// Required-key validation runs before any construction side effect; client
/// construction failures surface as [`StorageError::BackendConnection`].
pub async fn resolve(
    entry: &BackendEntry,
    defaults: &StorageConfig,
) -> Result<Arc<dyn Backend>, StorageError> {
    let spec = adapter_spec(&entry.adapter)
        .ok_or_else(|| StorageError::UnknownAdapter(entry.adapter.clone()))?;

    for key in spec.required.iter().copied() {
        if !entry.params.contains_key(key) {
            return Err(StorageError::MissingConfiguration {
                adapter: spec.name,
                key,
            });
        }
    }

    match spec.kind {
        AdapterKind::Local => {
            let root = match entry.params.get("root") {
                Some(root) if Path::new(root).is_absolute() => PathBuf::from(root),
                Some(root) => PathBuf::from(&defaults.base_path).join(root),
                None => PathBuf::from(&defaults.base_path),
            };
            Ok(Arc::new(LocalBackend::new(root).await?))
        }
        AdapterKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        AdapterKind::Null => Ok(Arc::new(NullBackend)),
        AdapterKind::Webdav => {
            let endpoint = &entry.params["endpoint"];
            let auth = match (
                entry.params.get("username"),
                entry.params.get("password"),
                entry.params.get("token"),
            ) {
                (_, _, Some(token)) => DavAuth::Bearer(token.clone()),
                (Some(username), Some(password), None) => DavAuth::Basic {
                    username: username.clone(),
                    password: password.clone(),
                },
                _ => return Err(StorageError::MissingCredentials("webdav")),
            };
            Ok(Arc::new(WebdavBackend::new(endpoint, auth)?))
        }
        #[cfg(feature = "object-storage")]
        AdapterKind::S3 => {
            let params = S3Params {
                bucket: entry.params["bucket"].clone(),
                region: entry.params["region"].clone(),
                endpoint: entry.params.get("endpoint").cloned(),
                access_key: entry.params.get("access_key").cloned(),
                secret_key: entry.params.get("secret_key").cloned(),
                path_style: entry
                    .params
                    .get("path_style")
                    .is_some_and(|v| v == "true" || v == "1"),
            };
            Ok(Arc::new(S3Backend::new(params)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> StorageConfig {
        StorageConfig::local_only("/tmp/stowage-test-base", "/files")
    }

    async fn resolve_err(entry: &BackendEntry, defaults: &StorageConfig) -> StorageError {
        match resolve(entry, defaults).await {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        }
    }

    #[tokio::test]
    async fn unknown_adapter_is_rejected() {
        let entry = BackendEntry::new("gopherfs");
        let err = resolve_err(&entry, &defaults()).await;
        match err {
            StorageError::UnknownAdapter(name) => assert_eq!(name, "gopherfs"),
            other => panic!("expected UnknownAdapter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_key_names_the_key() {
        let entry = BackendEntry::new("webdav");
        let err = resolve_err(&entry, &defaults()).await;
        match err {
            StorageError::MissingConfiguration { adapter, key } => {
                assert_eq!(adapter, "webdav");
                assert_eq!(key, "endpoint");
            }
            other => panic!("expected MissingConfiguration, got {other:?}"),
        }
        assert!(format!("{err}").contains("endpoint"));
    }

    #[tokio::test]
    async fn webdav_requires_password_or_token() {
        let entry = BackendEntry::new("webdav").with_param("endpoint", "https://dav.example.com");
        let err = resolve_err(&entry, &defaults()).await;
        assert!(matches!(err, StorageError::MissingCredentials("webdav")));
    }

    #[tokio::test]
    async fn webdav_accepts_token_credentials() {
        let entry = BackendEntry::new("webdav")
            .with_param("endpoint", "https://dav.example.com")
            .with_param("token", "secret");
        assert!(resolve(&entry, &defaults()).await.is_ok());
    }

    #[tokio::test]
    async fn webdav_accepts_basic_credentials() {
        let entry = BackendEntry::new("webdav")
            .with_param("endpoint", "https://dav.example.com")
            .with_param("username", "u")
            .with_param("password", "p");
        assert!(resolve(&entry, &defaults()).await.is_ok());
    }

    #[tokio::test]
    async fn null_adapter_builds_a_noop_backend() {
        let entry = BackendEntry::new("null");
        let backend = resolve(&entry, &defaults()).await.unwrap();
        backend.write("x", b"data").await.unwrap();
        assert!(!backend.has("x").await.unwrap());
    }

    #[tokio::test]
    async fn local_root_resolves_relative_to_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let defaults =
            StorageConfig::local_only(dir.path().to_string_lossy().to_string(), "/files");
        let entry = BackendEntry::new("local").with_param("root", "nested");
        resolve(&entry, &defaults).await.unwrap();
        assert!(dir.path().join("nested").is_dir());
    }

    #[cfg(feature = "object-storage")]
    #[tokio::test]
    async fn s3_missing_bucket_names_the_key() {
        let entry = BackendEntry::new("s3").with_param("region", "us-east-1");
        let err = resolve_err(&entry, &defaults()).await;
        assert!(matches!(
            err,
            StorageError::MissingConfiguration {
                adapter: "s3",
                key: "bucket"
            }
        ));
    }
}
