use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::error::StorageError;

/// Connection parameters for an S3-compatible object store.
pub struct S3Params {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint: Option<String>,
    /// Static credentials; falls back to the environment chain when unset.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Path-style addressing, required by most self-hosted services.
    pub path_style: bool,
}

/// S3-compatible backend. Objects are flat keys; directory operations map to
/// key-prefix operations.
pub struct S3Backend {
    bucket: Box<Bucket>,
}

impl S3Backend {
    /// Build a bucket handle. Fails with `BackendConnection` when the region
    /// or credentials cannot be resolved.
    pub fn new(params: S3Params) -> Result<Self, StorageError> {
        fn connection_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StorageError {
            StorageError::BackendConnection {
                adapter: "s3",
                source: Box::new(e),
            }
        }

        let region = match params.endpoint {
            Some(endpoint) => Region::Custom {
                region: params.region,
                endpoint,
            },
            None => params.region.parse().map_err(connection_err)?,
        };

        let credentials = match (params.access_key, params.secret_key) {
            (Some(access), Some(secret)) => {
                Credentials::new(Some(&access), Some(&secret), None, None, None)
                    .map_err(connection_err)?
            }
            _ => Credentials::default().map_err(connection_err)?,
        };

        let mut bucket = Bucket::new(&params.bucket, region, credentials).map_err(connection_err)?;
        if params.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }

    fn op_err(op: &'static str, path: &str, e: S3Error) -> StorageError {
        StorageError::backend_op(op, path, e)
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(path).await {
            Ok((_, 200)) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) => Err(StorageError::backend_op(
                "head",
                path,
                std::io::Error::other(format!("unexpected status {code}")),
            )),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(Self::op_err("head", path, e)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        match self.bucket.get_object(path).await {
            Ok(resp) => Ok(resp.bytes().to_vec()),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(Self::op_err("get", path, e)),
        }
    }

    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        let data = self.read(path).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn write_stream(&self, path: &str, mut reader: BoxReader) -> Result<(), StorageError> {
        self.bucket
            .put_object_stream(&mut reader, path)
            .await
            .map_err(|e| Self::op_err("put", path, e))?;
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        self.bucket
            .copy_object_internal(src, dst)
            .await
            .map_err(|e| Self::op_err("copy", src, e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match self.bucket.delete_object(path).await {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(Self::op_err("delete", path, e)),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<(), StorageError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let pages = self
            .bucket
            .list(prefix.clone(), None)
            .await
            .map_err(|e| Self::op_err("list", path, e))?;

        for page in pages {
            for object in page.contents {
                self.bucket
                    .delete_object(&object.key)
                    .await
                    .map_err(|e| Self::op_err("delete_dir", path, e))?;
            }
        }
        Ok(())
    }

    async fn create_dir(&self, _path: &str) -> Result<(), StorageError> {
        // Directories are implicit in the key space.
        Ok(())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let (head, code) = match self.bucket.head_object(path).await {
            Ok(result) => result,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(path.to_string()));
            }
            Err(e) => return Err(Self::op_err("head", path, e)),
        };
        if code == 404 {
            return Err(StorageError::NotFound(path.to_string()));
        }

        Ok(ObjectMetadata {
            size: head.content_length.unwrap_or(0).max(0) as u64,
            last_modified: head
                .last_modified
                .as_deref()
                .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            mime_type: head.content_type,
        })
    }

    async fn visibility(&self, _path: &str) -> Result<Visibility, StorageError> {
        // Per-object ACL lookups are not part of the uniform operation set.
        Ok(Visibility::Private)
    }
}
