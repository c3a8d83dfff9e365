use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode, header};
use tokio::io::AsyncReadExt;

use super::{Backend, BoxReader, ObjectMetadata, Visibility};
use crate::error::StorageError;

/// Credentials for a WebDAV endpoint.
pub enum DavAuth {
    Basic { username: String, password: String },
    Bearer(String),
}

/// WebDAV backend speaking the HTTP verb set (GET/PUT/DELETE/MKCOL/COPY/MOVE)
/// against a remote collection.
pub struct WebdavBackend {
    client: Client,
    endpoint: String,
    auth: DavAuth,
    mkcol: Method,
    dav_copy: Method,
    dav_move: Method,
}

impl WebdavBackend {
    /// Build a client for the given endpoint. Fails with
    /// `BackendConnection` when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: &str, auth: DavAuth) -> Result<Self, StorageError> {
        fn connection_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StorageError {
            StorageError::BackendConnection {
                adapter: "webdav",
                source: Box::new(e),
            }
        }

        let client = Client::builder().build().map_err(connection_err)?;
        let mkcol = Method::from_bytes(b"MKCOL").map_err(connection_err)?;
        let dav_copy = Method::from_bytes(b"COPY").map_err(connection_err)?;
        let dav_move = Method::from_bytes(b"MOVE").map_err(connection_err)?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
            mkcol,
            dav_copy,
            dav_move,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match &self.auth {
            DavAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            DavAuth::Bearer(token) => req.bearer_auth(token),
        }
    }

    async fn send(
        &self,
        op: &'static str,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StorageError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StorageError::backend_op(op, path, e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !resp.status().is_success() {
            return Err(StorageError::backend_op(
                op,
                path,
                std::io::Error::other(format!("unexpected status {}", resp.status())),
            ));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Backend for WebdavBackend {
    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        match self
            .send("head", path, self.request(Method::HEAD, &self.url(path)))
            .await
        {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .send("get", path, self.request(Method::GET, &self.url(path)))
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::backend_op("get", path, e))?;
        Ok(bytes.to_vec())
    }

    async fn read_stream(&self, path: &str) -> Result<BoxReader, StorageError> {
        let data = self.read(path).await?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn write_stream(&self, path: &str, mut reader: BoxReader) -> Result<(), StorageError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.send(
            "put",
            path,
            self.request(Method::PUT, &self.url(path)).body(data),
        )
        .await?;
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        self.send(
            "copy",
            src,
            self.request(self.dav_copy.clone(), &self.url(src))
                .header("Destination", self.url(dst))
                .header("Overwrite", "T"),
        )
        .await?;
        Ok(())
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        self.send(
            "move",
            src,
            self.request(self.dav_move.clone(), &self.url(src))
                .header("Destination", self.url(dst))
                .header("Overwrite", "T"),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match self
            .send("delete", path, self.request(Method::DELETE, &self.url(path)))
            .await
        {
            Ok(_) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<(), StorageError> {
        // DAV DELETE on a collection removes it recursively.
        let url = format!("{}/", self.url(path.trim_end_matches('/')));
        match self
            .send("delete_dir", path, self.request(Method::DELETE, &url))
            .await
        {
            Ok(_) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let mut built = String::new();
        for segment in path.trim_matches('/').split('/').filter(|s| !s.is_empty()) {
            if !built.is_empty() {
                built.push('/');
            }
            built.push_str(segment);
            let url = format!("{}/", self.url(&built));
            let resp = self
                .request(self.mkcol.clone(), &url)
                .send()
                .await
                .map_err(|e| StorageError::backend_op("mkcol", path, e))?;
            // 405 means the collection already exists.
            if !resp.status().is_success() && resp.status() != StatusCode::METHOD_NOT_ALLOWED {
                return Err(StorageError::backend_op(
                    "mkcol",
                    path,
                    std::io::Error::other(format!("unexpected status {}", resp.status())),
                ));
            }
        }
        Ok(())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let resp = self
            .send("head", path, self.request(Method::HEAD, &self.url(path)))
            .await?;
        let headers = resp.headers();

        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let mime_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(ObjectMetadata {
            size,
            last_modified,
            mime_type,
        })
    }

    async fn visibility(&self, _path: &str) -> Result<Visibility, StorageError> {
        // No cheap ACL probe over plain DAV.
        Ok(Visibility::Private)
    }
}
