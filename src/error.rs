use thiserror::Error;

/// Errors surfaced by the storage layer.
///
/// Configuration and adapter-resolution variants (`UnknownAdapter`,
/// `MissingConfiguration`, `MissingCredentials`, `BackendConnection`) are
/// raised while mounts are being built and should be treated as fatal
/// deployment errors. The remaining variants occur at runtime.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The adapter name is not present in the registry table.
    #[error("unknown adapter \"{0}\"")]
    UnknownAdapter(String),

    /// A required connection parameter is missing for an adapter.
    #[error("adapter \"{adapter}\" requires the \"{key}\" parameter")]
    MissingConfiguration { adapter: &'static str, key: &'static str },

    /// An adapter needs one of several alternative credentials and got none.
    #[error("adapter \"{0}\" requires either a password or a token")]
    MissingCredentials(&'static str),

    /// The underlying client could not be constructed.
    #[error("failed to connect \"{adapter}\" backend")]
    BackendConnection {
        adapter: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A prefixed path names a backend that is not configured.
    #[error("unknown backend \"{0}\"")]
    UnknownBackend(String),

    /// A backend operation failed; carries the underlying cause.
    #[error("backend {op} failed for \"{path}\"")]
    BackendOperation {
        op: &'static str,
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The requested object does not exist on the backend.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A path could not be routed (no `name://` prefix, or traversal).
    #[error("invalid path \"{0}\"")]
    InvalidPath(String),

    /// The record store rejected an insert, update or delete.
    #[error("record persistence failed: {0}")]
    RecordPersistence(String),

    /// The upload descriptor was flagged erroneous by the caller.
    #[error("upload was flagged as erroneous")]
    RejectedUpload,

    /// The original filename failed validation.
    #[error("invalid filename: {0}")]
    InvalidFilename(&'static str),

    /// The store pipeline failed after the provisional record was created;
    /// the record has been cleaned up and the cause is attached.
    #[error("store pipeline failed")]
    Store {
        #[source]
        source: Box<StorageError>,
    },

    /// A variant handler or artifact write failed. Callers of the variant
    /// pipeline observe this only as a `false` outcome, never as an error.
    #[error("variant generation failed: {0}")]
    Variant(String),

    /// An I/O error outside any backend (temp files, upload staging).
    #[error("storage IO error")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Wrap an arbitrary backend client error into `BackendOperation`.
    pub(crate) fn backend_op<E>(op: &'static str, path: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::BackendOperation {
            op,
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure from steps that run after the provisional record
    /// exists, preserving the cause chain.
    pub(crate) fn store(source: StorageError) -> Self {
        Self::Store {
            source: Box::new(source),
        }
    }
}
