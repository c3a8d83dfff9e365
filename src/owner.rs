use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Weak back-reference to the entity owning a file: an owner kind (type
/// name) plus its id. Never an owning pointer; resolution goes through an
/// injected [`OwnerResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub id: i64,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// What the storage layer needs to know about a resolved owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerInfo {
    pub id: i64,
    /// Present when the owner entity tracks how many files it holds.
    pub file_count: Option<i64>,
}

/// Capability for resolving owner references and maintaining the optional
/// per-owner file counter. Implemented by the embedding application against
/// its own entity model.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// Look up an owner by kind and id.
    async fn find(&self, kind: &str, id: i64) -> Result<Option<OwnerInfo>, StorageError>;

    /// Bump the owner's file counter, if it has one. Called best-effort
    /// after a record is stored; failures are logged by the caller and never
    /// affect the stored record.
    async fn increment_file_count(&self, owner: &OwnerRef) -> Result<(), StorageError>;
}
