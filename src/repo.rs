use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::record::{FileRecord, NewFileRecord};

/// Persistence contract for file records. Implementations must assign
/// unique ids under concurrent inserts; every failure maps to
/// [`StorageError::RecordPersistence`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a provisional record (no path, no hash) and return it with its
    /// assigned id and creation timestamp.
    async fn insert(&self, new: NewFileRecord) -> Result<FileRecord, StorageError>;

    /// Finalize `hash` and `path` after a successful backend write.
    async fn update_stored(
        &self,
        id: i64,
        hash: &ContentHash,
        path: &str,
    ) -> Result<(), StorageError>;

    /// Persist the variant-tag set.
    async fn update_variants(
        &self,
        id: i64,
        variants: &BTreeSet<String>,
    ) -> Result<(), StorageError>;

    /// Remove a record.
    async fn delete(&self, id: i64) -> Result<(), StorageError>;

    /// Fetch a record by id.
    async fn find(&self, id: i64) -> Result<Option<FileRecord>, StorageError>;
}

/// In-memory record store with a process-local id allocator. Backs the test
/// suite and embedders that keep record metadata outside a database.
pub struct MemoryRecordStore {
    records: Mutex<HashMap<i64, FileRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_record<T>(
        &self,
        id: i64,
        f: impl FnOnce(&mut FileRecord) -> T,
    ) -> Result<T, StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::RecordPersistence("record store lock poisoned".into()))?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StorageError::RecordPersistence(format!("no record with id {id}")))?;
        Ok(f(record))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, new: NewFileRecord) -> Result<FileRecord, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = FileRecord {
            id,
            backend: new.backend,
            path: String::new(),
            extension: new.extension,
            mime_type: new.mime_type,
            size: new.size,
            hash: None,
            variants: BTreeSet::new(),
            owner: new.owner,
            expired_at: new.expired_at,
            created_at: Utc::now(),
        };
        self.records
            .lock()
            .map_err(|_| StorageError::RecordPersistence("record store lock poisoned".into()))?
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update_stored(
        &self,
        id: i64,
        hash: &ContentHash,
        path: &str,
    ) -> Result<(), StorageError> {
        self.with_record(id, |record| {
            record.hash = Some(*hash);
            record.path = path.to_string();
        })
    }

    async fn update_variants(
        &self,
        id: i64,
        variants: &BTreeSet<String>,
    ) -> Result<(), StorageError> {
        self.with_record(id, |record| {
            record.variants = variants.clone();
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::RecordPersistence("record store lock poisoned".into()))?
            .remove(&id);
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Option<FileRecord>, StorageError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| StorageError::RecordPersistence("record store lock poisoned".into()))?
            .get(&id)
            .cloned())
    }
}
