//! sea-orm persistence for file records (feature `sea-orm`).

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, NotSet, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::owner::OwnerRef;
use crate::record::{FileRecord, NewFileRecord};
use crate::repo::RecordStore;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Backend owning the physical bytes.
    pub backend: String,

    /// Backend-relative path; empty while the record is provisional.
    pub path: String,

    pub extension: String,

    /// Comma-joined variant tags.
    pub variants: String,

    pub mime_type: String,

    pub size: i64,

    /// 32-char hex MD5; set once the backend write has succeeded.
    #[sea_orm(indexed)]
    pub hash: Option<String>,

    #[sea_orm(indexed)]
    pub owner_type: Option<String>,

    #[sea_orm(indexed)]
    pub owner_id: Option<i64>,

    pub expired_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

fn persistence_err(e: DbErr) -> StorageError {
    StorageError::RecordPersistence(e.to_string())
}

fn record_from(model: Model) -> Result<FileRecord, StorageError> {
    let hash = model.hash.as_deref().map(ContentHash::from_hex).transpose()?;
    let owner = match (model.owner_type, model.owner_id) {
        (Some(kind), Some(id)) => Some(OwnerRef { kind, id }),
        _ => None,
    };

    Ok(FileRecord {
        id: model.id,
        backend: model.backend,
        path: model.path,
        extension: model.extension,
        mime_type: model.mime_type,
        size: model.size,
        hash,
        variants: FileRecord::variants_from_joined(&model.variants),
        owner,
        expired_at: model.expired_at,
        created_at: model.created_at,
    })
}

/// Record store backed by a relational database through sea-orm.
pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn insert(&self, new: NewFileRecord) -> Result<FileRecord, StorageError> {
        let (owner_type, owner_id) = match new.owner {
            Some(owner) => (Set(Some(owner.kind)), Set(Some(owner.id))),
            None => (Set(None), Set(None)),
        };

        let model = ActiveModel {
            id: NotSet,
            backend: Set(new.backend),
            path: Set(String::new()),
            extension: Set(new.extension),
            variants: Set(String::new()),
            mime_type: Set(new.mime_type),
            size: Set(new.size),
            hash: Set(None),
            owner_type,
            owner_id,
            expired_at: Set(new.expired_at),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(persistence_err)?;

        record_from(model)
    }

    async fn update_stored(
        &self,
        id: i64,
        hash: &ContentHash,
        path: &str,
    ) -> Result<(), StorageError> {
        ActiveModel {
            id: Set(id),
            hash: Set(Some(hash.to_hex())),
            path: Set(path.to_string()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn update_variants(
        &self,
        id: i64,
        variants: &BTreeSet<String>,
    ) -> Result<(), StorageError> {
        let joined = variants.iter().cloned().collect::<Vec<_>>().join(",");
        ActiveModel {
            id: Set(id),
            variants: Set(joined),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(persistence_err)?;
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Option<FileRecord>, StorageError> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(persistence_err)?
            .map(record_from)
            .transpose()
    }
}
