use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::backend::{BoxReader, ObjectMetadata, Visibility};
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::mount::MountManager;
use crate::owner::{OwnerInfo, OwnerRef, OwnerResolver};
use crate::path::{generate_path, split_dir_filename, validate_upload_filename};
use crate::record::{FileRecord, NewFileRecord};
use crate::repo::RecordStore;
use crate::upload::Upload;
use crate::variant::{FormatTable, HandlerRegistry, VariantHandler};

/// The storage service: owns the mount manager, the record store, the
/// optional owner resolver and the variant format table, and carries the
/// store / url / variant / delete pipelines.
///
/// Constructed once at startup from an explicit [`StorageConfig`]; every
/// configuration error is fatal at that point.
pub struct Stowage {
    config: StorageConfig,
    mounts: MountManager,
    records: Arc<dyn RecordStore>,
    owners: Option<Arc<dyn OwnerResolver>>,
    formats: FormatTable,
}

impl Stowage {
    /// Build all configured backends and return the service. The format
    /// table starts empty; attach handlers with [`Stowage::with_handlers`]
    /// or [`Stowage::with_format`].
    pub async fn new(
        mut config: StorageConfig,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self, StorageError> {
        config.ensure_local();
        let mounts = MountManager::from_config(&config).await?;
        Ok(Self {
            config,
            mounts,
            records,
            owners: None,
            formats: FormatTable::new(),
        })
    }

    /// Attach an owner resolver for back-reference resolution and the
    /// best-effort file counter.
    pub fn with_owner_resolver(mut self, owners: Arc<dyn OwnerResolver>) -> Self {
        self.owners = Some(owners);
        self
    }

    /// Compile the configuration's format rules against a handler registry.
    pub fn with_handlers(mut self, registry: &HandlerRegistry) -> Result<Self, StorageError> {
        self.formats = FormatTable::from_rules(&self.config.formats, registry)?;
        Ok(self)
    }

    /// Append a single pattern/handler pair to the format table.
    pub fn with_format(
        mut self,
        pattern: &str,
        handler: Arc<dyn VariantHandler>,
    ) -> Result<Self, StorageError> {
        self.formats.push(pattern, handler)?;
        Ok(self)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Direct access to the routing façade for callers that need uniform
    /// operations outside the record lifecycle.
    pub fn mounts(&self) -> &MountManager {
        &self.mounts
    }

    /// Store an upload: validate, persist a provisional record, write the
    /// bytes through the mount manager, then finalize hash and path.
    ///
    /// On any failure after the provisional insert the record is deleted
    /// again and the cause is surfaced as [`StorageError::Store`]; a failed
    /// upload leaves neither an orphan record nor an orphan object.
    pub async fn store(
        &self,
        upload: &Upload,
        owner: Option<OwnerRef>,
        backend: Option<&str>,
    ) -> Result<FileRecord, StorageError> {
        if upload.has_error {
            return Err(StorageError::RejectedUpload);
        }

        let backend_name = backend.unwrap_or(&self.config.default_backend);
        if self.config.backend(backend_name).is_none() {
            return Err(StorageError::UnknownBackend(backend_name.to_string()));
        }

        let name = validate_upload_filename(&upload.original_name)?.to_string();

        let mime_type = if upload.declared_type.is_empty() {
            mime_guess::from_path(&name)
                .first()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string())
        } else {
            upload.declared_type.clone()
        };

        let mut record = self
            .records
            .insert(NewFileRecord {
                backend: backend_name.to_string(),
                extension: upload.declared_extension.clone(),
                mime_type,
                size: upload.declared_size,
                owner,
                expired_at: None,
            })
            .await?;

        if let Err(e) = self.write_upload(&mut record, upload, &name).await {
            if let Err(cleanup) = self.records.delete(record.id).await {
                warn!(
                    record = record.id,
                    error = %cleanup,
                    "failed to clean up provisional record after store failure"
                );
            }
            return Err(StorageError::store(e));
        }

        info!(
            record = record.id,
            backend = %record.backend,
            path = %record.path,
            "stored file"
        );

        self.bump_owner_counter(&record).await;

        Ok(record)
    }

    /// Steps 3-6 of the store pipeline; the caller handles cleanup.
    async fn write_upload(
        &self,
        record: &mut FileRecord,
        upload: &Upload,
        name: &str,
    ) -> Result<(), StorageError> {
        let path = generate_path(record.id, name);
        let hash = ContentHash::from_file(&upload.temp_path).await?;

        let located = format!("{}://{}", record.backend, path);
        // Ids are unique, so a pre-existing object here is not expected in
        // normal operation; the existence check only avoids a rewrite.
        if !self.mounts.has(&located).await? {
            let (dir, _) = split_dir_filename(&path);
            self.mounts
                .create_dir(&format!("{}://{}", record.backend, dir))
                .await?;
            let file = fs::File::open(&upload.temp_path).await?;
            self.mounts
                .write_stream(&located, Box::new(file) as BoxReader)
                .await?;
        }

        self.records.update_stored(record.id, &hash, &path).await?;
        record.hash = Some(hash);
        record.path = path;
        Ok(())
    }

    /// Best-effort owner counter update; never affects the stored record.
    async fn bump_owner_counter(&self, record: &FileRecord) {
        if let (Some(owners), Some(owner)) = (&self.owners, &record.owner) {
            if let Err(e) = owners.increment_file_count(owner).await {
                warn!(
                    owner_kind = %owner.kind,
                    owner_id = owner.id,
                    error = %e,
                    "failed to update owner file counter"
                );
            }
        }
    }

    /// Public URL of a record, generating the requested variant on demand.
    ///
    /// Falls back to the canonical path when the variant cannot be produced,
    /// so retrieval of the original never breaks on a failed derived
    /// artifact. Fails with [`StorageError::UnknownBackend`] when the
    /// record's backend is not configured.
    pub async fn url(&self, record: &mut FileRecord, tag: &str) -> Result<String, StorageError> {
        if self.config.backend(&record.backend).is_none() {
            return Err(StorageError::UnknownBackend(record.backend.clone()));
        }

        let effective_tag = if self.ensure_variant(record, tag).await {
            tag
        } else {
            ""
        };

        let base_url = self.config.base_url_for(&record.backend);
        Ok(format!("{}/{}", base_url, record.path_for(effective_tag)))
    }

    /// Ensure the named variant exists, generating it through the format
    /// table if needed. Returns `true` when the variant (or the canonical
    /// file, for an empty tag) is available; failures are logged and
    /// reported as `false`, never propagated.
    ///
    /// Idempotent for recorded tags: a second call performs no backend I/O.
    /// Concurrent callers may both generate the same missing tag; the last
    /// write wins and both observe the tag recorded.
    pub async fn ensure_variant(&self, record: &mut FileRecord, tag: &str) -> bool {
        if tag.is_empty() || record.variants.contains(tag) {
            return true;
        }

        match self.generate_variant(record, tag).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(record = record.id, tag, error = %e, "variant generation failed");
                // Leave no partial artifact behind under the tag.
                let _ = self.mounts.delete(&record.located(tag)).await;
                false
            }
        }
    }

    async fn generate_variant(
        &self,
        record: &mut FileRecord,
        tag: &str,
    ) -> Result<bool, StorageError> {
        let Some((params, handler)) = self.formats.matched(tag) else {
            return Ok(false);
        };

        let temp_path =
            std::env::temp_dir().join(format!("stowage-variant-{}", uuid::Uuid::new_v4()));

        let result = async {
            let mut reader = self.mounts.read_stream(&record.located("")).await?;
            let mut temp_file = fs::File::create(&temp_path).await?;
            tokio::io::copy(&mut reader, &mut temp_file).await?;
            temp_file.flush().await?;
            drop(temp_file);

            let derived = handler.render(&params, &temp_path, record).await?;

            let located = record.located(tag);
            self.mounts.write(&located, &derived).await?;
            if !self.mounts.has(&located).await? {
                return Err(StorageError::Variant(format!(
                    "artifact missing after write: {located}"
                )));
            }

            let mut variants = record.variants.clone();
            variants.insert(tag.to_string());
            self.records.update_variants(record.id, &variants).await?;
            record.variants = variants;

            info!(record = record.id, tag, "generated variant");
            Ok(true)
        }
        .await;

        let _ = fs::remove_file(&temp_path).await;
        result
    }

    /// Delete a record together with the backend directory holding its
    /// canonical file and every variant.
    pub async fn delete(&self, record: FileRecord) -> Result<(), StorageError> {
        if !record.path.is_empty() {
            self.mounts.delete_dir(&record.located_dir()).await?;
        }
        self.records.delete(record.id).await?;
        info!(record = record.id, backend = %record.backend, "deleted file record");
        Ok(())
    }

    /// Lazily resolve the record's owner through the injected resolver.
    /// `None` when the record has no owner or no resolver is attached.
    pub async fn owner_of(&self, record: &FileRecord) -> Result<Option<OwnerInfo>, StorageError> {
        match (&self.owners, &record.owner) {
            (Some(resolver), Some(owner)) => resolver.find(&owner.kind, owner.id).await,
            _ => Ok(None),
        }
    }

    /// Read the record's canonical bytes.
    pub async fn read_record(&self, record: &FileRecord) -> Result<Vec<u8>, StorageError> {
        self.mounts.read(&record.located("")).await
    }

    /// Stream the record's canonical bytes.
    pub async fn read_record_stream(&self, record: &FileRecord) -> Result<BoxReader, StorageError> {
        self.mounts.read_stream(&record.located("")).await
    }

    /// Metadata of the record's canonical object.
    pub async fn record_metadata(&self, record: &FileRecord) -> Result<ObjectMetadata, StorageError> {
        self.mounts.metadata(&record.located("")).await
    }

    /// Last-modified timestamp of the record's canonical object.
    pub async fn record_timestamp(
        &self,
        record: &FileRecord,
    ) -> Result<DateTime<Utc>, StorageError> {
        self.mounts.timestamp(&record.located("")).await
    }

    /// Visibility of the record's canonical object.
    pub async fn record_visibility(&self, record: &FileRecord) -> Result<Visibility, StorageError> {
        self.mounts.visibility(&record.located("")).await
    }
}
