use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::owner::OwnerRef;
use crate::path::{split_dir_filename, variant_filename};

/// The durable entity for one stored object: identity, physical location,
/// integrity hash, ownership link and the set of generated variants.
///
/// Created provisional (no path, no hash) by the store pipeline; `path` and
/// `hash` are finalized once the backend write succeeds and are immutable
/// afterwards. The variant set only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    /// Name of the backend owning the physical bytes.
    pub backend: String,
    /// Backend-relative location; empty until the store pipeline finalizes it.
    pub path: String,
    pub extension: String,
    pub mime_type: String,
    pub size: i64,
    /// Present iff the backend write has succeeded.
    pub hash: Option<ContentHash>,
    /// Tags of variants whose artifacts are confirmed present.
    pub variants: BTreeSet<String>,
    pub owner: Option<OwnerRef>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payload for the provisional insert at the start of the store pipeline.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub backend: String,
    pub extension: String,
    pub mime_type: String,
    pub size: i64,
    pub owner: Option<OwnerRef>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Basename of the canonical path.
    pub fn name(&self) -> &str {
        split_dir_filename(&self.path).1
    }

    /// Backend-relative path of a variant: `dirname(path)/tag_name`, or the
    /// canonical path for an empty tag.
    pub fn path_for(&self, tag: &str) -> String {
        let (dir, name) = split_dir_filename(&self.path);
        let file = variant_filename(tag, name);
        if dir.is_empty() {
            file
        } else {
            format!("{dir}/{file}")
        }
    }

    /// `backend://relative` form of a variant path, routable through the
    /// mount manager.
    pub fn located(&self, tag: &str) -> String {
        format!("{}://{}", self.backend, self.path_for(tag))
    }

    /// `backend://dirname` of the directory holding the canonical file and
    /// every variant.
    pub fn located_dir(&self) -> String {
        format!("{}://{}", self.backend, split_dir_filename(&self.path).0)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// A non-guessable token derived from the creation timestamp, usable in
    /// pre-finalization download links.
    pub fn temp_hash(&self) -> String {
        hex::encode(Md5::digest(self.created_at.to_rfc3339().as_bytes()))
    }

    /// Record the owning entity; no-op on `None`.
    pub fn set_owner(&mut self, owner: Option<OwnerRef>) {
        if owner.is_some() {
            self.owner = owner;
        }
    }

    /// Variant tags in their comma-joined persisted form.
    pub fn variants_joined(&self) -> String {
        self.variants.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Parse the comma-joined persisted form back into a set.
    pub fn variants_from_joined(joined: &str) -> BTreeSet<String> {
        joined
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FileRecord {
        FileRecord {
            id: 12345,
            backend: "local".into(),
            path: "1/12/12345/a.jpg".into(),
            extension: "jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 42,
            hash: Some(ContentHash::compute(b"bytes")),
            variants: BTreeSet::new(),
            owner: None,
            expired_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn name_is_basename() {
        assert_eq!(record().name(), "a.jpg");
    }

    #[test]
    fn path_for_prefixes_variant_tag() {
        let r = record();
        assert_eq!(r.path_for(""), "1/12/12345/a.jpg");
        assert_eq!(r.path_for("thumb"), "1/12/12345/thumb_a.jpg");
    }

    #[test]
    fn located_paths_carry_backend_prefix() {
        let r = record();
        assert_eq!(r.located(""), "local://1/12/12345/a.jpg");
        assert_eq!(r.located("thumb"), "local://1/12/12345/thumb_a.jpg");
        assert_eq!(r.located_dir(), "local://1/12/12345");
    }

    #[test]
    fn is_image_checks_mime_prefix() {
        let mut r = record();
        assert!(r.is_image());
        r.mime_type = "application/pdf".into();
        assert!(!r.is_image());
    }

    #[test]
    fn set_owner_ignores_none() {
        let mut r = record();
        r.set_owner(Some(OwnerRef::new("album", 7)));
        r.set_owner(None);
        assert_eq!(r.owner.as_ref().unwrap().id, 7);
    }

    #[test]
    fn variants_join_round_trip() {
        let mut r = record();
        r.variants.insert("thumb".into());
        r.variants.insert("resize_100x100".into());

        let joined = r.variants_joined();
        let parsed = FileRecord::variants_from_joined(&joined);
        assert_eq!(parsed, r.variants);
    }

    #[test]
    fn variants_from_joined_skips_empty_segments() {
        assert!(FileRecord::variants_from_joined("").is_empty());
        let set = FileRecord::variants_from_joined("thumb,,large");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn temp_hash_is_stable_for_a_record() {
        let r = record();
        assert_eq!(r.temp_hash(), r.temp_hash());
        assert_eq!(r.temp_hash().len(), 32);
    }
}
