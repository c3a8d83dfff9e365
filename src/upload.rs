use std::path::{Path, PathBuf};

use tokio::fs;

/// Description of an uploaded file as handed over by the web layer: a
/// staging location on local disk plus caller-declared metadata. The
/// declared fields are captured on the record as-is; only the content hash
/// is derived from the actual bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Whether the web layer flagged this upload as failed.
    pub has_error: bool,
    /// Temp location holding the uploaded bytes.
    pub temp_path: PathBuf,
    pub declared_type: String,
    pub declared_size: i64,
    pub declared_extension: String,
    pub original_name: String,
}

impl Upload {
    /// Build a descriptor for a file already on disk, deriving size from the
    /// filesystem and type/extension from the name.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        original_name: impl Into<String>,
    ) -> std::io::Result<Self> {
        let temp_path = path.into();
        let original_name = original_name.into();
        let meta = fs::metadata(&temp_path).await?;

        let declared_extension = Path::new(&original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let declared_type = mime_guess::from_path(&original_name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_default();

        Ok(Self {
            has_error: false,
            temp_path,
            declared_type,
            declared_size: i64::try_from(meta.len()).unwrap_or(i64::MAX),
            declared_extension,
            original_name,
        })
    }
}
