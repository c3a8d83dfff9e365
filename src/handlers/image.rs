use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::StorageError;
use crate::record::FileRecord;
use crate::variant::VariantHandler;

fn load(source: &Path) -> Result<(DynamicImage, ImageFormat), StorageError> {
    let reader = ImageReader::open(source)
        .map_err(|e| StorageError::Variant(format!("failed to open image: {e}")))?
        .with_guessed_format()
        .map_err(|e| StorageError::Variant(format!("failed to read image: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| StorageError::Variant("unrecognized image format".into()))?;
    let img = reader
        .decode()
        .map_err(|e| StorageError::Variant(format!("failed to decode image: {e}")))?;
    Ok((img, format))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| StorageError::Variant(format!("failed to encode image: {e}")))?;
    Ok(buffer)
}

fn dimensions(params: &[String]) -> Result<(u32, u32), StorageError> {
    match params {
        [w, h] => {
            let width = w
                .parse()
                .map_err(|_| StorageError::Variant(format!("invalid width \"{w}\"")))?;
            let height = h
                .parse()
                .map_err(|_| StorageError::Variant(format!("invalid height \"{h}\"")))?;
            Ok((width, height))
        }
        _ => Err(StorageError::Variant(format!(
            "expected width and height parameters, got {}",
            params.len()
        ))),
    }
}

/// Resizes the source image to exact dimensions, re-encoding in its own
/// format. Register under a pattern with two capture groups, e.g.
/// `^resize_(\d+)x(\d+)$`.
pub struct ResizeHandler;

#[async_trait]
impl VariantHandler for ResizeHandler {
    async fn render(
        &self,
        params: &[String],
        source: &Path,
        _record: &FileRecord,
    ) -> Result<Vec<u8>, StorageError> {
        let (width, height) = dimensions(params)?;
        let (img, format) = load(source)?;
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        encode(&resized, format)
    }
}

/// Produces a thumbnail fitting within the given dimensions while keeping
/// the aspect ratio. Register under e.g. `^thumb_(\d+)x(\d+)$`.
pub struct ThumbHandler;

#[async_trait]
impl VariantHandler for ThumbHandler {
    async fn render(
        &self,
        params: &[String],
        source: &Path,
        _record: &FileRecord,
    ) -> Result<Vec<u8>, StorageError> {
        let (width, height) = dimensions(params)?;
        let (img, format) = load(source)?;
        let thumb = img.thumbnail(width, height);
        encode(&thumb, format)
    }
}
