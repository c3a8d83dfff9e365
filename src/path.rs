use crate::error::StorageError;

/// Compute the sharded relative path for a record id and original filename.
///
/// Two levels of integer-division bucketing bound the number of entries per
/// directory as the id space grows. Ids are unique, so the result cannot
/// collide across records.
///
/// `generate_path(12345, "a.jpg") == "1/12/12345/a.jpg"`.
pub fn generate_path(id: i64, name: &str) -> String {
    format!("{}/{}/{}/{}", id / 10000, id / 1000, id, name)
}

/// Build the filename for a variant tag: `tag_name`, or `name` for the
/// canonical (empty) tag.
pub fn variant_filename(tag: &str, name: &str) -> String {
    if tag.is_empty() {
        name.to_string()
    } else {
        format!("{tag}_{name}")
    }
}

/// Splits a relative path into its directory and filename components.
pub fn split_dir_filename(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Checks if a path string contains path traversal components.
pub fn contains_path_traversal(path: &str) -> bool {
    path == ".."
        || path.starts_with("../")
        || path.contains("/../")
        || path.ends_with("/..")
        || path.starts_with("..\\")
        || path.contains("\\..\\")
        || path.ends_with("\\..")
}

/// Validates an uploaded file's original name before it is embedded in a
/// storage path. Names must be flat: no separators, no traversal, no hidden
/// or control-character names.
pub fn validate_upload_filename(filename: &str) -> Result<&str, StorageError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(StorageError::InvalidFilename("filename cannot be empty"));
    }

    if trimmed.contains('\0') {
        return Err(StorageError::InvalidFilename("null bytes are not allowed"));
    }

    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(StorageError::InvalidFilename(
            "control characters are not allowed",
        ));
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(StorageError::InvalidFilename(
            "path separators are not allowed",
        ));
    }

    if trimmed == ".." {
        return Err(StorageError::InvalidFilename("'..' is not allowed"));
    }

    if trimmed.starts_with('.') {
        return Err(StorageError::InvalidFilename(
            "hidden names (starting with '.') are not allowed",
        ));
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_path_is_deterministic() {
        assert_eq!(generate_path(12345, "a.jpg"), generate_path(12345, "a.jpg"));
    }

    #[test]
    fn generate_path_shards_by_integer_division() {
        assert_eq!(generate_path(12345, "a.jpg"), "1/12/12345/a.jpg");
        assert_eq!(generate_path(1, "x.txt"), "0/0/1/x.txt");
        assert_eq!(generate_path(999, "f"), "0/0/999/f");
        assert_eq!(generate_path(1000, "f"), "0/1/1000/f");
        assert_eq!(generate_path(10000, "f"), "1/10/10000/f");
    }

    #[test]
    fn variant_filename_prefixes_tag() {
        assert_eq!(variant_filename("thumb", "a.jpg"), "thumb_a.jpg");
        assert_eq!(variant_filename("", "a.jpg"), "a.jpg");
    }

    #[test]
    fn split_dir_filename_works() {
        assert_eq!(split_dir_filename("1/12/12345/a.jpg"), ("1/12/12345", "a.jpg"));
        assert_eq!(split_dir_filename("a.jpg"), ("", "a.jpg"));
    }

    #[test]
    fn validate_upload_filename_accepts_flat_names() {
        assert!(validate_upload_filename("photo.jpg").is_ok());
        assert!(validate_upload_filename("my-file_v2.tar.gz").is_ok());
        assert_eq!(validate_upload_filename("  padded.txt  ").unwrap(), "padded.txt");
    }

    #[test]
    fn validate_upload_filename_rejects_bad_names() {
        assert!(validate_upload_filename("").is_err());
        assert!(validate_upload_filename("a/b.txt").is_err());
        assert!(validate_upload_filename("a\\b.txt").is_err());
        assert!(validate_upload_filename("..").is_err());
        assert!(validate_upload_filename(".hidden").is_err());
        assert!(validate_upload_filename("f\0oo").is_err());
        assert!(validate_upload_filename("crlf\r\n.txt").is_err());
    }

    #[test]
    fn validate_upload_filename_allows_inner_double_dots() {
        assert!(validate_upload_filename("archive..tar.gz").is_ok());
    }

    #[test]
    fn contains_path_traversal_detects_patterns() {
        assert!(contains_path_traversal(".."));
        assert!(contains_path_traversal("../foo"));
        assert!(contains_path_traversal("foo/../bar"));
        assert!(!contains_path_traversal("foo/bar"));
        assert!(!contains_path_traversal("foo..bar"));
    }
}
