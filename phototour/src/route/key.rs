//! Storage-key filename parsing.
//!
//! The export pipeline uploads every photo under its bare filename, so a
//! storage key looks like `P1080534.webp` or `2019-04-02_14.22.08.jpg`.
//! Keys may arrive prefixed with an export directory (`images/P1080534.webp`);
//! only the final path segment is meaningful to the storage buckets.

use regex::Regex;
use std::sync::OnceLock;

/// Error parsing a storage-key filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    /// Filename doesn't match the expected `{stem}.{ext}` pattern.
    InvalidPattern(String),
}

impl std::fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyParseError::InvalidPattern(name) => {
                write!(f, "Filename doesn't match storage key pattern: {}", name)
            }
        }
    }
}

impl std::error::Error for KeyParseError {}

/// A parsed storage key: the bare filename stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    /// Filename without extension, used as the waypoint identity.
    pub stem: String,
    /// Lowercased image extension (`webp`, `jpg`, `jpeg`, `png`).
    pub ext: String,
}

impl StorageKey {
    /// The full key as stored in the bucket (`{stem}.{ext}`).
    pub fn name(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ([^/\\]+)          - stem: final path segment up to the extension
        // \.(webp|jpe?g|png) - supported image extensions, case insensitive
        Regex::new(r"(?i)([^/\\]+)\.(webp|jpe?g|png)$").unwrap()
    })
}

/// Parse a storage key from a filename or relative export path.
///
/// Leading directory components (`images/`, `thumbnails/`) are stripped;
/// the extension is normalized to lowercase.
///
/// # Returns
///
/// `Err(KeyParseError::InvalidPattern)` if the input is not an image
/// filename.
pub fn parse_storage_key(path: &str) -> Result<StorageKey, KeyParseError> {
    let captures = key_pattern()
        .captures(path)
        .ok_or_else(|| KeyParseError::InvalidPattern(path.to_string()))?;

    Ok(StorageKey {
        stem: captures[1].to_string(),
        ext: captures[2].to_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_filename() {
        let key = parse_storage_key("P1080534.webp").unwrap();
        assert_eq!(key.stem, "P1080534");
        assert_eq!(key.ext, "webp");
        assert_eq!(key.name(), "P1080534.webp");
    }

    #[test]
    fn test_parse_strips_directory() {
        let key = parse_storage_key("images/P1080534.webp").unwrap();
        assert_eq!(key.stem, "P1080534");

        let key = parse_storage_key("thumbnails/P1080534.webp").unwrap();
        assert_eq!(key.name(), "P1080534.webp");
    }

    #[test]
    fn test_parse_dotted_stem() {
        // Timestamps in stems contain dots; only the final extension splits
        let key = parse_storage_key("2019-04-02_14.22.08.jpg").unwrap();
        assert_eq!(key.stem, "2019-04-02_14.22.08");
        assert_eq!(key.ext, "jpg");
    }

    #[test]
    fn test_parse_normalizes_extension_case() {
        let key = parse_storage_key("IMG_0001.JPG").unwrap();
        assert_eq!(key.ext, "jpg");
    }

    #[test]
    fn test_parse_rejects_non_image() {
        assert!(parse_storage_key("image_data.json").is_err());
        assert!(parse_storage_key("noextension").is_err());
        assert!(parse_storage_key("").is_err());
    }

    #[test]
    fn test_parse_rejects_bare_extension() {
        assert!(parse_storage_key(".webp").is_err());
        assert!(parse_storage_key("images/.webp").is_err());
    }
}
