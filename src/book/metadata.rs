//! Book-level metadata record.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::util::{MediaFormat, detect_media_format, modified_timestamp};

/// Largest cover image retailers accept.
pub const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

/// Title, author and the rest of the record that ends up in the package
/// document.
///
/// Loaded from JSON with the same keys as the field names; `tags` may be a
/// list or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub publication_date: String,
    /// Path of the cover image, relative to the images directory.
    #[serde(default)]
    pub cover_image: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "tags_from_list_or_string")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Last-modified timestamp; derived from the publication date when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn tags_from_list_or_string<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    let tags = match Tags::deserialize(deserializer)? {
        Tags::List(list) => list,
        Tags::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

impl BookMetadata {
    /// Create a record with the given title and the default language.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            author: String::new(),
            publisher: String::new(),
            publication_date: String::new(),
            cover_image: String::new(),
            language: default_language(),
            isbn: None,
            tags: Vec::new(),
            description: String::new(),
            modified: None,
        }
    }

    /// Load a record from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    pub fn with_publication_date(mut self, date: impl Into<String>) -> Self {
        self.publication_date = date.into();
        self
    }

    pub fn with_cover_image(mut self, path: impl Into<String>) -> Self {
        self.cover_image = path.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Names of required fields that are blank, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |s: &str| s.trim().is_empty();
        let mut missing = Vec::new();

        for (name, value) in [
            ("title", self.title.as_str()),
            ("author", self.author.as_str()),
            ("publisher", self.publisher.as_str()),
            ("publication_date", self.publication_date.as_str()),
            ("cover_image", self.cover_image.as_str()),
            ("language", self.language.as_str()),
        ] {
            if blank(value) {
                missing.push(name);
            }
        }
        if self.tags.iter().all(|t| blank(t)) {
            missing.push("tags");
        }
        if blank(&self.description) {
            missing.push("description");
        }

        missing
    }

    /// Fail with `IncompleteMetadata` when any required field is blank.
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::IncompleteMetadata { missing })
        }
    }

    /// Package identifier: `urn:isbn:` when an ISBN is set, otherwise a
    /// name-based UUID derived from title, author and publisher so the
    /// same book always gets the same identifier.
    pub fn identifier(&self) -> String {
        if let Some(isbn) = self.isbn.as_deref().map(str::trim)
            && !isbn.is_empty()
        {
            return format!("urn:isbn:{isbn}");
        }

        let seed = format!("{}\u{1f}{}\u{1f}{}", self.title, self.author, self.publisher);
        format!("urn:uuid:{}", name_based_uuid(seed.as_bytes()))
    }

    /// `dcterms:modified` value.
    pub fn modified_timestamp(&self) -> String {
        self.modified
            .as_deref()
            .and_then(modified_timestamp)
            .or_else(|| modified_timestamp(&self.publication_date))
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
    }
}

/// Version 5 style UUID from a SHA-1 digest.
fn name_based_uuid(name: &[u8]) -> String {
    let digest = sha1_smol::Sha1::from(name).digest().bytes();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

/// Check a cover image: JPEG or PNG, at most [`MAX_COVER_BYTES`].
pub fn check_cover_image(name: &str, data: &[u8]) -> Result<()> {
    match detect_media_format(name, data) {
        Some(MediaFormat::Jpeg | MediaFormat::Png) => {}
        _ => {
            return Err(Error::InvalidCover(format!(
                "'{name}' is not a JPEG or PNG image"
            )));
        }
    }

    if data.len() > MAX_COVER_BYTES {
        return Err(Error::InvalidCover(format!(
            "'{name}' is {:.1} MiB, the limit is {} MiB",
            data.len() as f64 / (1024.0 * 1024.0),
            MAX_COVER_BYTES / (1024 * 1024)
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BookMetadata {
        BookMetadata::new("The Book")
            .with_author("A. Writer")
            .with_publisher("Small Press")
            .with_publication_date("2025-03-14")
            .with_cover_image("cover.jpg")
            .with_tag("fiction")
            .with_description("A story.")
    }

    #[test]
    fn test_complete_record_passes() {
        assert!(complete().missing_fields().is_empty());
        assert!(complete().ensure_complete().is_ok());
    }

    #[test]
    fn test_missing_fields_are_named() {
        let mut meta = complete();
        meta.author = "  ".into();
        meta.tags.clear();

        assert_eq!(meta.missing_fields(), vec!["author", "tags"]);
        match meta.ensure_complete() {
            Err(Error::IncompleteMetadata { missing }) => assert_eq!(missing, ["author", "tags"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_json_defaults_and_tag_string() {
        let meta: BookMetadata = serde_json::from_str(
            r#"{"title": "T", "tags": "fiction, essays ,,poetry"}"#,
        )
        .unwrap();
        assert_eq!(meta.language, "en");
        assert_eq!(meta.tags, ["fiction", "essays", "poetry"]);
        assert_eq!(meta.subtitle, None);

        let meta: BookMetadata =
            serde_json::from_str(r#"{"title": "T", "tags": ["a", " b "]}"#).unwrap();
        assert_eq!(meta.tags, ["a", "b"]);
    }

    #[test]
    fn test_identifier() {
        let meta = complete();
        let id = meta.identifier();
        assert!(id.starts_with("urn:uuid:"));
        assert_eq!(id.len(), "urn:uuid:".len() + 36);
        assert_eq!(id, complete().identifier());
        assert_eq!(&id["urn:uuid:".len() + 14..][..1], "5");

        let other = complete().with_author("Someone Else");
        assert_ne!(id, other.identifier());

        let with_isbn = complete().with_isbn("9780000000000");
        assert_eq!(with_isbn.identifier(), "urn:isbn:9780000000000");
    }

    #[test]
    fn test_modified_timestamp() {
        assert_eq!(complete().modified_timestamp(), "2025-03-14T00:00:00Z");

        let mut meta = complete();
        meta.modified = Some("2026-01-02".into());
        assert_eq!(meta.modified_timestamp(), "2026-01-02T00:00:00Z");
    }

    #[test]
    fn test_cover_checks() {
        assert!(check_cover_image("cover.jpg", &[0xFF, 0xD8, 0xFF]).is_ok());
        assert!(check_cover_image("cover.png", &[]).is_ok());
        assert!(matches!(
            check_cover_image("cover.gif", b"GIF89a"),
            Err(Error::InvalidCover(_))
        ));
        let huge = vec![0u8; MAX_COVER_BYTES + 1];
        assert!(matches!(
            check_cover_image("cover.jpg", &huge),
            Err(Error::InvalidCover(_))
        ));
    }
}
