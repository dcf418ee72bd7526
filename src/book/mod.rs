//! Manuscript data model.
//!
//! Source pages, their converted XHTML counterparts, the metadata record,
//! the explicit reading order and the binary assets that ride along.

mod document;
mod metadata;
mod order;
mod style;

pub use document::{ConvertedDocument, SourceDocument};
pub use metadata::{BookMetadata, check_cover_image, MAX_COVER_BYTES};
pub use order::{OrderEntry, ReadingOrder, SpineSource, SyntheticPage};

use crate::util::{detect_media_format, normalize_relative_path};

/// Where an asset lives inside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Image,
    Stylesheet,
    Font,
}

impl AssetKind {
    /// Package directory for this kind, relative to the package document.
    pub fn dir(self) -> &'static str {
        match self {
            AssetKind::Image => crate::epub::IMAGES_DIR,
            AssetKind::Stylesheet => crate::epub::STYLES_DIR,
            AssetKind::Font => crate::epub::FONTS_DIR,
        }
    }
}

/// A binary file copied into the package (image, stylesheet, font).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    kind: AssetKind,
    name: String,
    data: Vec<u8>,
    media_type: &'static str,
}

impl Asset {
    /// An image, named by its path relative to the images directory
    /// (`otherbooks/cover.jpg`).
    pub fn image(name: impl AsRef<str>, data: Vec<u8>) -> Self {
        Self::with_kind(AssetKind::Image, name.as_ref(), data)
    }

    pub fn stylesheet(name: impl AsRef<str>, data: Vec<u8>) -> Self {
        Self::with_kind(AssetKind::Stylesheet, name.as_ref(), data)
    }

    pub fn font(name: impl AsRef<str>, data: Vec<u8>) -> Self {
        Self::with_kind(AssetKind::Font, name.as_ref(), data)
    }

    fn with_kind(kind: AssetKind, name: &str, data: Vec<u8>) -> Self {
        let name = normalize_relative_path(name).unwrap_or_else(|| name.to_string());
        let media_type = detect_media_format(&name, &data)
            .map_or("application/octet-stream", |f| f.mime_type());
        Self {
            kind,
            name,
            data,
            media_type,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Path relative to the asset kind's directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Path relative to the package document (`images/otherbooks/cover.jpg`).
    pub fn href(&self) -> String {
        format!("{}/{}", self.kind.dir(), self.name)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }
}
