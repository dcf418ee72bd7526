//! EPUB packaging and structural validation.
//!
//! Layout of a package built here:
//!
//! ```text
//! mimetype                  stored, always first
//! META-INF/container.xml
//! OEBPS/content.opf
//! OEBPS/toc.ncx
//! OEBPS/nav.xhtml
//! OEBPS/Text/<id>.xhtml     one per reading-order entry
//! OEBPS/Styles/...
//! OEBPS/Fonts/...
//! OEBPS/images/...
//! ```

mod archive;
mod ids;
mod opf;
mod pages;
mod parser;
mod toc;
mod validate;
mod writer;

pub use archive::{ArchiveEntry, Compression, PackageArchive};
pub use ids::IdAllocator;
pub use toc::{TableOfContents, TocPoint};
pub use validate::{ArchiveReport, StructuralIssue, validate_archive};
pub use writer::{PackageOptions, Packager, package};

/// Content of the `mimetype` entry.
pub const MIMETYPE: &str = "application/epub+zip";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
/// Directory holding the package document and all content.
pub const CONTENT_DIR: &str = "OEBPS";
pub const PACKAGE_DOCUMENT: &str = "content.opf";
pub const NCX_DOCUMENT: &str = "toc.ncx";
pub const NAV_DOCUMENT: &str = "nav.xhtml";
/// Content pages, relative to [`CONTENT_DIR`].
pub const TEXT_DIR: &str = "Text";
pub const IMAGES_DIR: &str = "images";
pub const STYLES_DIR: &str = "Styles";
pub const FONTS_DIR: &str = "Fonts";

/// Archive path of a file given relative to [`CONTENT_DIR`].
pub(crate) fn content_path(href: &str) -> String {
    format!("{CONTENT_DIR}/{href}")
}
