//! Assembling verified documents into an EPUB archive.

use std::collections::HashSet;

use crate::book::{
    Asset, AssetKind, BookMetadata, ConvertedDocument, ReadingOrder, SpineSource, SyntheticPage,
    check_cover_image,
};
use crate::error::{Error, Result};
use crate::util::normalize_relative_path;
use crate::verify::VerifiedDocuments;

use super::archive::{Compression, PackageArchive};
use super::ids::IdAllocator;
use super::opf::{ManifestItem, render_opf};
use super::pages::{cover_page, title_page};
use super::toc::{Landmarks, TableOfContents, TocPoint};
use super::{
    CONTAINER_PATH, MIMETYPE, NAV_DOCUMENT, NCX_DOCUMENT, PACKAGE_DOCUMENT, TEXT_DIR, content_path,
};

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Packaging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOptions {
    /// Deflate level for everything except `mimetype`.
    pub compression_level: i64,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

impl PackageOptions {
    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level;
        self
    }
}

/// Builds EPUB archives from verified documents.
#[derive(Debug, Clone, Default)]
pub struct Packager {
    options: PackageOptions,
}

/// A spine slot ready to be written.
struct Page<'a> {
    id: String,
    href: String,
    label: String,
    content: PageContent<'a>,
}

#[derive(Clone, Copy)]
enum PageContent<'a> {
    Document(&'a ConvertedDocument),
    Synthetic(SyntheticPage),
}

impl Packager {
    pub fn new(options: PackageOptions) -> Self {
        Self { options }
    }

    /// Assemble the archive.
    ///
    /// The reading order, metadata and cover are checked before anything
    /// is assembled; the first failure is returned and no archive is made.
    pub fn package(
        &self,
        documents: &VerifiedDocuments,
        metadata: &BookMetadata,
        order: &ReadingOrder,
        assets: &[Asset],
    ) -> Result<PackageArchive> {
        let spine_plan = order.reconcile(&documents.ids())?;
        metadata.ensure_complete()?;
        let cover = resolve_cover(&metadata.cover_image, assets)?;
        check_cover_image(cover.name(), cover.data())?;
        check_asset_paths(assets)?;
        warn_missing_images(documents, assets);

        let stylesheets: Vec<String> = assets
            .iter()
            .filter(|a| a.kind() == AssetKind::Stylesheet)
            .map(Asset::href)
            .collect();

        let mut ids = IdAllocator::new();
        let pages: Vec<Page<'_>> = spine_plan
            .into_iter()
            .map(|(entry, source)| match source {
                SpineSource::Document(index) => {
                    let doc = &documents.as_slice()[index];
                    Page {
                        id: ids.allocate(doc.id()),
                        href: doc.href(),
                        label: entry.title.clone().unwrap_or_else(|| doc.title().to_string()),
                        content: PageContent::Document(doc),
                    }
                }
                SpineSource::Synthetic(page) => Page {
                    id: ids.allocate(page.id()),
                    href: format!("{TEXT_DIR}/{}.xhtml", page.id()),
                    label: entry.title.clone().unwrap_or_else(|| page.label().to_string()),
                    content: PageContent::Synthetic(page),
                },
            })
            .collect();

        let toc = TableOfContents::new(
            pages
                .iter()
                .map(|p| TocPoint {
                    label: p.label.clone(),
                    href: p.href.clone(),
                })
                .collect(),
        );
        let landmarks = landmarks(&pages);

        let mut manifest = vec![
            ManifestItem::new("ncx", NCX_DOCUMENT, "application/x-dtbncx+xml"),
            ManifestItem::new("nav", NAV_DOCUMENT, XHTML_MEDIA_TYPE).with_properties("nav"),
        ];
        manifest.extend(
            pages
                .iter()
                .map(|p| ManifestItem::new(p.id.clone(), p.href.clone(), XHTML_MEDIA_TYPE)),
        );

        let ordered_assets = ordered_assets(assets);
        for asset in &ordered_assets {
            let item = if std::ptr::eq(*asset, cover) {
                ManifestItem::new("cover-image", asset.href(), asset.media_type())
                    .with_properties("cover-image")
            } else {
                ManifestItem::new(ids.allocate(&asset.href()), asset.href(), asset.media_type())
            };
            manifest.push(item);
        }
        check_manifest_unique(&manifest)?;

        let identifier = metadata.identifier();
        let spine: Vec<String> = pages.iter().map(|p| p.id.clone()).collect();
        let opf = render_opf(metadata, &identifier, &manifest, &spine, &landmarks);
        let ncx = toc.render_ncx(&identifier, &metadata.title, &metadata.author, &metadata.language);
        let nav = toc.render_nav(&metadata.language, &landmarks);

        let mut archive = PackageArchive::new(self.options.compression_level);
        archive.push("mimetype", MIMETYPE.as_bytes().to_vec(), Compression::Stored);
        archive.push(CONTAINER_PATH, CONTAINER_XML.as_bytes().to_vec(), Compression::Deflated);
        archive.push(content_path(PACKAGE_DOCUMENT), opf.into_bytes(), Compression::Deflated);
        archive.push(content_path(NCX_DOCUMENT), ncx.into_bytes(), Compression::Deflated);
        archive.push(content_path(NAV_DOCUMENT), nav.into_bytes(), Compression::Deflated);

        for page in &pages {
            let markup = match page.content {
                PageContent::Document(doc) => doc.markup().to_string(),
                PageContent::Synthetic(SyntheticPage::Cover) => {
                    cover_page(metadata, &cover.href(), &stylesheets)
                }
                PageContent::Synthetic(SyntheticPage::TitlePage) => title_page(metadata, &stylesheets),
                PageContent::Synthetic(SyntheticPage::Contents) => {
                    toc.render_page(&metadata.language, &stylesheets)
                }
            };
            archive.push(content_path(&page.href), markup.into_bytes(), Compression::Deflated);
        }

        for asset in &ordered_assets {
            archive.push(
                content_path(&asset.href()),
                asset.data().to_vec(),
                Compression::Deflated,
            );
        }

        log::info!(
            "packaged '{}': {} spine items, {} assets, {} archive entries",
            metadata.title,
            pages.len(),
            ordered_assets.len(),
            archive.len()
        );
        Ok(archive)
    }
}

/// Package with default options.
pub fn package(
    documents: &VerifiedDocuments,
    metadata: &BookMetadata,
    order: &ReadingOrder,
    assets: &[Asset],
) -> Result<PackageArchive> {
    Packager::default().package(documents, metadata, order, assets)
}

/// Find the cover among the image assets: exact path first, then a unique
/// file name match.
fn resolve_cover<'a>(cover: &str, assets: &'a [Asset]) -> Result<&'a Asset> {
    let wanted = normalize_relative_path(cover).unwrap_or_default();
    let images: Vec<&Asset> = assets
        .iter()
        .filter(|a| a.kind() == AssetKind::Image)
        .collect();

    if let Some(asset) = images
        .iter()
        .copied()
        .find(|a| a.name() == wanted || a.href() == wanted)
    {
        return Ok(asset);
    }

    let file_name = wanted.rsplit('/').next().unwrap_or(&wanted);
    let matches: Vec<&Asset> = images
        .iter()
        .copied()
        .filter(|a| a.file_name() == file_name)
        .collect();
    match matches.as_slice() {
        [asset] => Ok(*asset),
        [] => Err(Error::InvalidCover(format!(
            "'{cover}' is not among the packaged images"
        ))),
        _ => Err(Error::InvalidCover(format!(
            "'{cover}' matches {} packaged images",
            matches.len()
        ))),
    }
}

fn check_asset_paths(assets: &[Asset]) -> Result<()> {
    let mut seen = HashSet::new();
    for asset in assets {
        let href = asset.href();
        if !seen.insert(href.clone()) {
            return Err(Error::DuplicateIdentifier(format!(
                "{href} (two assets share this path)"
            )));
        }
    }
    Ok(())
}

fn check_manifest_unique(manifest: &[ManifestItem]) -> Result<()> {
    let mut ids = HashSet::new();
    for item in manifest {
        if !ids.insert(item.id.as_str()) {
            return Err(Error::DuplicateIdentifier(item.id.clone()));
        }
    }
    Ok(())
}

fn warn_missing_images(documents: &VerifiedDocuments, assets: &[Asset]) {
    let available: HashSet<String> = assets
        .iter()
        .filter(|a| a.kind() == AssetKind::Image)
        .map(Asset::href)
        .collect();

    for doc in documents {
        for image in doc.images() {
            if !available.contains(image) {
                log::warn!("{}: image '{image}' is not among the packaged assets", doc.id());
            }
        }
    }
}

/// Stylesheets, then fonts, then images, each in the given order.
fn ordered_assets(assets: &[Asset]) -> Vec<&Asset> {
    let mut ordered: Vec<&Asset> = assets.iter().collect();
    ordered.sort_by_key(|a| match a.kind() {
        AssetKind::Stylesheet => 0,
        AssetKind::Font => 1,
        AssetKind::Image => 2,
    });
    ordered
}

fn landmarks(pages: &[Page<'_>]) -> Landmarks {
    let find = |id: &str| {
        pages.iter().find(|p| match p.content {
            PageContent::Document(doc) => doc.id() == id,
            PageContent::Synthetic(page) => page.id() == id,
        })
    };
    let front_matter = |p: &&Page<'_>| match p.content {
        PageContent::Synthetic(_) => true,
        PageContent::Document(doc) => SyntheticPage::from_id(doc.id()).is_some(),
    };

    Landmarks {
        cover: find("cover").map(|p| p.href.clone()),
        toc: find("toc").map(|p| p.href.clone()),
        start: pages
            .iter()
            .find(|p| !front_matter(p))
            .or_else(|| pages.first())
            .map(|p| p.href.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::SourceDocument;
    use crate::convert::convert;
    use crate::verify::{VerificationReport, verify};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn verified(pages: &[(&str, &str)]) -> VerifiedDocuments {
        let mut report = VerificationReport::new();
        let mut converted = Vec::new();
        for (id, markup) in pages {
            let source = SourceDocument::parse(*id, *markup).unwrap();
            let doc = convert(&source).unwrap();
            report.push(verify(&source, &doc));
            converted.push(doc);
        }
        report.gate(converted).unwrap()
    }

    fn metadata() -> BookMetadata {
        BookMetadata::new("Book")
            .with_author("Writer")
            .with_publisher("Press")
            .with_publication_date("2025-01-01")
            .with_cover_image("cover.jpg")
            .with_tag("fiction")
            .with_description("About things.")
    }

    fn text(archive: &PackageArchive, path: &str) -> String {
        String::from_utf8(archive.entry(path).expect(path).data.clone()).unwrap()
    }

    #[test]
    fn test_package_layout() {
        let docs = verified(&[("chapter1", "<h1>One</h1><img src=\"images/fig.png\">")]);
        let order = ReadingOrder::new(["cover", "titlepage", "toc", "chapter1"]);
        let assets = vec![
            Asset::image("cover.jpg", JPEG.to_vec()),
            Asset::image("fig.png", vec![0x89, b'P', b'N', b'G']),
            Asset::stylesheet("style.css", b"p {}".to_vec()),
        ];
        let archive = package(&docs, &metadata(), &order, &assets).unwrap();

        let paths: Vec<&str> = archive.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "mimetype",
                "META-INF/container.xml",
                "OEBPS/content.opf",
                "OEBPS/toc.ncx",
                "OEBPS/nav.xhtml",
                "OEBPS/Text/cover.xhtml",
                "OEBPS/Text/titlepage.xhtml",
                "OEBPS/Text/toc.xhtml",
                "OEBPS/Text/chapter1.xhtml",
                "OEBPS/Styles/style.css",
                "OEBPS/images/cover.jpg",
                "OEBPS/images/fig.png",
            ]
        );
        assert_eq!(archive.entries()[0].compression, Compression::Stored);

        let opf = text(&archive, "OEBPS/content.opf");
        assert!(opf.contains(r#"<item id="cover-image" href="images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>"#));
        let spine: Vec<&str> = opf
            .lines()
            .filter_map(|l| l.trim().strip_prefix("<itemref idref=\""))
            .map(|l| l.trim_end_matches("\"/>"))
            .collect();
        assert_eq!(spine, ["cover", "titlepage", "toc", "chapter1"]);

        let contents = text(&archive, "OEBPS/Text/toc.xhtml");
        assert!(contents.contains(r#"<a href="../Text/chapter1.xhtml">One</a>"#));
        assert!(contents.contains(r#"href="../Styles/style.css""#));
    }

    #[test]
    fn test_order_label_overrides_title() {
        let docs = verified(&[("chapter1", "<h1>One</h1>")]);
        let order = ReadingOrder::new(["chapter1"]).with_title("chapter1", "Chapter the First");
        let assets = vec![Asset::image("cover.jpg", JPEG.to_vec())];
        let archive = package(&docs, &metadata(), &order, &assets).unwrap();

        let ncx = text(&archive, "OEBPS/toc.ncx");
        assert!(ncx.contains("<text>Chapter the First</text>"));
        let nav = text(&archive, "OEBPS/nav.xhtml");
        assert!(nav.contains(">Chapter the First</a>"));
    }

    #[test]
    fn test_validation_happens_before_assembly() {
        let docs = verified(&[("chapter1", "<p>x</p>"), ("chapter2", "<p>y</p>")]);
        let assets = vec![Asset::image("cover.jpg", JPEG.to_vec())];

        let err = package(&docs, &metadata(), &ReadingOrder::new(["chapter1"]), &assets).unwrap_err();
        assert!(matches!(err, Error::OrderMismatch(_)));

        let order = ReadingOrder::new(["chapter1", "chapter2"]);
        let mut incomplete = metadata();
        incomplete.description.clear();
        let err = package(&docs, &incomplete, &order, &assets).unwrap_err();
        assert!(matches!(err, Error::IncompleteMetadata { .. }));

        let err = package(&docs, &metadata().with_cover_image("missing.jpg"), &order, &assets)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCover(_)));

        let gif = vec![Asset::image("cover.gif", b"GIF89a".to_vec())];
        let err = package(&docs, &metadata().with_cover_image("cover.gif"), &order, &gif)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCover(_)));
    }

    #[test]
    fn test_cover_resolution() {
        let assets = vec![
            Asset::image("a/cover.jpg", JPEG.to_vec()),
            Asset::image("b/cover.jpg", JPEG.to_vec()),
            Asset::image("c/front.jpg", JPEG.to_vec()),
        ];
        assert_eq!(resolve_cover("a/cover.jpg", &assets).unwrap().name(), "a/cover.jpg");
        assert_eq!(resolve_cover("images/a/cover.jpg", &assets).unwrap().name(), "a/cover.jpg");
        assert_eq!(resolve_cover("front.jpg", &assets).unwrap().name(), "c/front.jpg");
        assert!(resolve_cover("cover.jpg", &assets).is_err());
    }

    #[test]
    fn test_colliding_asset_names_get_distinct_ids() {
        let docs = verified(&[("chapter1", "<p>x</p>")]);
        let assets = vec![
            Asset::image("cover.jpg", JPEG.to_vec()),
            Asset::image("a b.png", vec![]),
            Asset::image("a_b.png", vec![]),
        ];
        let archive = package(&docs, &metadata(), &ReadingOrder::new(["chapter1"]), &assets).unwrap();
        let opf = text(&archive, "OEBPS/content.opf");

        assert!(opf.contains(r#"id="images_a_b.png" href="images/a%20b.png""#));
        assert!(opf.contains(r#"id="images_a_b.png_1" href="images/a_b.png""#));
    }
}
