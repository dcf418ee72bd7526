//! Package document (`content.opf`) generation.

use crate::book::BookMetadata;
use crate::util::{encode_href, escape_xml};

use super::toc::Landmarks;

/// One manifest `<item>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManifestItem {
    pub id: String,
    /// Path relative to the package document, unencoded.
    pub href: String,
    pub media_type: String,
    pub properties: Option<&'static str>,
}

impl ManifestItem {
    pub(crate) fn new(id: impl Into<String>, href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: None,
        }
    }

    pub(crate) fn with_properties(mut self, properties: &'static str) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Render an EPUB 3.0 package document with EPUB 2 fallbacks (NCX spine
/// toc, cover meta, guide).
pub(crate) fn render_opf(
    metadata: &BookMetadata,
    identifier: &str,
    manifest: &[ManifestItem],
    spine: &[String],
    landmarks: &Landmarks,
) -> String {
    let mut opf = String::new();

    opf.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id" xml:lang="{}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
        escape_xml(&metadata.language)
    ));

    opf.push_str(&format!(
        "    <dc:identifier id=\"book-id\">{}</dc:identifier>\n",
        escape_xml(identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title id=\"title\">{}</dc:title>\n    <meta refines=\"#title\" property=\"title-type\">main</meta>\n",
        escape_xml(&metadata.title)
    ));
    if let Some(subtitle) = metadata.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
        opf.push_str(&format!(
            "    <dc:title id=\"subtitle\">{}</dc:title>\n    <meta refines=\"#subtitle\" property=\"title-type\">subtitle</meta>\n",
            escape_xml(subtitle)
        ));
    }
    opf.push_str(&format!(
        "    <dc:creator id=\"author\">{}</dc:creator>\n    <meta refines=\"#author\" property=\"role\" scheme=\"marc:relators\">aut</meta>\n",
        escape_xml(&metadata.author)
    ));
    opf.push_str(&format!(
        "    <dc:publisher>{}</dc:publisher>\n",
        escape_xml(&metadata.publisher)
    ));
    opf.push_str(&format!(
        "    <dc:date>{}</dc:date>\n",
        escape_xml(&metadata.publication_date)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape_xml(&metadata.language)
    ));
    for tag in metadata.tags.iter().filter(|t| !t.trim().is_empty()) {
        opf.push_str(&format!("    <dc:subject>{}</dc:subject>\n", escape_xml(tag)));
    }
    opf.push_str(&format!(
        "    <dc:description>{}</dc:description>\n",
        escape_xml(&metadata.description)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        metadata.modified_timestamp()
    ));
    if manifest.iter().any(|item| item.id == "cover-image") {
        opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    opf.push_str("  </metadata>\n  <manifest>\n");

    for item in manifest {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
            escape_xml(&item.id),
            escape_xml(&encode_href(&item.href)),
            escape_xml(&item.media_type)
        ));
        if let Some(properties) = item.properties {
            opf.push_str(&format!(" properties=\"{properties}\""));
        }
        opf.push_str("/>\n");
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    for idref in spine {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape_xml(idref)));
    }
    opf.push_str("  </spine>\n");

    let references: Vec<(&str, &str, &String)> = [
        ("cover", "Cover", &landmarks.cover),
        ("toc", "Table of Contents", &landmarks.toc),
        ("text", "Start", &landmarks.start),
    ]
    .into_iter()
    .filter_map(|(kind, title, href)| href.as_ref().map(|h| (kind, title, h)))
    .collect();
    if !references.is_empty() {
        opf.push_str("  <guide>\n");
        for (kind, title, href) in references {
            opf.push_str(&format!(
                "    <reference type=\"{kind}\" title=\"{title}\" href=\"{}\"/>\n",
                escape_xml(&encode_href(href))
            ));
        }
        opf.push_str("  </guide>\n");
    }

    opf.push_str("</package>\n");
    opf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opf_metadata_and_spine() {
        let meta = BookMetadata::new("Book")
            .with_subtitle("Sub")
            .with_author("Writer")
            .with_publisher("Press")
            .with_publication_date("2025")
            .with_tag("one")
            .with_tag("two")
            .with_description("Desc");
        let manifest = vec![
            ManifestItem::new("ncx", "toc.ncx", "application/x-dtbncx+xml"),
            ManifestItem::new("cover-image", "images/c.jpg", "image/jpeg").with_properties("cover-image"),
            ManifestItem::new("chapter1", "Text/chapter1.xhtml", "application/xhtml+xml"),
        ];
        let opf = render_opf(
            &meta,
            "urn:isbn:1",
            &manifest,
            &["chapter1".to_string()],
            &Landmarks::default(),
        );

        assert!(opf.contains(r#"<dc:identifier id="book-id">urn:isbn:1</dc:identifier>"#));
        assert!(opf.contains(r#"<dc:title id="subtitle">Sub</dc:title>"#));
        assert_eq!(opf.matches("<dc:subject>").count(), 2);
        assert!(opf.contains(r#"<meta property="dcterms:modified">2025-01-01T00:00:00Z</meta>"#));
        assert!(opf.contains(r#"<meta name="cover" content="cover-image"/>"#));
        assert!(opf.contains(r#"properties="cover-image""#));
        assert!(opf.contains(r#"<itemref idref="chapter1"/>"#));
        assert!(!opf.contains("<guide>"));
    }
}
