//! Table of contents, rendered as NCX, EPUB 3 nav and an in-book page.

use crate::util::{encode_href, escape_xml};

/// One navigable page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocPoint {
    pub label: String,
    /// Path relative to the package document (`Text/chapter1.xhtml`).
    pub href: String,
}

/// Targets for the nav document's landmarks and the OPF guide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Landmarks {
    pub cover: Option<String>,
    pub toc: Option<String>,
    pub start: Option<String>,
}

/// The single table of contents every navigation format is rendered from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    points: Vec<TocPoint>,
}

impl TableOfContents {
    pub fn new(points: Vec<TocPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[TocPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// EPUB 2 `toc.ncx`.
    pub fn render_ncx(&self, uid: &str, title: &str, author: &str, language: &str) -> String {
        let mut ncx = String::new();

        ncx.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
"#,
        );
        ncx.push_str(&format!(
            "<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\" xml:lang=\"{}\">\n",
            escape_xml(language)
        ));
        ncx.push_str(&format!(
            r#"  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <docAuthor>
    <text>{}</text>
  </docAuthor>
  <navMap>
"#,
            escape_xml(uid),
            escape_xml(title),
            escape_xml(author)
        ));

        for (i, point) in self.points.iter().enumerate() {
            let order = i + 1;
            ncx.push_str(&format!(
                "    <navPoint id=\"navPoint-{order}\" playOrder=\"{order}\">\n"
            ));
            ncx.push_str(&format!(
                "      <navLabel><text>{}</text></navLabel>\n",
                escape_xml(&point.label)
            ));
            ncx.push_str(&format!(
                "      <content src=\"{}\"/>\n",
                escape_xml(&encode_href(&point.href))
            ));
            ncx.push_str("    </navPoint>\n");
        }

        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }

    /// EPUB 3 navigation document (`nav.xhtml`), which sits next to the
    /// package document.
    pub(crate) fn render_nav(&self, language: &str, landmarks: &Landmarks) -> String {
        let mut nav = xhtml_head("Table of Contents", language, &[]);
        nav.push_str("<body>\n  <nav epub:type=\"toc\" id=\"toc\">\n    <h1>Table of Contents</h1>\n");
        self.write_list(&mut nav, "");
        nav.push_str("  </nav>\n");

        let marks: Vec<(&str, &str, &String)> = [
            ("cover", "Cover", &landmarks.cover),
            ("toc", "Table of Contents", &landmarks.toc),
            ("bodymatter", "Start of Content", &landmarks.start),
        ]
        .into_iter()
        .filter_map(|(kind, label, href)| href.as_ref().map(|h| (kind, label, h)))
        .collect();

        if !marks.is_empty() {
            nav.push_str("  <nav epub:type=\"landmarks\" id=\"landmarks\" hidden=\"hidden\">\n    <ol>\n");
            for (kind, label, href) in marks {
                nav.push_str(&format!(
                    "      <li><a epub:type=\"{kind}\" href=\"{}\">{label}</a></li>\n",
                    escape_xml(&encode_href(href))
                ));
            }
            nav.push_str("    </ol>\n  </nav>\n");
        }

        nav.push_str("</body>\n</html>\n");
        nav
    }

    /// Linked contents page for the reading order, placed in the text
    /// directory next to the pages it links to.
    pub(crate) fn render_page(&self, language: &str, stylesheets: &[String]) -> String {
        let mut page = xhtml_head("Table of Contents", language, stylesheets);
        page.push_str("<body>\n  <section epub:type=\"toc\" class=\"toc\">\n    <h1>Table of Contents</h1>\n");
        self.write_list(&mut page, "../");
        page.push_str("  </section>\n</body>\n</html>\n");
        page
    }

    fn write_list(&self, out: &mut String, prefix: &str) {
        out.push_str("    <ol>\n");
        for point in &self.points {
            out.push_str(&format!(
                "      <li><a href=\"{prefix}{}\">{}</a></li>\n",
                escape_xml(&encode_href(&point.href)),
                escape_xml(&point.label)
            ));
        }
        out.push_str("    </ol>\n");
    }
}

/// Opening of a generated XHTML page up to and including `</head>`.
/// Stylesheet hrefs are package-relative; the page is assumed to live one
/// directory below the package document.
pub(crate) fn xhtml_head(title: &str, language: &str, stylesheets: &[String]) -> String {
    let lang = escape_xml(language);
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{}</title>
"#,
        escape_xml(title)
    );
    for href in stylesheets {
        out.push_str(&format!(
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"../{}\"/>\n",
            escape_xml(&encode_href(href))
        ));
    }
    out.push_str("</head>\n");
    out
}
