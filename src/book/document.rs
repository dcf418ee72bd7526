//! Source pages and their converted XHTML counterparts.

use std::collections::BTreeSet;
use std::path::Path;

use crate::dom::{Dom, NodeId, parse_html};
use crate::error::{Error, Result};
use crate::util::decode_text;

use super::style::inline_declarations;

/// One HTML page of the manuscript, as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    id: String,
    markup: String,
    title: Option<String>,
    images: Vec<String>,
    classes: BTreeSet<String>,
    inline_styles: BTreeSet<String>,
}

impl SourceDocument {
    /// Parse a page from markup, failing with `MalformedSource` when the
    /// input cannot be HTML at all.
    pub fn parse(id: impl Into<String>, markup: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let markup = markup.into();
        check_markup(&id, &markup)?;

        let dom = parse_html(&markup);
        let mut doc = Self {
            title: extract_title(&dom),
            id,
            markup,
            images: Vec::new(),
            classes: BTreeSet::new(),
            inline_styles: BTreeSet::new(),
        };
        doc.collect_inventory(&dom);
        Ok(doc)
    }

    /// Parse a page from raw bytes, detecting the text encoding. NUL
    /// checks run on the decoded text so UTF-16 pages are accepted.
    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        Self::parse(id, decode_text(bytes).into_owned())
    }

    /// Read a page from disk. The id is the file stem.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;
        Self::from_bytes(id, &bytes)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// `<title>` text, or the first `<h1>` when there is no title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// `src` values of every `<img>`, in document order.
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Distinct class names used anywhere in the page.
    pub fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    /// Distinct inline style declarations, normalized to `property: value`.
    pub fn inline_styles(&self) -> &BTreeSet<String> {
        &self.inline_styles
    }

    pub(crate) fn dom(&self) -> Dom {
        parse_html(&self.markup)
    }

    fn collect_inventory(&mut self, dom: &Dom) {
        let mut stack = vec![dom.document()];
        while let Some(id) = stack.pop() {
            if dom.is_element(id) {
                self.classes
                    .extend(dom.element_classes(id).iter().cloned());
                if let Some(style) = dom.get_attr(id, "style") {
                    self.inline_styles.extend(inline_declarations(style));
                }
                if dom.element_name(id).is_some_and(|n| n.as_ref() == "img")
                    && let Some(src) = dom.get_attr(id, "src")
                {
                    self.images.push(src.to_string());
                }
            }

            let mut children: Vec<NodeId> = dom.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
    }
}

/// Reject input with no HTML in it: empty text, or text without a single
/// start tag.
fn check_markup(id: &str, markup: &str) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedSource {
        document: id.to_string(),
        reason: reason.to_string(),
    };

    if markup.trim().is_empty() {
        return Err(malformed("document is empty"));
    }

    let bytes = markup.as_bytes();
    if memchr::memchr(0, bytes).is_some() {
        return Err(malformed("contains NUL bytes"));
    }

    let has_tag = memchr::memchr_iter(b'<', bytes)
        .any(|pos| bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic));
    if !has_tag {
        return Err(malformed("no HTML elements found"));
    }

    Ok(())
}

fn extract_title(dom: &Dom) -> Option<String> {
    let non_empty = |id: NodeId| {
        let text = dom.text_of(id);
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    };

    dom.head()
        .and_then(|head| {
            dom.children(head)
                .find(|&c| dom.element_name(c).is_some_and(|n| n.as_ref() == "title"))
        })
        .and_then(non_empty)
        .or_else(|| dom.find_by_tag("h1").and_then(non_empty))
}

/// A source page after conversion to EPUB-ready XHTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    id: String,
    markup: String,
    title: String,
    images: Vec<String>,
}

impl ConvertedDocument {
    pub(crate) fn new(id: String, markup: String, title: String, images: Vec<String>) -> Self {
        Self {
            id,
            markup,
            title,
            images,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The XHTML text.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Package-relative paths of the images the page embeds
    /// (`images/otherbooks/cover.jpg`).
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Path of the page relative to the package document.
    pub fn href(&self) -> String {
        format!("{}/{}.xhtml", crate::epub::TEXT_DIR, self.id)
    }
}
