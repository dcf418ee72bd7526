//! HTML to EPUB-ready XHTML conversion.
//!
//! Each [`SourceDocument`] is re-parsed with html5ever and serialized as
//! well-formed XHTML: namespaced root, self-closed void elements, escaped
//! text, image references pointed at the package image directory and page
//! links renamed to `.xhtml`. Navigation-only widgets and scripts are
//! dropped, everything else in the body is carried over as-is.

mod xhtml;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::book::{ConvertedDocument, SourceDocument};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::util::normalize_relative_path;

use self::xhtml::XhtmlWriter;

/// Elements that never carry book content.
const NON_CONTENT_TAGS: &[&str] = &["script", "noscript", "template"];

/// Why an element is left out of the converted page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Matched the [`NavigationFilter`].
    Navigation,
    /// Script, noscript or template.
    NonContent,
}

/// Identifies navigation-only elements (site menus, "next chapter"
/// buttons) that make no sense inside an e-book. Matching elements are
/// dropped together with their subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationFilter {
    /// Tag names to drop.
    pub tags: BTreeSet<String>,
    /// Class names; an element carrying any of them is dropped.
    pub classes: BTreeSet<String>,
}

impl Default for NavigationFilter {
    fn default() -> Self {
        Self {
            tags: ["nav", "header", "footer"]
                .into_iter()
                .map(String::from)
                .collect(),
            classes: [
                "navigation",
                "navigation-buttons",
                "nav-button",
                "enter-button",
                "back-link",
                "back-button",
                "nav-link",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl NavigationFilter {
    /// A filter that matches nothing.
    pub fn none() -> Self {
        Self {
            tags: BTreeSet::new(),
            classes: BTreeSet::new(),
        }
    }

    /// Whether the element `id` is left out of the converted page.
    pub fn exclusion(&self, dom: &Dom, id: NodeId) -> Option<Exclusion> {
        let name = dom.element_name(id)?;
        if NON_CONTENT_TAGS.contains(&name.as_ref()) {
            return Some(Exclusion::NonContent);
        }
        if self.tags.contains(name.as_ref())
            || dom
                .element_classes(id)
                .iter()
                .any(|c| self.classes.contains(c))
        {
            return Some(Exclusion::Navigation);
        }
        None
    }
}

/// Conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Package stylesheets each page links to, relative to the package
    /// document (`Styles/style.css`).
    pub stylesheets: Vec<String>,
    pub navigation: NavigationFilter,
    /// Directory prefix that source pages use for images. Stripped from
    /// image references so `images/a.jpg` maps to the packaged `images/a.jpg`
    /// rather than `images/images/a.jpg`.
    pub image_prefix: Option<String>,
    /// `xml:lang` of the converted pages. When unset the source `<html
    /// lang>` is used, then `en`.
    pub language: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            stylesheets: Vec::new(),
            navigation: NavigationFilter::default(),
            image_prefix: Some(crate::epub::IMAGES_DIR.to_string()),
            language: None,
        }
    }
}

impl ConvertOptions {
    pub fn with_stylesheet(mut self, href: impl Into<String>) -> Self {
        self.stylesheets.push(href.into());
        self
    }

    pub fn with_navigation(mut self, filter: NavigationFilter) -> Self {
        self.navigation = filter;
        self
    }

    pub fn with_image_prefix(mut self, prefix: Option<&str>) -> Self {
        self.image_prefix = prefix.and_then(normalize_relative_path);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Converts source pages to XHTML.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert one page.
    pub fn convert(&self, source: &SourceDocument) -> Result<ConvertedDocument> {
        let dom = source.dom();
        let body = dom.body().ok_or_else(|| Error::MalformedSource {
            document: source.id().to_string(),
            reason: "no body element".into(),
        })?;

        let title = source
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| source.id().to_string());
        let language = self
            .options
            .language
            .clone()
            .or_else(|| {
                dom.root()
                    .and_then(|root| dom.get_attr(root, "lang"))
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "en".to_string());

        let mut writer = XhtmlWriter::new(&dom, &self.options);
        writer.write_document(dom.head(), body, &title, &language);
        let (markup, images, dropped) = writer.finish();

        if dropped > 0 {
            log::debug!("{}: dropped {dropped} navigation/script elements", source.id());
        }
        log::debug!("converted {} ({} bytes of XHTML)", source.id(), markup.len());

        Ok(ConvertedDocument::new(
            source.id().to_string(),
            markup,
            title,
            images,
        ))
    }
}

/// Convert a page with default options.
pub fn convert(source: &SourceDocument) -> Result<ConvertedDocument> {
    Converter::default().convert(source)
}
