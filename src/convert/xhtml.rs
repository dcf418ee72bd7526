//! XHTML serializer over the arena DOM.

use std::borrow::Cow;

use html5ever::{Namespace, ns};

use crate::dom::{Attribute, Dom, NodeData, NodeId};
use crate::util::{
    decode_href, encode_href, is_external_reference, is_xml_char, is_xml_name,
    normalize_relative_path,
};

use super::ConvertOptions;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const EPUB_NS: &str = "http://www.idpf.org/2007/ops";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(super) struct XhtmlWriter<'a> {
    dom: &'a Dom,
    options: &'a ConvertOptions,
    out: String,
    images: Vec<String>,
    dropped: usize,
}

impl<'a> XhtmlWriter<'a> {
    pub(super) fn new(dom: &'a Dom, options: &'a ConvertOptions) -> Self {
        Self {
            dom,
            options,
            out: String::with_capacity(4096),
            images: Vec::new(),
            dropped: 0,
        }
    }

    /// Serialized markup, package paths of referenced images and the number
    /// of dropped elements.
    pub(super) fn finish(self) -> (String, Vec<String>, usize) {
        (self.out, self.images, self.dropped)
    }

    pub(super) fn write_document(
        &mut self,
        head: Option<NodeId>,
        body: NodeId,
        title: &str,
        language: &str,
    ) {
        let lang = escape_attr(language);
        self.out
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
        self.out.push_str(&format!(
            "<html xmlns=\"{XHTML_NS}\" xmlns:epub=\"{EPUB_NS}\" lang=\"{lang}\" xml:lang=\"{lang}\">\n"
        ));

        self.out.push_str("<head>\n  <meta charset=\"UTF-8\"/>\n");
        self.out
            .push_str(&format!("  <title>{}</title>\n", escape_text(title)));
        for href in &self.options.stylesheets {
            self.out.push_str(&format!(
                "  <link rel=\"stylesheet\" type=\"text/css\" href=\"../{}\"/>\n",
                escape_attr(&encode_href(href))
            ));
        }
        if let Some(head) = head {
            self.write_head_styles(head);
        }
        self.out.push_str("</head>\n");

        self.write_element(body, &ns!(html));
        self.out.push_str("\n</html>\n");
    }

    /// Carry over `<style>` blocks; every other head element is rebuilt or
    /// dropped.
    fn write_head_styles(&mut self, head: NodeId) {
        let dom = self.dom;
        for child in dom.children(head) {
            if dom.element_name(child).is_some_and(|n| n.as_ref() == "style") {
                self.out.push_str("  <style>");
                let css = dom.text_of(child);
                self.out.push_str(&escape_text(&css));
                self.out.push_str("</style>\n");
            }
        }
    }

    fn write_node(&mut self, id: NodeId, parent_ns: &Namespace) {
        let dom = self.dom;
        let Some(node) = dom.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => self.out.push_str(&escape_text(text)),
            NodeData::Element { .. } => self.write_element(id, parent_ns),
            NodeData::Comment(_) | NodeData::Doctype | NodeData::Document => {}
        }
    }

    fn write_children(&mut self, id: NodeId, ns: &Namespace) {
        let dom = self.dom;
        for child in dom.children(id) {
            self.write_node(child, ns);
        }
    }

    fn write_element(&mut self, id: NodeId, parent_ns: &Namespace) {
        let dom = self.dom;
        let Some(NodeData::Element { name, attrs, .. }) = dom.get(id).map(|n| &n.data) else {
            return;
        };

        if let Some(reason) = self.options.navigation.exclusion(dom, id) {
            log::trace!("dropping <{}> ({reason:?})", name.local);
            self.dropped += 1;
            return;
        }

        let local = name.local.as_ref();
        let tag = element_tag(local);
        if tag != local {
            log::trace!("writing <{local}> as <{tag}>");
        }

        self.out.push('<');
        self.out.push_str(&tag);

        if name.ns != *parent_ns {
            if name.ns == ns!(svg) {
                self.out
                    .push_str(&format!(" xmlns=\"{SVG_NS}\" xmlns:xlink=\"{XLINK_NS}\""));
            } else if name.ns == ns!(mathml) {
                self.out.push_str(&format!(" xmlns=\"{MATHML_NS}\""));
            } else if name.ns == ns!(html) {
                self.out.push_str(&format!(" xmlns=\"{XHTML_NS}\""));
            }
        }

        self.write_attributes(&name.ns, local, attrs);

        let is_html = name.ns == ns!(html);
        if is_html && VOID_ELEMENTS.contains(&local) {
            self.out.push_str("/>");
            return;
        }
        if !is_html && dom.children(id).next().is_none() {
            self.out.push_str("/>");
            return;
        }

        self.out.push('>');
        self.write_children(id, &name.ns);
        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn write_attributes(&mut self, element_ns: &Namespace, element: &str, attrs: &[Attribute]) {
        let is_html = *element_ns == ns!(html);

        for attr in attrs {
            let local = attr.name.local.as_ref();
            let qualified = if attr.name.ns == ns!(xlink) {
                format!("xlink:{local}")
            } else if attr.name.ns == ns!(xml) {
                format!("xml:{local}")
            } else if attr.name.ns == ns!() {
                if local == "xmlns" || local.starts_with("xmlns:") {
                    continue;
                }
                if local.contains(':') && !local.starts_with("xml:") {
                    continue;
                }
                local.to_string()
            } else {
                continue;
            };
            if !is_xml_name(&qualified) {
                log::trace!("dropping attribute {qualified:?} on <{element}>");
                continue;
            }

            let value = match (is_html, element, local) {
                (true, "img", "src") => self.image_reference(&attr.value),
                (false, "image", "href") => self.image_reference(&attr.value),
                (true, "a", "href") => rewrite_page_link(&attr.value),
                _ => None,
            };
            let value = value.as_deref().unwrap_or(&attr.value);

            self.out.push(' ');
            self.out.push_str(&qualified);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(value));
            self.out.push('"');
        }
    }

    /// Point a local image reference at the package image directory,
    /// recording the package path. External references stay untouched.
    fn image_reference(&mut self, src: &str) -> Option<String> {
        let package_path = package_image_path(src, self.options.image_prefix.as_deref())?;
        let rewritten = format!("../{}", encode_href(&package_path));
        if !self.images.contains(&package_path) {
            self.images.push(package_path);
        }
        Some(rewritten)
    }
}

/// Package path (`images/...`) for a local image reference.
pub(crate) fn package_image_path(src: &str, prefix: Option<&str>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with('#') || is_external_reference(src) {
        return None;
    }

    let path = src.split(['?', '#']).next().unwrap_or(src);
    let path = normalize_relative_path(&decode_href(path))?;
    let path = match prefix {
        Some(prefix) => path
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or(path),
        None => path,
    };

    Some(format!("{}/{}", crate::epub::IMAGES_DIR, path))
}

/// `chapter2.html#sec` becomes `chapter2.xhtml#sec`; anything else is left
/// alone.
fn rewrite_page_link(href: &str) -> Option<String> {
    if href.starts_with('#') || is_external_reference(href) {
        return None;
    }

    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };
    let lower = path.to_ascii_lowercase();
    let stem_len = if lower.ends_with(".html") {
        path.len() - 5
    } else if lower.ends_with(".htm") {
        path.len() - 4
    } else {
        return None;
    };

    let mut rewritten = format!("{}.xhtml", &path[..stem_len]);
    if let Some(fragment) = fragment {
        rewritten.push('#');
        rewritten.push_str(fragment);
    }
    Some(rewritten)
}

/// Element name to write. Prefixed names from word processors (`o:p`,
/// `st1:place`) keep their attributes under a hyphenated name; anything else
/// that is not an XML name becomes a `span`.
fn element_tag(local: &str) -> Cow<'_, str> {
    if is_xml_name(local) && !local.contains(':') {
        return Cow::Borrowed(local);
    }
    let hyphenated = local.replace(':', "-");
    if is_xml_name(&hyphenated) {
        Cow::Owned(hyphenated)
    } else {
        Cow::Borrowed("span")
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}
