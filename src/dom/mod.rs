//! HTML parsing into an arena DOM.
//!
//! Manuscript pages are written for browsers, so they are parsed with
//! html5ever's browser-compatible tree builder rather than an XML parser.

mod arena;
mod tree_sink;

pub use arena::{Attribute, Children, Dom, Node, NodeData, NodeId};
pub use tree_sink::DomSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::QuirksMode;

/// Parse an HTML document.
///
/// Never fails: malformed markup is repaired the way a browser would.
pub fn parse_html(html: &str) -> Dom {
    let sink = parse_document(DomSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());

    if sink.parse_errors() > 0 {
        log::debug!("recovered from {} HTML parse errors", sink.parse_errors());
    }
    if sink.quirks_mode() == QuirksMode::Quirks {
        log::debug!("document parsed in quirks mode (missing doctype?)");
    }

    sink.into_dom()
}

impl Dom {
    /// The `<body>` element; html5ever always synthesizes one.
    pub fn body(&self) -> Option<NodeId> {
        self.find_by_tag("body")
    }

    /// The `<head>` element.
    pub fn head(&self) -> Option<NodeId> {
        self.find_by_tag("head")
    }

    /// The `<html>` root element.
    pub fn root(&self) -> Option<NodeId> {
        self.children(self.document())
            .find(|&id| self.element_name(id).is_some_and(|n| n.as_ref() == "html"))
    }
}
