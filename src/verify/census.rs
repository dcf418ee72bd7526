//! Counting classes, inline styles and images on both sides of a conversion.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::convert::NavigationFilter;
use crate::dom::{Dom, NodeId};
use crate::util::resolve_entity;

/// Body-scoped counts that conversion must preserve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Census {
    /// Class tokens across all `class` attributes.
    pub classes: usize,
    /// Elements carrying a `style` attribute.
    pub inline_styles: usize,
    /// `<img>` elements.
    pub images: usize,
}

impl Census {
    fn record(&mut self, classes: usize, has_style: bool, is_image: bool) {
        self.classes += classes;
        self.inline_styles += usize::from(has_style);
        self.images += usize::from(is_image);
    }
}

/// Count a parsed source page. Returns the counts conversion is expected to
/// keep and, separately, what sits inside excluded subtrees.
pub(crate) fn count_source(dom: &Dom, filter: &NavigationFilter) -> (Census, Census) {
    let mut kept = Census::default();
    let mut excluded = Census::default();
    let Some(body) = dom.body() else {
        return (kept, excluded);
    };

    let mut stack: Vec<(NodeId, bool)> = vec![(body, false)];
    while let Some((id, inside_excluded)) = stack.pop() {
        if !dom.is_element(id) {
            continue;
        }

        let dropped = inside_excluded || filter.exclusion(dom, id).is_some();
        let target = if dropped { &mut excluded } else { &mut kept };
        target.record(
            dom.element_classes(id).len(),
            dom.get_attr(id, "style").is_some(),
            dom.element_name(id).is_some_and(|n| n.as_ref() == "img"),
        );

        stack.extend(dom.children(id).map(|child| (child, dropped)));
    }

    (kept, excluded)
}

/// Count a converted XHTML page, checking well-formedness on the way.
///
/// The error string describes the first structural problem found.
pub(crate) fn count_converted(markup: &str) -> Result<Census, String> {
    let mut reader = Reader::from_str(markup);
    let mut census = Census::default();
    let mut depth = 0usize;
    let mut roots = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut saw_body = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    roots += 1;
                    check_root(&e)?;
                }
                depth += 1;
                if body_depth.is_none() && e.local_name().as_ref() == b"body" {
                    body_depth = Some(depth);
                    saw_body = true;
                }
                let in_body = body_depth.is_some();
                count_element(&e, in_body, &mut census)?;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    roots += 1;
                    check_root(&e)?;
                }
                let is_body = e.local_name().as_ref() == b"body";
                saw_body |= is_body;
                count_element(&e, body_depth.is_some() || is_body, &mut census)?;
            }
            Ok(Event::End(_)) => {
                if body_depth == Some(depth) {
                    body_depth = None;
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "closing tag without matching start".to_string())?;
            }
            Ok(Event::Text(text)) => {
                if text.contains(&b'&') {
                    return Err("unescaped '&' in text".into());
                }
                if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) {
                    return Err("text outside the root element".into());
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                let name = String::from_utf8_lossy(reference.as_ref());
                if resolve_entity(&name).is_none() {
                    return Err(format!("undefined entity '&{name};'"));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!("{e} (at byte {})", reader.buffer_position()));
            }
        }
    }

    if depth != 0 {
        return Err(format!("{depth} element(s) left unclosed"));
    }
    if roots != 1 {
        return Err(format!("expected one root element, found {roots}"));
    }
    if !saw_body {
        return Err("no body element".into());
    }

    Ok(census)
}

fn check_root(e: &BytesStart<'_>) -> Result<(), String> {
    if e.local_name().as_ref() == b"html" {
        Ok(())
    } else {
        Err(format!(
            "root element is <{}>, not <html>",
            String::from_utf8_lossy(e.name().as_ref())
        ))
    }
}

fn count_element(e: &BytesStart<'_>, in_body: bool, census: &mut Census) -> Result<(), String> {
    let mut classes = 0;
    let mut has_style = false;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute: {err}"))?;
        check_attribute_value(&attr.value)?;
        match attr.key.as_ref() {
            b"class" => {
                classes = String::from_utf8_lossy(&attr.value).split_whitespace().count();
            }
            b"style" => has_style = true,
            _ => {}
        }
    }

    if in_body {
        census.record(classes, has_style, e.local_name().as_ref() == b"img");
    }
    Ok(())
}

/// Attribute values may not contain `<` and every `&` must start a known
/// reference.
fn check_attribute_value(value: &[u8]) -> Result<(), String> {
    if value.contains(&b'<') {
        return Err("'<' in attribute value".into());
    }

    let mut rest = value;
    while let Some(amp) = memchr::memchr(b'&', rest) {
        let after = &rest[amp + 1..];
        let Some(semi) = memchr::memchr(b';', after) else {
            return Err("unescaped '&' in attribute value".into());
        };
        let name = String::from_utf8_lossy(&after[..semi]);
        if resolve_entity(&name).is_none() {
            return Err(format!("undefined entity '&{name};' in attribute value"));
        }
        rest = &after[semi + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    const SHELL_START: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title class=\"ignored\">t</title></head>";

    fn page(body: &str) -> String {
        format!("{SHELL_START}{body}</html>")
    }

    #[test]
    fn test_source_counts_split_kept_and_excluded() {
        let dom = parse_html(
            r#"<head><style class="x"></style></head><body class="a b">
            <p style="color:red" class="c">x</p><img src="a.png">
            <nav class="menu"><img src="logo.png" style="w"></nav></body>"#,
        );
        let (kept, excluded) = count_source(&dom, &NavigationFilter::default());

        assert_eq!(
            kept,
            Census {
                classes: 3,
                inline_styles: 1,
                images: 1
            }
        );
        assert_eq!(
            excluded,
            Census {
                classes: 1,
                inline_styles: 1,
                images: 1
            }
        );
    }

    #[test]
    fn test_converted_counts() {
        let census = count_converted(&page(
            r#"<body class="a b"><p style="x" class="c  d">t &amp; &#x41;</p><img src="i.png"/></body>"#,
        ))
        .unwrap();
        assert_eq!(
            census,
            Census {
                classes: 4,
                inline_styles: 1,
                images: 1
            }
        );
    }

    #[test]
    fn test_malformed_converted_markup() {
        let cases = [
            page("<body><p>unclosed</body>"),
            page("<body><p a=\"1\" a=\"2\">dup</p></body>"),
            page("<body><p a=1>unquoted</p></body>"),
            page("<body><p>&nbsp;</p></body>"),
            page("<body><p title=\"&bogus;\">x</p></body>"),
            page("<body><p>a & b</p></body>"),
            format!("{}<body></body></html><html></html>", SHELL_START),
            page("<div>no body</div>"),
            "<body></body>".to_string(),
        ];

        for case in cases {
            assert!(count_converted(&case).is_err(), "accepted: {case}");
        }
    }
}
