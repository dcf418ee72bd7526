//! Small shared helpers: text decoding, media types, XML escaping.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Decode manuscript bytes to a string.
///
/// A byte order mark (UTF-8 or UTF-16) decides the encoding outright.
/// Otherwise UTF-8 is tried first, then the encoding named in a
/// `<meta charset>` or XML declaration, then Windows-1252, which is what
/// hand-edited HTML saved by older editors usually turns out to be.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (result, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return result;
    }

    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(label) = sniff_charset(bytes)
        && let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Find a `charset=` or `encoding=` label in the first kilobyte.
fn sniff_charset(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(1024)];

    for needle in [&b"charset="[..], &b"encoding="[..]] {
        let Some(pos) = prefix
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle))
        else {
            continue;
        };
        let rest = &prefix[pos + needle.len()..];
        let rest = rest.strip_prefix(b"\"").or_else(|| rest.strip_prefix(b"'")).unwrap_or(rest);
        let end = rest
            .iter()
            .position(|&b| !(b.is_ascii_alphanumeric() || b == b'-' || b == b'_'))
            .unwrap_or(rest.len());
        if end > 0 {
            return std::str::from_utf8(&rest[..end]).ok();
        }
    }

    None
}

// ============================================================================
// Media Types
// ============================================================================

/// Media formats a manuscript package carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    WebP,
    Css,
    Ttf,
    Otf,
    Woff,
    Woff2,
    Xhtml,
}

impl MediaFormat {
    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Css => "text/css",
            MediaFormat::Ttf => "font/ttf",
            MediaFormat::Otf => "font/otf",
            MediaFormat::Woff => "font/woff",
            MediaFormat::Woff2 => "font/woff2",
            MediaFormat::Xhtml => "application/xhtml+xml",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            MediaFormat::Jpeg
                | MediaFormat::Png
                | MediaFormat::Gif
                | MediaFormat::Svg
                | MediaFormat::WebP
        )
    }
}

/// Detect a media format from the file extension, falling back to magic
/// bytes for the raster image formats.
pub fn detect_media_format(path: &str, data: &[u8]) -> Option<MediaFormat> {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let by_extension = match extension.as_str() {
        "jpg" | "jpeg" => Some(MediaFormat::Jpeg),
        "png" => Some(MediaFormat::Png),
        "gif" => Some(MediaFormat::Gif),
        "svg" => Some(MediaFormat::Svg),
        "webp" => Some(MediaFormat::WebP),
        "css" => Some(MediaFormat::Css),
        "ttf" => Some(MediaFormat::Ttf),
        "otf" => Some(MediaFormat::Otf),
        "woff" => Some(MediaFormat::Woff),
        "woff2" => Some(MediaFormat::Woff2),
        "xhtml" => Some(MediaFormat::Xhtml),
        _ => None,
    };
    if by_extension.is_some() {
        return by_extension;
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(MediaFormat::Jpeg);
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(MediaFormat::Png);
    }
    if data.starts_with(b"GIF8") {
        return Some(MediaFormat::Gif);
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(MediaFormat::WebP);
    }

    None
}

// ============================================================================
// XML Helpers
// ============================================================================

/// Escape text for an XML attribute value or text node.
///
/// Characters XML 1.0 does not allow are removed.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// Whether `c` may appear in an XML 1.0 document at all.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Whether `name` is usable as an XML attribute or element name.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Resolve the five predefined XML entities and numeric character references.
pub fn resolve_entity(name: &str) -> Option<String> {
    match name {
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "amp" => Some("&".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code).map(String::from)
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Characters escaped when a package path is written into an `href`.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Normalize a relative path to forward-slash form.
///
/// `.` segments and empty segments vanish, `..` pops the previous segment and
/// a `..` with nothing left to pop is dropped. Returns `None` when nothing
/// remains.
pub fn normalize_relative_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Percent-encode a package path for use in an `href`/`src` attribute.
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF).to_string()
}

/// Decode a percent-encoded `href` back into a package path.
pub fn decode_href(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Whether a reference points outside the package: absolute paths,
/// protocol-relative URLs and anything with a scheme (`https:`, `data:`).
pub fn is_external_reference(reference: &str) -> bool {
    if reference.starts_with('/') || reference.starts_with('\\') {
        return true;
    }

    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Turn a publication date into an EPUB 3 `dcterms:modified` timestamp.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or a full timestamp; anything
/// else yields `None`.
pub fn modified_timestamp(date: &str) -> Option<String> {
    let date = date.trim();
    let date_part = date.split_once('T').map_or(date, |(d, _)| d);
    let parts: Vec<&str> = date_part.split('-').collect();

    let numeric = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    let (year, month, day) = match parts.as_slice() {
        [y] if numeric(y, 4) => (*y, "01", "01"),
        [y, m] if numeric(y, 4) && numeric(m, 2) => (*y, *m, "01"),
        [y, m, d] if numeric(y, 4) && numeric(m, 2) && numeric(d, 2) => (*y, *m, *d),
        _ => return None,
    };

    Some(format!("{year}-{month}-{day}T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_passthrough() {
        assert_eq!(decode_text("Café".as_bytes()), "Café");
    }

    #[test]
    fn test_decode_falls_back_to_cp1252() {
        // 0x93/0x94 are curly quotes in Windows-1252 and invalid UTF-8
        let bytes = b"<p>\x93quoted\x94</p>";
        assert_eq!(decode_text(bytes), "<p>\u{201C}quoted\u{201D}</p>");
    }

    #[test]
    fn test_decode_uses_declared_charset() {
        let bytes = b"<meta charset=\"iso-8859-2\"><p>\xB1</p>";
        assert!(decode_text(bytes).contains('\u{0105}'));
    }

    #[test]
    fn test_detect_media_format() {
        assert_eq!(detect_media_format("cover.JPG", &[]), Some(MediaFormat::Jpeg));
        assert_eq!(detect_media_format("style.css", &[]), Some(MediaFormat::Css));
        assert_eq!(detect_media_format("font.woff2", &[]), Some(MediaFormat::Woff2));
        assert_eq!(
            detect_media_format("noext", &[0x89, b'P', b'N', b'G', 0x0D]),
            Some(MediaFormat::Png)
        );
        assert_eq!(detect_media_format("notes.txt", b"hello"), None);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("<test>"), "&lt;test&gt;");
        assert_eq!(escape_xml("A & B"), "A &amp; B");
        assert_eq!(escape_xml("\"q\""), "&quot;q&quot;");
        assert_eq!(escape_xml("One\u{1}Two\u{FFFE}"), "OneTwo");
        assert_eq!(escape_xml("tab\there"), "tab\there");
    }

    #[test]
    fn test_xml_names() {
        assert!(is_xml_name("class"));
        assert!(is_xml_name("data-role"));
        assert!(is_xml_name("xml:lang"));
        assert!(!is_xml_name("@click"));
        assert!(!is_xml_name("1abc"));
        assert!(!is_xml_name(""));
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#65").as_deref(), Some("A"));
        assert_eq!(resolve_entity("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_normalize_relative_path() {
        assert_eq!(
            normalize_relative_path("../images/./a//b.jpg").as_deref(),
            Some("images/a/b.jpg")
        );
        assert_eq!(normalize_relative_path("a/../b.png").as_deref(), Some("b.png"));
        assert_eq!(normalize_relative_path("a\\b.png").as_deref(), Some("a/b.png"));
        assert_eq!(normalize_relative_path("../.."), None);
    }

    #[test]
    fn test_href_encoding() {
        assert_eq!(encode_href("images/my cover.jpg"), "images/my%20cover.jpg");
        assert_eq!(decode_href("images/my%20cover.jpg"), "images/my cover.jpg");
        assert_eq!(encode_href("Text/ch1.xhtml"), "Text/ch1.xhtml");
    }

    #[test]
    fn test_external_references() {
        assert!(is_external_reference("https://example.com/a.png"));
        assert!(is_external_reference("data:image/png;base64,AAAA"));
        assert!(is_external_reference("//cdn.example.com/a.png"));
        assert!(is_external_reference("/abs/a.png"));
        assert!(!is_external_reference("images/a.png"));
        assert!(!is_external_reference("../a.png"));
        assert!(!is_external_reference("weird/pa:th.png"));
    }

    #[test]
    fn test_modified_timestamp() {
        assert_eq!(modified_timestamp("2025").as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(
            modified_timestamp("2025-03-14").as_deref(),
            Some("2025-03-14T00:00:00Z")
        );
        assert_eq!(
            modified_timestamp("2022-05-26T16:26:51Z").as_deref(),
            Some("2022-05-26T00:00:00Z")
        );
        assert_eq!(modified_timestamp("spring 2025"), None);
    }
}
