//! Reading container.xml and the package document back for validation.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::util::resolve_entity;

/// A manifest `<item>` as found in a package document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ManifestRecord {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// The parts of a package document the validator looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PackageData {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub publishers: Vec<String>,
    pub dates: Vec<String>,
    pub languages: Vec<String>,
    pub subjects: Vec<String>,
    pub descriptions: Vec<String>,
    pub identifiers: Vec<String>,
    /// `content` of `<meta name="cover">`.
    pub cover_id: Option<String>,
    pub manifest: Vec<ManifestRecord>,
    pub spine: Vec<String>,
}

/// Find the package document path in META-INF/container.xml.
pub(crate) fn parse_container_xml(bytes: &[u8]) -> Result<String, String> {
    let content = std::str::from_utf8(strip_bom(bytes)).map_err(|e| e.to_string())?;
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    Err("no rootfile in container.xml".into())
}

/// Parse a package document.
pub(crate) fn parse_opf(bytes: &[u8]) -> Result<PackageData, String> {
    let content = std::str::from_utf8(strip_bom(bytes)).map_err(|e| e.to_string())?;
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut data = PackageData::default();
    let mut in_metadata = false;
    let mut current: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"title" | b"creator" | b"publisher" | b"date" | b"language" | b"subject"
                    | b"description" | b"identifier"
                        if in_metadata =>
                    {
                        current = Some(local.to_vec());
                        text.clear();
                    }
                    _ => record_empty(&e, local, in_metadata, &mut data),
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                record_empty(&e, local_name(name.as_ref()), in_metadata, &mut data);
            }
            Ok(Event::Text(e)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }
                if current.as_deref() == Some(local) {
                    let value = text.trim().to_string();
                    let target = match local {
                        b"title" => &mut data.titles,
                        b"creator" => &mut data.creators,
                        b"publisher" => &mut data.publishers,
                        b"date" => &mut data.dates,
                        b"language" => &mut data.languages,
                        b"subject" => &mut data.subjects,
                        b"description" => &mut data.descriptions,
                        _ => &mut data.identifiers,
                    };
                    target.push(value);
                    current = None;
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("{e} (at byte {})", reader.buffer_position())),
            _ => {}
        }
    }

    Ok(data)
}

/// Manifest items, spine refs and the cover meta, whether written as empty
/// elements or as start/end pairs.
fn record_empty(e: &BytesStart<'_>, local: &[u8], in_metadata: bool, data: &mut PackageData) {
    match local {
        b"item" => {
            let id = attribute(e, b"id").unwrap_or_default();
            if !id.is_empty() {
                data.manifest.push(ManifestRecord {
                    id,
                    href: attribute(e, b"href").unwrap_or_default(),
                    media_type: attribute(e, b"media-type").unwrap_or_default(),
                    properties: attribute(e, b"properties"),
                });
            }
        }
        b"itemref" => {
            if let Some(idref) = attribute(e, b"idref") {
                data.spine.push(idref);
            }
        }
        b"meta" if in_metadata => {
            if attribute(e, b"name").as_deref() == Some("cover")
                && let Some(content) = attribute(e, b"content")
            {
                data.cover_id = Some(content);
            }
        }
        _ => {}
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape(&String::from_utf8_lossy(&a.value)))
}

/// Resolve entity references in an attribute value.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) => {
                match resolve_entity(&after[..semi]) {
                    Some(resolved) => out.push_str(&resolved),
                    None => out.push_str(&rest[amp..amp + semi + 2]),
                }
                rest = &after[semi + 1..];
            }
            None => {
                out.push_str(&rest[amp..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Local part of a namespaced XML name (`dc:title` -> `title`).
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
