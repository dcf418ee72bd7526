use std::collections::HashSet;
use std::io::{Cursor, Write};

use bindery::epub::{StructuralIssue, validate_archive};
use bindery::{
    Asset, BookMetadata, Error, PackageArchive, ReadingOrder, SourceDocument, VerificationReport,
    VerifiedDocuments, Verifier, convert, package,
};
use proptest::prelude::*;
use zip::write::SimpleFileOptions;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn metadata() -> BookMetadata {
    BookMetadata::new("The Long Road")
        .with_subtitle("A Novel")
        .with_author("A. Writer")
        .with_publisher("Small Press")
        .with_publication_date("2024-05-01")
        .with_cover_image("cover.jpg")
        .with_tag("fiction")
        .with_tag("travel")
        .with_description("Two friends & a car.")
}

fn assets() -> Vec<Asset> {
    vec![
        Asset::image("cover.jpg", JPEG.to_vec()),
        Asset::image("maps/route.png", PNG.to_vec()),
        Asset::stylesheet("book.css", b"body { margin: 0 }".to_vec()),
    ]
}

fn verified(pages: &[(String, String)]) -> VerifiedDocuments {
    let verifier = Verifier::default();
    let mut report = VerificationReport::new();
    let mut converted = Vec::new();
    for (id, markup) in pages {
        let source = SourceDocument::parse(id.as_str(), markup.as_str()).expect("source");
        let doc = convert(&source).expect("convert");
        report.push(verifier.verify(&source, &doc));
        converted.push(doc);
    }
    report.gate(converted).expect("gate")
}

fn chapters(n: usize) -> Vec<(String, String)> {
    (1..=n)
        .map(|i| {
            (
                format!("chapter{i}"),
                format!(
                    r#"<html><head><title>Chapter {i}</title></head><body><h1 class="title">Chapter {i}</h1>
                    <p style="text-indent:0">Text.</p><img src="images/maps/route.png"></body></html>"#
                ),
            )
        })
        .collect()
}

fn text(archive: &PackageArchive, path: &str) -> String {
    String::from_utf8(archive.entry(path).expect(path).data.clone()).unwrap()
}

fn attribute_values(xml: &str, prefix: &str) -> Vec<String> {
    xml.lines()
        .filter_map(|l| l.trim().strip_prefix(prefix))
        .filter_map(|l| l.split('"').next())
        .map(str::to_string)
        .collect()
}

fn spine(archive: &PackageArchive) -> Vec<String> {
    attribute_values(&text(archive, "OEBPS/content.opf"), "<itemref idref=\"")
}

#[test]
fn test_full_book_round_trips_through_zip() {
    let docs = verified(&chapters(3));
    let order = ReadingOrder::new(["cover", "titlepage", "toc", "chapter1", "chapter2", "chapter3"]);
    let archive = package(&docs, &metadata(), &order, &assets()).unwrap();

    let bytes = archive.to_bytes().unwrap();
    assert_eq!(&bytes[30..38], b"mimetype");

    let reread = PackageArchive::read_from(Cursor::new(bytes)).unwrap();
    assert_eq!(reread.len(), archive.len());
    let report = validate_archive(&reread);
    assert!(report.is_pass(), "{:?}", report.issues());

    assert_eq!(
        spine(&reread),
        ["cover", "titlepage", "toc", "chapter1", "chapter2", "chapter3"]
    );

    let ncx = text(&reread, "OEBPS/toc.ncx");
    assert_eq!(ncx.matches("<navPoint ").count(), 6);
    assert!(ncx.contains("<text>Chapter 2</text>"));

    let opf = text(&reread, "OEBPS/content.opf");
    assert!(opf.contains("<dc:description>Two friends &amp; a car.</dc:description>"));
    assert!(opf.contains(r#"href="images/maps/route.png""#));
    assert!(opf.contains("<guide>"));

    let cover = text(&reread, "OEBPS/Text/cover.xhtml");
    assert!(cover.contains("../images/cover.jpg"));
    let title = text(&reread, "OEBPS/Text/titlepage.xhtml");
    assert!(title.contains("A Novel"));
}

#[test]
fn test_packaging_is_deterministic() {
    let docs = verified(&chapters(2));
    let order = ReadingOrder::new(["cover", "chapter1", "chapter2"]);

    let first = package(&docs, &metadata(), &order, &assets()).unwrap().to_bytes().unwrap();
    let second = package(&docs, &metadata(), &order, &assets()).unwrap().to_bytes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_identifier_prefers_isbn() {
    let docs = verified(&chapters(1));
    let order = ReadingOrder::new(["chapter1"]);

    let archive = package(&docs, &metadata(), &order, &assets()).unwrap();
    assert!(text(&archive, "OEBPS/content.opf").contains(">urn:uuid:"));

    let archive = package(&docs, &metadata().with_isbn("9780000000002"), &order, &assets()).unwrap();
    let opf = text(&archive, "OEBPS/content.opf");
    assert!(opf.contains(r#"<dc:identifier id="book-id">urn:isbn:9780000000002</dc:identifier>"#));
    assert!(text(&archive, "OEBPS/toc.ncx").contains("urn:isbn:9780000000002"));
}

#[test]
fn test_order_problems_are_rejected() {
    let docs = verified(&chapters(2));
    let cases = [
        ReadingOrder::new(["chapter1"]),
        ReadingOrder::new(["chapter1", "chapter2", "chapter1"]),
        ReadingOrder::new(["chapter1", "chapter2", "epilogue"]),
        ReadingOrder::default(),
    ];
    for order in cases {
        let err = package(&docs, &metadata(), &order, &assets()).unwrap_err();
        assert!(matches!(err, Error::OrderMismatch(_)), "{order:?}: {err}");
    }
}

#[test]
fn test_oversized_cover_is_rejected() {
    let docs = verified(&chapters(1));
    let mut big = JPEG.to_vec();
    big.resize(5 * 1024 * 1024 + 1, 0);
    let assets = vec![Asset::image("cover.jpg", big)];

    let err = package(&docs, &metadata(), &ReadingOrder::new(["chapter1"]), &assets).unwrap_err();
    assert!(matches!(err, Error::InvalidCover(_)));
}

#[test]
fn test_validator_flags_compressed_mimetype() {
    let docs = verified(&chapters(1));
    let archive = package(&docs, &metadata(), &ReadingOrder::new(["chapter1"]), &assets()).unwrap();

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for entry in archive.entries() {
        if entry.path == "OEBPS/Text/chapter1.xhtml" {
            continue;
        }
        writer.start_file(entry.path.as_str(), deflated).unwrap();
        writer.write_all(&entry.data).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();

    let broken = PackageArchive::read_from(Cursor::new(bytes)).unwrap();
    let report = validate_archive(&broken);

    assert!(!report.is_pass());
    assert!(report.issues().contains(&StructuralIssue::MimetypeCompressed));
    assert!(report.issues().iter().any(|i| matches!(
        i,
        StructuralIssue::MissingEntry { id, .. } if id == "chapter1"
    )));
    assert!(matches!(
        report.into_result(),
        Err(Error::StructuralValidation { .. })
    ));
}

#[test]
fn test_front_matter_then_chapters() {
    let pages: Vec<(String, String)> = ["intro", "ch1", "ch2", "concl"]
        .iter()
        .map(|id| (id.to_string(), format!("<h1>{id}</h1><p class=\"a b c\" style=\"color: red\">x</p>")))
        .collect();
    let docs = verified(&pages);
    let order = ReadingOrder::new(["cover", "titlepage", "toc", "intro", "ch1", "ch2", "concl"]);
    let archive = package(&docs, &metadata(), &order, &assets()).unwrap();

    assert_eq!(
        spine(&archive),
        ["cover", "titlepage", "toc", "intro", "ch1", "ch2", "concl"]
    );
    let chapter = text(&archive, "OEBPS/Text/ch1.xhtml");
    assert!(chapter.contains(r#"<p class="a b c" style="color: red">x</p>"#));
}

#[test]
fn test_missing_author_fails_before_assembly() {
    let docs = verified(&chapters(1));
    let mut meta = metadata();
    meta.author = String::new();

    let err = package(&docs, &meta, &ReadingOrder::new(["chapter1"]), &assets()).unwrap_err();
    match err {
        Error::IncompleteMetadata { missing } => assert_eq!(missing, ["author"]),
        e => panic!("unexpected error: {e}"),
    }
}

#[test]
fn test_same_file_name_in_different_directories() {
    let docs = verified(&chapters(1));
    let mut assets = assets();
    assets.push(Asset::image("a/fig.png", PNG.to_vec()));
    assets.push(Asset::image("b/fig.png", PNG.to_vec()));
    let archive = package(&docs, &metadata(), &ReadingOrder::new(["chapter1"]), &assets).unwrap();

    let opf = text(&archive, "OEBPS/content.opf");
    let ids = attribute_values(&opf, "<item id=\"");
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert!(archive.contains("OEBPS/images/a/fig.png"));
    assert!(archive.contains("OEBPS/images/b/fig.png"));
    assert!(validate_archive(&archive).is_pass());
}

fn book_layout() -> impl Strategy<Value = (usize, Vec<String>)> {
    (1usize..6, any::<bool>(), any::<bool>()).prop_flat_map(|(n, cover, contents)| {
        let ids: Vec<String> = (1..=n).map(|i| format!("chapter{i}")).collect();
        Just(ids).prop_shuffle().prop_map(move |shuffled| {
            let mut order = Vec::new();
            if cover {
                order.push("cover".to_string());
            }
            if contents {
                order.push("toc".to_string());
            }
            order.extend(shuffled);
            (n, order)
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_spine_follows_reading_order((n, order) in book_layout()) {
        let docs = verified(&chapters(n));
        let reading_order = ReadingOrder::new(order.clone());
        let archive = package(&docs, &metadata(), &reading_order, &assets()).unwrap();

        prop_assert_eq!(spine(&archive), order.clone());

        let opf = text(&archive, "OEBPS/content.opf");
        let ids = attribute_values(&opf, "<item id=\"");
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());

        let ncx = text(&archive, "OEBPS/toc.ncx");
        prop_assert_eq!(ncx.matches("<navPoint ").count(), order.len());

        let report = validate_archive(&archive);
        prop_assert!(report.is_pass(), "{:?}", report.issues());
    }
}

#[test]
fn test_control_characters_never_reach_package_xml() {
    let pages = vec![(
        "chapter1".to_string(),
        "<html><head><title>One\u{1}Two</title></head><body><p>x</p></body></html>".to_string(),
    )];
    let docs = verified(&pages);
    let mut meta = metadata();
    meta.description = "Bell\u{7} and backspace\u{8}".to_string();
    let order = ReadingOrder::new(["toc", "chapter1"]);
    let archive = package(&docs, &meta, &order, &assets()).unwrap();

    for path in [
        "OEBPS/nav.xhtml",
        "OEBPS/toc.ncx",
        "OEBPS/content.opf",
        "OEBPS/Text/toc.xhtml",
        "OEBPS/Text/chapter1.xhtml",
    ] {
        let xml = text(&archive, path);
        assert!(!xml.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')), "{path}");
    }
    assert!(text(&archive, "OEBPS/toc.ncx").contains("<text>OneTwo</text>"));
    assert!(validate_archive(&archive).is_pass());
}
