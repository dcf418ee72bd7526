//! Conversion verification.
//!
//! Every converted page is compared against its source: class tokens,
//! inline style attributes and images inside the body must survive
//! conversion one for one (navigation-only subtrees aside), and the XHTML
//! must be well-formed. The resulting [`VerificationReport`] gates
//! packaging: only [`VerificationReport::gate`] produces the
//! [`VerifiedDocuments`] the packager accepts.

mod census;

use std::fmt;

use serde::Serialize;

pub use census::Census;

use crate::book::{ConvertedDocument, SourceDocument};
use crate::convert::NavigationFilter;
use crate::error::{Error, Result};

/// Why a document failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MismatchReason {
    ClassCount { source: usize, converted: usize },
    InlineStyleCount { source: usize, converted: usize },
    ImageCount { source: usize, converted: usize },
    StructuralMalformation { detail: String },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::ClassCount { source, converted } => {
                write!(f, "class count {source} -> {converted}")
            }
            MismatchReason::InlineStyleCount { source, converted } => {
                write!(f, "inline style count {source} -> {converted}")
            }
            MismatchReason::ImageCount { source, converted } => {
                write!(f, "image count {source} -> {converted}")
            }
            MismatchReason::StructuralMalformation { detail } => {
                write!(f, "malformed: {detail}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// Verification result for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub document: String,
    pub status: Status,
    /// Counts expected to survive conversion.
    pub source: Census,
    /// Counts found in the converted page; absent when it could not be read.
    pub converted: Option<Census>,
    /// Counts inside navigation-only and script subtrees.
    pub excluded: Census,
    pub failures: Vec<MismatchReason>,
}

impl ReportEntry {
    fn new(
        document: String,
        source: Census,
        converted: Option<Census>,
        excluded: Census,
        failures: Vec<MismatchReason>,
    ) -> Self {
        let status = if failures.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        Self {
            document,
            status,
            source,
            converted,
            excluded,
            failures,
        }
    }

    /// Entry for a document that never made it to conversion.
    pub fn malformed(document: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            document.into(),
            Census::default(),
            None,
            Census::default(),
            vec![MismatchReason::StructuralMalformation {
                detail: detail.into(),
            }],
        )
    }

    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Compares source and converted pages.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    filter: NavigationFilter,
}

impl Verifier {
    /// Use the same filter the converter ran with, or the counts will not
    /// line up.
    pub fn new(filter: NavigationFilter) -> Self {
        Self { filter }
    }

    pub fn verify(&self, source: &SourceDocument, converted: &ConvertedDocument) -> ReportEntry {
        let dom = source.dom();
        let (expected, excluded) = census::count_source(&dom, &self.filter);
        let mut failures = Vec::new();

        if source.id() != converted.id() {
            failures.push(MismatchReason::StructuralMalformation {
                detail: format!(
                    "converted document '{}' paired with source '{}'",
                    converted.id(),
                    source.id()
                ),
            });
        }

        let actual = match census::count_converted(converted.markup()) {
            Ok(actual) => {
                if expected.classes != actual.classes {
                    failures.push(MismatchReason::ClassCount {
                        source: expected.classes,
                        converted: actual.classes,
                    });
                }
                if expected.inline_styles != actual.inline_styles {
                    failures.push(MismatchReason::InlineStyleCount {
                        source: expected.inline_styles,
                        converted: actual.inline_styles,
                    });
                }
                if expected.images != actual.images {
                    failures.push(MismatchReason::ImageCount {
                        source: expected.images,
                        converted: actual.images,
                    });
                }
                Some(actual)
            }
            Err(detail) => {
                failures.push(MismatchReason::StructuralMalformation { detail });
                None
            }
        };

        let entry = ReportEntry::new(
            source.id().to_string(),
            expected,
            actual,
            excluded,
            failures,
        );
        if entry.is_pass() {
            log::debug!("{}: verified ({:?})", entry.document, entry.source);
        } else {
            for reason in &entry.failures {
                log::warn!("{}: {reason}", entry.document);
            }
        }
        entry
    }

    /// Verify a batch, pairing documents by id. A source with no converted
    /// counterpart fails.
    pub fn verify_all(
        &self,
        sources: &[SourceDocument],
        converted: &[ConvertedDocument],
    ) -> VerificationReport {
        let mut report = VerificationReport::new();
        for source in sources {
            match converted.iter().find(|c| c.id() == source.id()) {
                Some(doc) => report.push(self.verify(source, doc)),
                None => report.push(ReportEntry::malformed(source.id(), "no converted output")),
            }
        }
        report
    }
}

/// Verify one pair with the default navigation filter.
pub fn verify(source: &SourceDocument, converted: &ConvertedDocument) -> ReportEntry {
    Verifier::default().verify(source, converted)
}

/// Pass/fail record for a whole book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    documents: Vec<ReportEntry>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.documents.push(entry);
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.documents
    }

    pub fn entry(&self, document: &str) -> Option<&ReportEntry> {
        self.documents.iter().find(|e| e.document == document)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.documents.iter().filter(|e| !e.is_pass())
    }

    /// True when every recorded document passed.
    pub fn is_pass(&self) -> bool {
        self.documents.iter().all(ReportEntry::is_pass)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Release converted documents for packaging.
    ///
    /// Fails with `VerificationMismatch` naming every failed document and
    /// every converted document the report has no passing entry for.
    pub fn gate(&self, converted: Vec<ConvertedDocument>) -> Result<VerifiedDocuments> {
        let mut rejected: Vec<String> = self.failures().map(|e| e.document.clone()).collect();
        for doc in &converted {
            let verified = self.entry(doc.id()).is_some_and(ReportEntry::is_pass);
            if !verified && !rejected.iter().any(|r| r == doc.id()) {
                rejected.push(doc.id().to_string());
            }
        }

        if !rejected.is_empty() {
            return Err(Error::VerificationMismatch {
                documents: rejected,
            });
        }

        log::info!("verification passed for {} documents", converted.len());
        Ok(VerifiedDocuments {
            documents: converted,
        })
    }
}

/// Converted documents that passed verification. Only obtainable through
/// [`VerificationReport::gate`].
#[derive(Debug, Clone)]
pub struct VerifiedDocuments {
    documents: Vec<ConvertedDocument>,
}

impl VerifiedDocuments {
    pub fn iter(&self) -> std::slice::Iter<'_, ConvertedDocument> {
        self.documents.iter()
    }

    pub fn get(&self, id: &str) -> Option<&ConvertedDocument> {
        self.documents.iter().find(|d| d.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(ConvertedDocument::id).collect()
    }

    pub fn as_slice(&self) -> &[ConvertedDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<'a> IntoIterator for &'a VerifiedDocuments {
    type Item = &'a ConvertedDocument;
    type IntoIter = std::slice::Iter<'a, ConvertedDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert;

    fn pair(markup: &str) -> (SourceDocument, ConvertedDocument) {
        let source = SourceDocument::parse("chapter1", markup).unwrap();
        let converted = convert(&source).unwrap();
        (source, converted)
    }

    fn tampered(doc: &ConvertedDocument, from: &str, to: &str) -> ConvertedDocument {
        ConvertedDocument::new(
            doc.id().to_string(),
            doc.markup().replacen(from, to, 1),
            doc.title().to_string(),
            doc.images().to_vec(),
        )
    }

    const PAGE: &str = r#"<html><body class="chapter">
        <nav class="top"><a href="index.html">Home</a></nav>
        <p class="lead" style="margin: 0">x</p>
        <img src="images/a.jpg">
        <div class="nav-button"><img src="images/next.png"></div>
        </body></html>"#;

    #[test]
    fn test_faithful_conversion_passes() {
        let (source, converted) = pair(PAGE);
        let entry = verify(&source, &converted);

        assert!(entry.is_pass(), "{:?}", entry.failures);
        assert_eq!(entry.source.classes, 2);
        assert_eq!(entry.source.images, 1);
        assert_eq!(entry.excluded.images, 1);
        assert_eq!(entry.converted, Some(entry.source));
    }

    #[test]
    fn test_lost_class_is_reported() {
        let (source, converted) = pair(PAGE);
        let broken = tampered(&converted, "class=\"lead\"", "");
        let entry = verify(&source, &broken);

        assert_eq!(entry.status, Status::Fail);
        assert_eq!(
            entry.failures,
            vec![MismatchReason::ClassCount {
                source: 2,
                converted: 1
            }]
        );
    }

    #[test]
    fn test_lost_style_and_image_are_reported() {
        let (source, converted) = pair(PAGE);
        let broken = tampered(&converted, " style=\"margin: 0\"", "");
        let broken = tampered(&broken, "<img src=\"../images/a.jpg\"/>", "");
        let entry = verify(&source, &broken);

        assert!(entry.failures.contains(&MismatchReason::InlineStyleCount {
            source: 1,
            converted: 0
        }));
        assert!(entry.failures.contains(&MismatchReason::ImageCount {
            source: 1,
            converted: 0
        }));
    }

    #[test]
    fn test_malformed_output_is_reported() {
        let (source, converted) = pair(PAGE);
        let broken = tampered(&converted, "</p>", "");
        let entry = verify(&source, &broken);

        assert!(matches!(
            entry.failures.as_slice(),
            [MismatchReason::StructuralMalformation { .. }]
        ));
        assert_eq!(entry.converted, None);
    }

    #[test]
    fn test_gate() {
        let (source, converted) = pair(PAGE);
        let mut report = VerificationReport::new();
        report.push(verify(&source, &converted));

        let verified = report.gate(vec![converted.clone()]).unwrap();
        assert_eq!(verified.ids(), ["chapter1"]);

        report.push(ReportEntry::malformed("broken", "contains NUL bytes"));
        match report.gate(vec![converted]) {
            Err(Error::VerificationMismatch { documents }) => assert_eq!(documents, ["broken"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_gate_rejects_unverified_documents() {
        let (_, converted) = pair(PAGE);
        let report = VerificationReport::new();
        match report.gate(vec![converted]) {
            Err(Error::VerificationMismatch { documents }) => assert_eq!(documents, ["chapter1"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_report_serializes() {
        let (source, converted) = pair(PAGE);
        let mut report = VerificationReport::new();
        report.push(verify(&source, &converted));
        report.push(ReportEntry::malformed("bad", "empty"));

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"pass\""));
        assert!(json.contains("\"reason\": \"structural_malformation\""));
    }
}
