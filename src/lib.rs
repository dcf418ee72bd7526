//! # bindery
//!
//! Turns a directory of HTML manuscript pages into an EPUB that can be
//! uploaded to Kindle Direct Publishing.
//!
//! ## Features
//!
//! - Convert HTML pages to well-formed XHTML content documents
//! - Verify that nothing was lost: class, inline style and image counts must
//!   survive conversion, minus navigation chrome
//! - Package verified documents with metadata, cover, table of contents and
//!   assets into a deterministic EPUB 3 archive with EPUB 2 fallbacks
//! - Re-read the finished archive and check it structurally
//!
//! ## Quick Start
//!
//! ```no_run
//! use bindery::{BuildConfig, Pipeline};
//!
//! let config = BuildConfig::load("book.json").unwrap();
//! let outcome = Pipeline::new(config).run().unwrap();
//! println!("{} entries written to {}", outcome.entries, outcome.output.display());
//! ```
//!
//! ## Working with the Stages
//!
//! Each stage is usable on its own. Packaging only accepts documents that
//! passed verification:
//!
//! ```no_run
//! use bindery::{BookMetadata, ReadingOrder, SourceDocument, Verifier, convert, package};
//!
//! let source = SourceDocument::read("manuscript/chapter1.html").unwrap();
//! let converted = convert(&source).unwrap();
//!
//! let mut report = bindery::VerificationReport::new();
//! report.push(Verifier::default().verify(&source, &converted));
//! let verified = report.gate(vec![converted]).unwrap();
//!
//! let metadata = BookMetadata::load("metadata.json").unwrap();
//! let order = ReadingOrder::new(["cover", "titlepage", "toc", "chapter1"]);
//! let archive = package(&verified, &metadata, &order, &[]).unwrap();
//! archive.write("book.epub").unwrap();
//! ```

pub mod book;
pub mod convert;
pub mod dom;
pub mod epub;
pub mod error;
pub mod pipeline;
pub(crate) mod util;
pub mod verify;

pub use book::{Asset, AssetKind, BookMetadata, ConvertedDocument, ReadingOrder, SourceDocument};
pub use convert::{ConvertOptions, Converter, NavigationFilter, convert};
pub use epub::{PackageArchive, PackageOptions, Packager, package, validate_archive};
pub use error::{Error, Result};
pub use pipeline::{BuildConfig, BuildOutcome, Pipeline};
pub use verify::{ReportEntry, VerificationReport, VerifiedDocuments, Verifier, verify};
