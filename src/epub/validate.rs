//! Structural validation of a finished archive.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::{Error, Result};
use crate::util::{decode_href, normalize_relative_path};

use super::archive::{Compression, PackageArchive};
use super::parser::{PackageData, parse_container_xml, parse_opf};
use super::{CONTAINER_PATH, MIMETYPE};

/// One structural problem found in an archive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralIssue {
    #[error("first entry is {0:?}, expected \"mimetype\"")]
    MimetypeNotFirst(Option<String>),

    #[error("mimetype entry is compressed")]
    MimetypeCompressed,

    #[error("mimetype entry does not contain \"application/epub+zip\"")]
    MimetypeContent,

    #[error("META-INF/container.xml is missing")]
    MissingContainer,

    #[error("container.xml is unreadable: {0}")]
    UnreadableContainer(String),

    #[error("package document {0} is missing")]
    MissingPackageDocument(String),

    #[error("package document is unreadable: {0}")]
    UnreadablePackageDocument(String),

    #[error("manifest id '{0}' is used more than once")]
    DuplicateManifestId(String),

    #[error("manifest item '{id}' points at missing entry {path}")]
    MissingEntry { id: String, path: String },

    #[error("spine is empty")]
    EmptySpine,

    #[error("spine references unknown manifest id '{0}'")]
    DanglingSpineRef(String),

    #[error("content document '{0}' is in the manifest but not the spine")]
    NotInSpine(String),

    #[error("required metadata '{0}' is missing or empty")]
    MissingMetadata(&'static str),

    #[error("no cover image is designated")]
    MissingCover,

    #[error("cover designation '{0}' does not match a manifest item")]
    DanglingCover(String),
}

/// Result of [`validate_archive`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    issues: Vec<StructuralIssue>,
}

impl ArchiveReport {
    pub fn issues(&self) -> &[StructuralIssue] {
        &self.issues
    }

    pub fn is_pass(&self) -> bool {
        self.issues.is_empty()
    }

    /// `StructuralValidation` listing every issue, or `Ok` when there are none.
    pub fn into_result(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(Error::StructuralValidation {
                reasons: self.issues.iter().map(ToString::to_string).collect(),
            })
        }
    }
}

/// Check an archive against the rules reading systems and retailers
/// enforce. All problems are collected rather than stopping at the first.
pub fn validate_archive(archive: &PackageArchive) -> ArchiveReport {
    let mut issues = Vec::new();
    check_mimetype(archive, &mut issues);

    let Some(container) = archive.entry(CONTAINER_PATH) else {
        issues.push(StructuralIssue::MissingContainer);
        return ArchiveReport { issues };
    };
    let opf_path = match parse_container_xml(&container.data) {
        Ok(path) => path,
        Err(e) => {
            issues.push(StructuralIssue::UnreadableContainer(e));
            return ArchiveReport { issues };
        }
    };
    let Some(opf) = archive.entry(&opf_path) else {
        issues.push(StructuralIssue::MissingPackageDocument(opf_path));
        return ArchiveReport { issues };
    };
    let package = match parse_opf(&opf.data) {
        Ok(package) => package,
        Err(e) => {
            issues.push(StructuralIssue::UnreadablePackageDocument(e));
            return ArchiveReport { issues };
        }
    };

    let base = opf_path.rsplit_once('/').map_or("", |(dir, _)| dir);
    check_manifest(archive, &package, base, &mut issues);
    check_spine(&package, &mut issues);
    check_metadata(&package, &mut issues);

    if issues.is_empty() {
        log::debug!(
            "archive valid: {} manifest items, {} spine items",
            package.manifest.len(),
            package.spine.len()
        );
    }
    ArchiveReport { issues }
}

fn check_mimetype(archive: &PackageArchive, issues: &mut Vec<StructuralIssue>) {
    match archive.entries().first() {
        Some(first) if first.path == "mimetype" => {
            if first.compression != Compression::Stored {
                issues.push(StructuralIssue::MimetypeCompressed);
            }
            if first.data != MIMETYPE.as_bytes() {
                issues.push(StructuralIssue::MimetypeContent);
            }
        }
        other => issues.push(StructuralIssue::MimetypeNotFirst(
            other.map(|e| e.path.clone()),
        )),
    }
}

fn check_manifest(
    archive: &PackageArchive,
    package: &PackageData,
    base: &str,
    issues: &mut Vec<StructuralIssue>,
) {
    let mut ids = HashSet::new();
    for item in &package.manifest {
        if !ids.insert(item.id.as_str()) {
            issues.push(StructuralIssue::DuplicateManifestId(item.id.clone()));
        }

        let relative = decode_href(item.href.split('#').next().unwrap_or(&item.href));
        let joined = if base.is_empty() {
            relative
        } else {
            format!("{base}/{relative}")
        };
        let path = normalize_relative_path(&joined).unwrap_or(joined);
        if !archive.contains(&path) {
            issues.push(StructuralIssue::MissingEntry {
                id: item.id.clone(),
                path,
            });
        }
    }
}

fn check_spine(package: &PackageData, issues: &mut Vec<StructuralIssue>) {
    if package.spine.is_empty() {
        issues.push(StructuralIssue::EmptySpine);
    }

    let manifest_ids: HashSet<&str> = package.manifest.iter().map(|i| i.id.as_str()).collect();
    for idref in &package.spine {
        if !manifest_ids.contains(idref.as_str()) {
            issues.push(StructuralIssue::DanglingSpineRef(idref.clone()));
        }
    }

    let spine: HashSet<&str> = package.spine.iter().map(String::as_str).collect();
    for item in &package.manifest {
        let is_nav = item
            .properties
            .as_deref()
            .is_some_and(|p| p.split_ascii_whitespace().any(|p| p == "nav"));
        if item.media_type == "application/xhtml+xml" && !is_nav && !spine.contains(item.id.as_str())
        {
            issues.push(StructuralIssue::NotInSpine(item.id.clone()));
        }
    }
}

fn check_metadata(package: &PackageData, issues: &mut Vec<StructuralIssue>) {
    let present = |values: &[String]| values.iter().any(|v| !v.trim().is_empty());

    for (name, values) in [
        ("title", &package.titles),
        ("creator", &package.creators),
        ("publisher", &package.publishers),
        ("date", &package.dates),
        ("language", &package.languages),
        ("subject", &package.subjects),
        ("description", &package.descriptions),
        ("identifier", &package.identifiers),
    ] {
        if !present(values.as_slice()) {
            issues.push(StructuralIssue::MissingMetadata(name));
        }
    }

    match &package.cover_id {
        None => issues.push(StructuralIssue::MissingCover),
        Some(id) if !package.manifest.iter().any(|i| &i.id == id) => {
            issues.push(StructuralIssue::DanglingCover(id.clone()));
        }
        Some(_) => {}
    }
}
