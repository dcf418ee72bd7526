//! End-to-end build: read a manuscript directory, convert, verify, package,
//! validate and write the EPUB.
//!
//! The build is described by a JSON file:
//!
//! ```json
//! {
//!   "source_dir": "manuscript",
//!   "images_dir": "manuscript/images",
//!   "stylesheets": ["epub.css"],
//!   "output": "dist/book.epub",
//!   "report": "dist/verification.json",
//!   "metadata": { "title": "...", "author": "...", "cover_image": "cover.jpg" },
//!   "reading_order": ["cover", "titlepage", "toc", "chapter1"]
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::book::{Asset, AssetKind, BookMetadata, ReadingOrder, SourceDocument};
use crate::convert::{ConvertOptions, Converter, NavigationFilter};
use crate::epub::{PackageArchive, PackageOptions, Packager, validate_archive};
use crate::error::{Error, Result};
use crate::util::{detect_media_format, normalize_relative_path};
use crate::verify::{ReportEntry, VerificationReport, Verifier};

/// Everything a build needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory of `.html` pages; each file stem is a document id.
    pub source_dir: PathBuf,
    /// Image directory, walked recursively. Defaults to `<source_dir>/images`.
    #[serde(default)]
    pub images_dir: Option<PathBuf>,
    #[serde(default)]
    pub stylesheets: Vec<PathBuf>,
    #[serde(default)]
    pub fonts: Vec<PathBuf>,
    /// Document ids to leave out of the book.
    #[serde(default)]
    pub exclude: Vec<String>,
    pub output: PathBuf,
    /// Where to write the verification report as JSON.
    #[serde(default)]
    pub report: Option<PathBuf>,
    pub metadata: BookMetadata,
    pub reading_order: ReadingOrder,
    #[serde(default)]
    pub navigation: NavigationFilter,
    #[serde(default)]
    pub compression_level: Option<i64>,
}

impl BuildConfig {
    /// Load a build description, resolving relative paths against its
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config: BuildConfig = serde_json::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.source_dir);
        resolve(&mut self.output);
        self.images_dir.iter_mut().for_each(resolve);
        self.report.iter_mut().for_each(resolve);
        self.stylesheets.iter_mut().for_each(resolve);
        self.fonts.iter_mut().for_each(resolve);
    }

    fn images_dir(&self) -> PathBuf {
        self.images_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.join(crate::epub::IMAGES_DIR))
    }
}

/// What a successful [`Pipeline::run`] produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub report: VerificationReport,
    pub output: PathBuf,
    pub entries: usize,
}

/// Drives one build.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: BuildConfig,
}

impl Pipeline {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build and write the EPUB. Nothing is written unless verification,
    /// packaging and structural validation all pass; the verification
    /// report is written either way when a report path is configured.
    pub fn run(&self) -> Result<BuildOutcome> {
        let (archive, report) = self.build()?;

        if let Some(parent) = self.config.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        archive.write(&self.config.output)?;
        log::info!(
            "wrote {} ({} entries)",
            self.config.output.display(),
            archive.len()
        );

        Ok(BuildOutcome {
            report,
            output: self.config.output.clone(),
            entries: archive.len(),
        })
    }

    /// Build the archive in memory.
    pub fn build(&self) -> Result<(PackageArchive, VerificationReport)> {
        let (sources, mut report) = self.read_sources()?;
        let assets = self.read_assets()?;

        let options = self.convert_options(&assets);
        let converter = Converter::new(options);
        let verifier = Verifier::new(self.config.navigation.clone());

        let mut converted = Vec::with_capacity(sources.len());
        for source in &sources {
            match converter.convert(source) {
                Ok(doc) => {
                    report.push(verifier.verify(source, &doc));
                    converted.push(doc);
                }
                Err(e) => report.push(ReportEntry::malformed(source.id(), e.to_string())),
            }
        }

        log::info!(
            "converted {} documents, {} failed verification",
            converted.len(),
            report.failures().count()
        );
        self.write_report(&report)?;
        let verified = report.gate(converted)?;

        let packager = Packager::new(
            self.config
                .compression_level
                .map(|level| PackageOptions::default().with_compression_level(level))
                .unwrap_or_default(),
        );
        let assets = assets.into_iter().map(|(asset, _)| asset).collect::<Vec<_>>();
        let archive = packager.package(
            &verified,
            &self.config.metadata,
            &self.config.reading_order,
            &assets,
        )?;
        validate_archive(&archive).into_result()?;
        log::info!("packaged {} archive entries", archive.len());

        Ok((archive, report))
    }

    /// Read every page in the source directory. Pages that are not HTML at
    /// all are recorded as failed report entries instead of aborting.
    pub fn read_sources(&self) -> Result<(Vec<SourceDocument>, VerificationReport)> {
        let mut sources = Vec::new();
        let mut report = VerificationReport::new();

        for entry in WalkDir::new(&self.config.source_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            let path = entry.path();
            let is_html = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
            if !entry.file_type().is_file() || !is_html {
                continue;
            }

            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.config.exclude.contains(&id) {
                log::debug!("skipping excluded document {id}");
                continue;
            }

            match SourceDocument::read(path) {
                Ok(doc) => sources.push(doc),
                Err(Error::MalformedSource { document, reason }) => {
                    log::warn!("{document}: {reason}");
                    report.push(ReportEntry::malformed(document, reason));
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "read {} source documents from {}",
            sources.len(),
            self.config.source_dir.display()
        );
        Ok((sources, report))
    }

    /// Collect images, stylesheets and fonts. Each asset comes with the file
    /// it was read from.
    pub fn read_assets(&self) -> Result<Vec<(Asset, PathBuf)>> {
        let mut assets = Vec::new();

        for path in &self.config.stylesheets {
            let name = file_name(path);
            assets.push((Asset::stylesheet(name, std::fs::read(path)?), path.clone()));
        }
        for path in &self.config.fonts {
            let name = file_name(path);
            assets.push((Asset::font(name, std::fs::read(path)?), path.clone()));
        }

        let images_dir = self.config.images_dir();
        if images_dir.is_dir() {
            for entry in WalkDir::new(&images_dir).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let Ok(relative) = path.strip_prefix(&images_dir) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                let data = std::fs::read(path)?;
                if !detect_media_format(&relative, &data).is_some_and(|f| f.is_image()) {
                    log::debug!("skipping non-image {}", path.display());
                    continue;
                }
                assets.push((Asset::image(&relative, data), path.to_path_buf()));
            }
        } else {
            log::warn!("image directory {} does not exist", images_dir.display());
        }

        if let Some(cover) = self.outside_cover(&assets)? {
            assets.push(cover);
        }

        Ok(assets)
    }

    /// A cover image named in the metadata that does not live in the image
    /// directory, looked up relative to the source directory.
    fn outside_cover(&self, assets: &[(Asset, PathBuf)]) -> Result<Option<(Asset, PathBuf)>> {
        let cover = self.config.metadata.cover_image.trim();
        if cover.is_empty() {
            return Ok(None);
        }

        let wanted = normalize_relative_path(cover).unwrap_or_default();
        let cover_file = file_name(Path::new(cover));
        let known = assets.iter().any(|(asset, _)| {
            asset.kind() == AssetKind::Image
                && (asset.name() == wanted || asset.file_name() == cover_file)
        });
        if known {
            return Ok(None);
        }

        let candidates = [self.config.source_dir.join(cover), PathBuf::from(cover)];
        let Some(path) = candidates.into_iter().find(|p| p.is_file()) else {
            return Ok(None);
        };
        log::debug!("adding cover image {}", path.display());
        let asset = Asset::image(&cover_file, std::fs::read(&path)?);
        Ok(Some((asset, path)))
    }

    fn convert_options(&self, assets: &[(Asset, PathBuf)]) -> ConvertOptions {
        let mut options = ConvertOptions::default()
            .with_navigation(self.config.navigation.clone())
            .with_language(self.config.metadata.language.clone());
        for (asset, _) in assets {
            if asset.kind() == AssetKind::Stylesheet {
                options = options.with_stylesheet(asset.href());
            }
        }

        if let Ok(relative) = self.config.images_dir().strip_prefix(&self.config.source_dir) {
            let prefix = relative.to_string_lossy().replace('\\', "/");
            options = options.with_image_prefix(Some(prefix.as_str()).filter(|p| !p.is_empty()));
        }
        options
    }

    fn write_report(&self, report: &VerificationReport) -> Result<()> {
        let Some(path) = &self.config.report else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, report.to_json()?)?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
