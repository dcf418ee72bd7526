//! In-memory EPUB archive and its ZIP encoding.

use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::Result;

/// How an entry is stored in the ZIP container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    /// Deflate, or any other method when read back from disk.
    Deflated,
}

/// One file in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub data: Vec<u8>,
    pub compression: Compression,
}

/// Ordered archive entries.
///
/// Entry order is write order, and timestamps are fixed when encoding, so
/// the same entries always produce the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArchive {
    entries: Vec<ArchiveEntry>,
    compression_level: i64,
}

impl Default for PackageArchive {
    fn default() -> Self {
        Self::new(6)
    }
}

impl PackageArchive {
    pub(crate) fn new(compression_level: i64) -> Self {
        Self {
            entries: Vec::new(),
            compression_level,
        }
    }

    pub(crate) fn push(&mut self, path: impl Into<String>, data: Vec<u8>, compression: Compression) {
        self.entries.push(ArchiveEntry {
            path: path.into(),
            data,
            compression,
        });
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the archive as ZIP into any [`Write`] + [`Seek`] destination.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);

        let stored = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default());
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.compression_level))
            .last_modified_time(DateTime::default());

        for entry in &self.entries {
            let options = match entry.compression {
                Compression::Stored => stored,
                Compression::Deflated => deflated,
            };
            zip.start_file(entry.path.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }

        Ok(zip.finish()?)
    }

    /// Encode the archive into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Encode the archive to a file.
    ///
    /// The bytes go to a temporary file in the same directory, which is
    /// renamed over `path` once complete. A failed write leaves any existing
    /// file at `path` untouched.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        let mut writer = self.write_to(BufWriter::new(temp))?;
        writer.flush()?;
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        log::debug!("wrote {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Read every entry of a ZIP archive, in stored order.
    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut archive = Self::default();

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let compression = match file.compression() {
                CompressionMethod::Stored => Compression::Stored,
                _ => Compression::Deflated,
            };
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            archive.push(file.name().to_string(), data, compression);
        }

        Ok(archive)
    }

    /// Read an archive from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }
}
