//! Explicit reading order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::OrderIssue;

/// Pages the packager can generate when no source document claims the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticPage {
    /// Full-page cover image.
    Cover,
    /// Title, subtitle, author and publisher.
    TitlePage,
    /// Linked table of contents.
    Contents,
}

impl SyntheticPage {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "cover" => Some(SyntheticPage::Cover),
            "titlepage" => Some(SyntheticPage::TitlePage),
            "toc" => Some(SyntheticPage::Contents),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            SyntheticPage::Cover => "cover",
            SyntheticPage::TitlePage => "titlepage",
            SyntheticPage::Contents => "toc",
        }
    }

    /// Label used in the table of contents.
    pub fn label(self) -> &'static str {
        match self {
            SyntheticPage::Cover => "Cover",
            SyntheticPage::TitlePage => "Title Page",
            SyntheticPage::Contents => "Table of Contents",
        }
    }
}

/// One slot of the reading order: a document id plus an optional label
/// that overrides the document title in the table of contents.
///
/// In JSON either a bare id string or `{"id": ..., "title": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry")]
pub struct OrderEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Id(String),
    Detailed {
        id: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl From<RawEntry> for OrderEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Id(id) => OrderEntry { id, title: None },
            RawEntry::Detailed { id, title } => OrderEntry { id, title },
        }
    }
}

/// Where a spine slot's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpineSource {
    /// Index into the document list passed to [`ReadingOrder::reconcile`].
    Document(usize),
    Synthetic(SyntheticPage),
}

/// The authoritative sequence of pages in the finished book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingOrder {
    entries: Vec<OrderEntry>,
}

impl ReadingOrder {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: ids
                .into_iter()
                .map(|id| OrderEntry {
                    id: id.into(),
                    title: None,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, id: impl Into<String>) {
        self.entries.push(OrderEntry {
            id: id.into(),
            title: None,
        });
    }

    /// Override the table-of-contents label of an entry.
    pub fn with_title(mut self, id: &str, title: impl Into<String>) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.title = Some(title.into());
        }
        self
    }

    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match the order against a document set.
    ///
    /// Every document must appear exactly once; ids with no document must
    /// name a synthesized page. A real document always wins over a
    /// synthesized page with the same id.
    pub fn reconcile<'a>(
        &'a self,
        document_ids: &[&str],
    ) -> Result<Vec<(&'a OrderEntry, SpineSource)>, OrderIssue> {
        if self.entries.is_empty() {
            return Err(OrderIssue::Empty);
        }

        let mut by_id = HashMap::with_capacity(document_ids.len());
        for (index, id) in document_ids.iter().enumerate() {
            if by_id.insert(*id, index).is_some() {
                return Err(OrderIssue::DuplicateDocument(id.to_string()));
            }
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut spine = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(OrderIssue::Duplicate(entry.id.clone()));
            }

            let source = if let Some(&index) = by_id.get(entry.id.as_str()) {
                SpineSource::Document(index)
            } else if let Some(page) = SyntheticPage::from_id(&entry.id) {
                SpineSource::Synthetic(page)
            } else {
                return Err(OrderIssue::Unknown(entry.id.clone()));
            };
            spine.push((entry, source));
        }

        if let Some(missing) = document_ids.iter().find(|id| !seen.contains(**id)) {
            return Err(OrderIssue::Missing(missing.to_string()));
        }

        Ok(spine)
    }
}
