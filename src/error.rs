//! Error types for bindery operations.

use thiserror::Error;

/// How a reading order fails to line up with the document set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderIssue {
    #[error("document '{0}' is not listed in the reading order")]
    Missing(String),

    #[error("'{0}' appears more than once in the reading order")]
    Duplicate(String),

    #[error("'{0}' names neither a document nor a synthesized page")]
    Unknown(String),

    #[error("more than one document has the id '{0}'")]
    DuplicateDocument(String),

    #[error("reading order is empty")]
    Empty,
}

/// Errors that can occur while converting, verifying or packaging a book.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed source '{document}': {reason}")]
    MalformedSource { document: String, reason: String },

    #[error("verification failed for: {}", .documents.join(", "))]
    VerificationMismatch { documents: Vec<String> },

    #[error("reading order mismatch: {0}")]
    OrderMismatch(#[from] OrderIssue),

    #[error("incomplete metadata, missing: {}", .missing.join(", "))]
    IncompleteMetadata { missing: Vec<&'static str> },

    #[error("invalid cover image: {0}")]
    InvalidCover(String),

    #[error("duplicate manifest identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("archive failed structural validation: {}", .reasons.join("; "))]
    StructuralValidation { reasons: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;
