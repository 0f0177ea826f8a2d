//! Error types for quire operations.

use thiserror::Error;

/// Errors that can occur while loading, mutating or saving a book.
///
/// Lookups that find nothing are not errors: they return `None`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The package document could not be found, read or parsed.
    #[error("Unreadable package document: {0}")]
    PackageDocument(String),

    /// An EPUB 3 package without a manifest item carrying `properties="nav"`.
    #[error("EPUB 3 package has no navigation document")]
    MissingNavDocument,

    #[error("Duplicate resource href: {0}")]
    DuplicateHref(String),

    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Invalid href: {0}")]
    InvalidHref(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Processor '{step}' failed: {message}")]
    Processor { step: String, message: String },

    #[error("HTML normalization failed: {0}")]
    Normalization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
