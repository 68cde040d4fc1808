//! # docgate Converter Gateway
//!
//! Wraps the document-to-Markdown capability behind a narrow interface:
//! `(path, media type hint) -> Markdown | typed failure`.
//!
//! Concrete formats are handled by [`DocumentConverter`] implementations kept
//! in a [`ConverterRegistry`]. The [`ConverterGateway`] picks a handler, bounds
//! the attempt with an optional timeout and maps failures onto the shared
//! error taxonomy. There are no retries.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod builtin;
mod command;
mod converter;
mod gateway;
mod registry;

pub use builtin::{CsvConverter, JsonConverter, PlainTextConverter};
pub use command::CommandConverter;
pub use converter::DocumentConverter;
pub use gateway::{Conversion, ConverterGateway};
pub use registry::ConverterRegistry;

/// Errors reported by converter implementations
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported media type: {0}")]
    Unsupported(String),

    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{0}")]
    Failed(String),

    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Short label recorded on conversion spans
    pub fn outcome(&self) -> &'static str {
        match self {
            ConvertError::Unsupported(_) => "unsupported",
            ConvertError::NotFound(_) => "not_found",
            ConvertError::Failed(_) => "failed",
            ConvertError::Timeout(_) => "timeout",
            ConvertError::Io(_) => "io_error",
        }
    }
}

impl From<ConvertError> for docgate_core::Error {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Unsupported(msg) => docgate_core::Error::UnsupportedFormat(msg),
            ConvertError::NotFound(path) => docgate_core::Error::NotFound(path.display().to_string()),
            ConvertError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                docgate_core::Error::NotFound(e.to_string())
            }
            other => docgate_core::Error::ConversionFailed(other.to_string()),
        }
    }
}

/// Result type for converter implementations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Normalize a declared media type for lookup.
///
/// Parameters are dropped and the essence is lowercased. Empty values and
/// `application/octet-stream`, which clients send when they do not know the
/// type, yield `None`.
///
/// ```
/// use docgate_convert::normalize_media_type;
/// assert_eq!(normalize_media_type("Text/CSV; charset=utf-8").as_deref(), Some("text/csv"));
/// assert_eq!(normalize_media_type("application/octet-stream"), None);
/// ```
pub fn normalize_media_type(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.is_empty() || essence == "application/octet-stream" {
        None
    } else {
        Some(essence)
    }
}

/// Normalize a file extension for lookup (`".PDF"` -> `"pdf"`)
pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}
