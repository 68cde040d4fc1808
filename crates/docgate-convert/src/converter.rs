//! Converter capability trait definition

use crate::Result;
use async_trait::async_trait;
use std::path::Path;

/// A document-to-Markdown capability.
///
/// Implementations are opaque to the gateway: it only routes files to them by
/// media type or extension and interprets the typed failure they return.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Name used in logs and spans
    fn name(&self) -> &str;

    /// Media types (essence only, lowercase) this converter handles
    fn media_types(&self) -> Vec<String>;

    /// File extensions (without dot, lowercase) this converter handles
    fn extensions(&self) -> Vec<String>;

    /// Convert the file at `path` to Markdown.
    ///
    /// `media_type` is the normalized client declaration, if any. Return
    /// `ConvertError::Unsupported` when the input cannot be handled at all.
    async fn convert(&self, path: &Path, media_type: Option<&str>) -> Result<String>;
}
