//! Converter gateway: one bounded, best-effort conversion per call

use crate::{ConvertError, ConverterRegistry, normalize_media_type};
use docgate_core::{ConverterConfig, Error, Result};
use docgate_telemetry::{conversion_span, record_conversion_outcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::Instrument;

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub markdown: String,
    /// Name of the converter that produced the Markdown
    pub converter: String,
    /// Normalized media type the converter was selected with, if declared
    pub media_type: Option<String>,
}

/// Routes files to converters and maps their failures onto [`Error`].
#[derive(Clone)]
pub struct ConverterGateway {
    registry: Arc<ConverterRegistry>,
    timeout: Option<Duration>,
}

impl ConverterGateway {
    pub fn new(registry: ConverterRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: None,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(ConverterRegistry::from_config(config)).with_timeout(config.timeout())
    }

    /// Bound each conversion; `None` lets converters run to completion
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Convert the file at `path` to Markdown.
    ///
    /// Fails with `NotFound` when the file is gone, `UnsupportedFormat` when
    /// no handler accepts it and `ConversionFailed` for every other converter
    /// failure, including empty output and exceeding the timeout.
    pub async fn convert(&self, path: &Path, declared_media_type: Option<&str>) -> Result<Conversion> {
        let media_type = declared_media_type.and_then(normalize_media_type);

        if !fs::try_exists(path).await? {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let converter = self
            .registry
            .resolve(path, media_type.as_deref())
            .ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "no converter for {} (media type: {})",
                    path.display(),
                    media_type.as_deref().unwrap_or("undeclared")
                ))
            })?;

        let span = conversion_span(
            converter.name(),
            media_type.as_deref(),
            &path.display().to_string(),
        );

        let attempt = converter.convert(path, media_type.as_deref());
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .instrument(span.clone())
                .await
                .unwrap_or(Err(ConvertError::Timeout(limit))),
            None => attempt.instrument(span.clone()).await,
        };

        match result {
            Ok(markdown) if markdown.trim().is_empty() => {
                record_conversion_outcome(&span, "empty", Some(0));
                tracing::warn!(converter = converter.name(), path = %path.display(), "Converter produced no content");
                Err(Error::ConversionFailed(format!(
                    "{} produced no content for {}",
                    converter.name(),
                    path.display()
                )))
            }
            Ok(markdown) => {
                record_conversion_outcome(&span, "ok", Some(markdown.len()));
                tracing::info!(
                    converter = converter.name(),
                    path = %path.display(),
                    bytes = markdown.len(),
                    "Document converted"
                );
                Ok(Conversion {
                    markdown,
                    converter: converter.name().to_string(),
                    media_type,
                })
            }
            Err(e) => {
                record_conversion_outcome(&span, e.outcome(), None);
                tracing::warn!(converter = converter.name(), path = %path.display(), error = %e, "Conversion failed");
                Err(e.into())
            }
        }
    }
}
