//! Registry of format handlers

use crate::{
    CommandConverter, CsvConverter, DocumentConverter, JsonConverter, PlainTextConverter,
    normalize_extension, normalize_media_type,
};
use docgate_core::ConverterConfig;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Maps media types and file extensions to converters.
///
/// A declared media type decides on its own: its handler, else the fallback
/// converter. The file extension is only consulted when no media type was
/// declared. Registering a converter for a key that is already taken
/// replaces the previous handler for that key.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    by_media_type: HashMap<String, Arc<dyn DocumentConverter>>,
    by_extension: HashMap<String, Arc<dyn DocumentConverter>>,
    fallback: Option<Arc<dyn DocumentConverter>>,
}

impl ConverterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in text, CSV, TSV and JSON handlers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(PlainTextConverter))
            .register(Arc::new(CsvConverter::csv()))
            .register(Arc::new(CsvConverter::tsv()))
            .register(Arc::new(JsonConverter));
        registry
    }

    /// Build the registry described by the converter configuration
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut registry = if config.builtin {
            Self::with_builtin()
        } else {
            Self::new()
        };

        if let Some(ref command) = config.command {
            let converter: Arc<dyn DocumentConverter> =
                Arc::new(CommandConverter::from_config(command));
            registry.register(Arc::clone(&converter));
            registry.set_fallback(converter);
        }

        registry
    }

    /// Register a converter under all its media types and extensions
    pub fn register(&mut self, converter: Arc<dyn DocumentConverter>) -> &mut Self {
        for media_type in converter.media_types() {
            if let Some(key) = normalize_media_type(&media_type) {
                self.by_media_type.insert(key, Arc::clone(&converter));
            }
        }
        for extension in converter.extensions() {
            self.by_extension
                .insert(normalize_extension(&extension), Arc::clone(&converter));
        }
        tracing::debug!(converter = converter.name(), "Converter registered");
        self
    }

    /// Converter used when neither media type nor extension match
    pub fn set_fallback(&mut self, converter: Arc<dyn DocumentConverter>) -> &mut Self {
        self.fallback = Some(converter);
        self
    }

    /// Pick the converter for a file.
    ///
    /// `media_type` must already be normalized. A declared type nobody
    /// handles goes to the fallback and never to an extension match.
    pub fn resolve(
        &self,
        path: &Path,
        media_type: Option<&str>,
    ) -> Option<Arc<dyn DocumentConverter>> {
        if let Some(media_type) = media_type {
            return self
                .by_media_type
                .get(media_type)
                .or(self.fallback.as_ref())
                .cloned();
        }

        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(normalize_extension)
            .and_then(|ext| self.by_extension.get(&ext));
        if let Some(converter) = by_extension {
            return Some(Arc::clone(converter));
        }

        self.fallback.clone()
    }

    /// All registered media types, sorted
    pub fn media_types(&self) -> Vec<String> {
        let set: BTreeSet<_> = self.by_media_type.keys().cloned().collect();
        set.into_iter().collect()
    }

    /// All registered extensions, sorted
    pub fn extensions(&self) -> Vec<String> {
        let set: BTreeSet<_> = self.by_extension.keys().cloned().collect();
        set.into_iter().collect()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.by_media_type.is_empty() && self.by_extension.is_empty() && self.fallback.is_none()
    }
}
