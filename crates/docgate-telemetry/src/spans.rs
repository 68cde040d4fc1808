//! Span creation helpers for storage operations and conversions

use crate::attributes::*;
use tracing::Span;
use tracing::field::Empty;

/// Create a span for a single Storage Manager operation.
pub fn storage_span(operation: &str, area: &str, name: &str) -> Span {
    tracing::debug_span!(
        "storage_op",
        { DOCGATE_STORAGE_OPERATION } = %operation,
        { DOCGATE_STORAGE_AREA } = %area,
        { DOCGATE_FILE_NAME } = %name,
    )
}

/// Create a span covering one conversion attempt.
///
/// The outcome and output size are left empty; fill them with
/// [`record_conversion_outcome`] once the converter returns.
pub fn conversion_span(converter: &str, media_type: Option<&str>, source_path: &str) -> Span {
    tracing::info_span!(
        "convert_document",
        { DOCGATE_CONVERTER_NAME } = %converter,
        { DOCGATE_MEDIA_TYPE } = media_type.unwrap_or("unknown"),
        { DOCGATE_SOURCE_PATH } = %source_path,
        { DOCGATE_CONVERSION_OUTCOME } = Empty,
        { DOCGATE_OUTPUT_BYTES } = Empty,
    )
}

/// Record how a conversion ended on a span created by [`conversion_span`].
pub fn record_conversion_outcome(span: &Span, outcome: &str, output_bytes: Option<usize>) {
    span.record(DOCGATE_CONVERSION_OUTCOME, outcome);
    if let Some(bytes) = output_bytes {
        span.record(DOCGATE_OUTPUT_BYTES, bytes as u64);
    }
}
