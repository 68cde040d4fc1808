//! # docgate Telemetry
//!
//! OpenTelemetry integration for tracing storage operations and document
//! conversions.
//!
//! Span helpers return [`tracing::Span`]s carrying the attributes below so
//! callers can wrap the actual work with `tracing::Instrument` and record the
//! outcome once it is known.

mod spans;
mod tracer;

pub use spans::{conversion_span, record_conversion_outcome, storage_span};
pub use tracer::{TelemetryOptions, init_telemetry, register_span_processor, tracer_provider};

/// OpenTelemetry span attribute constants.
pub mod attributes {
    // Storage attributes
    pub const DOCGATE_STORAGE_OPERATION: &str = "docgate.storage.operation";
    pub const DOCGATE_STORAGE_AREA: &str = "docgate.storage.area";
    pub const DOCGATE_FILE_NAME: &str = "docgate.file.name";

    // Conversion attributes
    pub const DOCGATE_CONVERTER_NAME: &str = "docgate.converter.name";
    pub const DOCGATE_MEDIA_TYPE: &str = "docgate.media_type";
    pub const DOCGATE_SOURCE_PATH: &str = "docgate.source.path";
    pub const DOCGATE_CONVERSION_OUTCOME: &str = "docgate.conversion.outcome";
    pub const DOCGATE_OUTPUT_BYTES: &str = "docgate.output.bytes";

    // System name constant
    pub const SYSTEM_NAME: &str = "docgate";
}
