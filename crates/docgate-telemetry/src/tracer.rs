//! Tracer setup and management

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SimpleSpanProcessor, TracerProvider};
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Global tracer provider holder
static TRACER_PROVIDER: OnceLock<Arc<TracerProvider>> = OnceLock::new();

/// Global span processor builders (registered before initialization)
type ProcessorBuilder = Box<dyn FnOnce() -> SimpleSpanProcessor + Send>;
static SPAN_PROCESSOR_BUILDERS: Mutex<Option<Vec<ProcessorBuilder>>> = Mutex::new(Some(Vec::new()));

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Subscriber options taken from the service configuration.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub service_name: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            service_name: crate::attributes::SYSTEM_NAME.to_string(),
            json: false,
        }
    }
}

/// Register a custom span processor builder to be used when telemetry is initialized.
///
/// Exporters (Jaeger, OTLP, ...) plug in here. Must be called BEFORE
/// `init_telemetry()`; later registrations are ignored with a warning.
pub fn register_span_processor(builder: ProcessorBuilder) {
    let mut builders = match SPAN_PROCESSOR_BUILDERS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(ref mut vec) = *builders {
        vec.push(builder);
    } else {
        tracing::warn!("Attempted to register span processor after telemetry initialization");
    }
}

/// Initialize telemetry with OpenTelemetry support.
///
/// This sets up:
/// - A tracer provider with any registered span processors
/// - Integration with the tracing subscriber
/// - Structured logging output (text or JSON), filtered by `RUST_LOG`
///
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(
    options: &TelemetryOptions,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    // Take the span processor builders (can only initialize once)
    let builders = match SPAN_PROCESSOR_BUILDERS.lock() {
        Ok(mut guard) => guard.take().unwrap_or_default(),
        Err(poisoned) => poisoned.into_inner().take().unwrap_or_default(),
    };

    let mut provider_builder = TracerProvider::builder();
    for builder in builders {
        provider_builder = provider_builder.with_span_processor(builder());
    }
    let tracer_provider = provider_builder.build();

    let tracer = tracer_provider.tracer(options.service_name.clone());
    let _ = TRACER_PROVIDER.set(Arc::new(tracer_provider));

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });
    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .try_init()
}

/// Get the global tracer provider if initialized
pub fn tracer_provider() -> Option<Arc<TracerProvider>> {
    TRACER_PROVIDER.get().cloned()
}
