//! OpenTelemetry pipelines for genai-facts
//!
//! Bootstrap happens once per process and wires up:
//! - **Resource**: SDK defaults plus Cloud Run detection and the service name
//! - **Traces**: always-on sampling, batched OTLP/HTTP export
//! - **Metrics**: periodic OTLP/HTTP export of the model call counter
//!
//! Export requests are authenticated with the ambient service account.

pub mod counter;
pub mod exporter;
pub mod pipeline;
pub mod resource;

pub use counter::{CallCounter, InMemoryCallCounter, OtelCallCounter, CALL_LABELS, MODEL_CALL_COUNTER};
pub use exporter::GoogleAuthHttpClient;
pub use pipeline::{Telemetry, INSTRUMENTATION_SCOPE};
pub use resource::CloudRunDetector;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry is already initialized")]
    AlreadyInitialized,
    #[error("invalid telemetry configuration: {0}")]
    Config(String),
    #[error("failed to build export HTTP client: {0}")]
    HttpClient(String),
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}
