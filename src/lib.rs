pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod providers;
pub mod server;
pub mod signals;

use opentelemetry_sdk::trace::SdkTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Diagnostics go to stderr as JSON; stdout is reserved for request logs.
/// When a tracer is given, `tracing` spans are also exported as OpenTelemetry
/// spans. `RUST_LOG` overrides `default_level`.
///
/// Note: This function can only be called once.
pub fn init_tracing(default_level: &str, tracer: Option<SdkTracer>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    Ok(())
}
