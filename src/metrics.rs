use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Label};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const MODEL_CALL_COUNTER: &str = "model_call_counter";
pub const MODEL_ERRORS_TOTAL: &str = "model_errors_total";
pub const MODEL_REQUEST_DURATION: &str = "model_request_duration_seconds";

/// Install the Prometheus recorder backing the local `/metrics` endpoint.
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(MODEL_CALL_COUNTER, "number of model invocations");
    describe_counter!(MODEL_ERRORS_TOTAL, "Total number of failed model invocations");
    describe_histogram!(
        MODEL_REQUEST_DURATION,
        "Model request duration in seconds"
    );
    describe_gauge!("genai_facts_info", "Service version and build information");

    gauge!("genai_facts_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a successful model invocation
pub fn record_model_call(labels: &[(&'static str, &'static str)]) {
    let labels: Vec<Label> = labels
        .iter()
        .map(|(key, value)| Label::new(*key, *value))
        .collect();
    counter!(MODEL_CALL_COUNTER, labels).increment(1);
}

/// Record a failed model invocation by upstream status code
pub fn record_model_error(model: &str, status: u16) {
    counter!(
        MODEL_ERRORS_TOTAL,
        "model" => model.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record model request duration
pub fn record_duration(model: &str, duration: Duration) {
    histogram!(
        MODEL_REQUEST_DURATION,
        "model" => model.to_string(),
    )
    .record(duration.as_secs_f64());
}
