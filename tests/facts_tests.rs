/// Integration tests for the /facts request flow
mod common;

use axum::{body::Body, http::Request};
use common::{ScriptedModel, TestApp};
use genai_facts::logging::{SPAN_ID_KEY, TRACE_KEY, TRACE_SAMPLED_KEY};
use genai_facts::providers::ModelError;
use std::sync::Arc;

#[tokio::test]
async fn test_success_returns_model_text_as_html() {
    let app = TestApp::new(ScriptedModel::always("T"));

    let response = app.get("/facts?subject=cat").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "T");
    assert_eq!(
        response.content_type.as_deref(),
        Some("text/html; charset=utf-8")
    );
    assert_eq!(
        app.model.prompts(),
        vec!["Give me 10 fun facts about cat. Return this as html without backticks.".to_string()]
    );
    assert_eq!(app.counter.count(), 1);
}

#[tokio::test]
async fn test_model_error_surfaces_status_and_message() {
    let app = TestApp::new(ScriptedModel::failing(429, "quota exceeded"));

    let response = app.get("/facts?subject=cat").await;

    assert_eq!(response.status, 429);
    assert_eq!(response.body, "quota exceeded");
    assert_eq!(app.counter.count(), 0);
    assert!(app.logs.lines().is_empty());
}

#[tokio::test]
async fn test_missing_and_empty_subject_default_to_dog() {
    let app = TestApp::new(ScriptedModel::always("T"));

    app.get("/facts").await;
    app.get("/facts?subject=").await;

    for prompt in app.model.prompts() {
        assert!(prompt.contains("fun facts about dog."));
    }
}

#[tokio::test]
async fn test_legacy_animal_parameter() {
    let app = TestApp::new(ScriptedModel::always("T"));

    app.get("/facts?animal=owl").await;

    assert!(app.model.prompts()[0].contains("fun facts about owl."));
}

#[tokio::test]
async fn test_unicode_subject_is_passed_verbatim() {
    let app = TestApp::new(ScriptedModel::always("T"));

    app.get("/facts?subject=%C3%A9l%C3%A9phant%20%F0%9F%90%98").await;

    assert!(app.model.prompts()[0].contains("fun facts about éléphant 🐘."));
}

#[tokio::test]
async fn test_counter_counts_only_successes() {
    let app = TestApp::new(ScriptedModel::new(vec![
        Ok("a".to_string()),
        Err(ModelError::new(500, "boom")),
        Ok("b".to_string()),
        Err(ModelError::new(429, "slow down")),
        Ok("c".to_string()),
        Err(ModelError::new(504, "timed out")),
    ]));

    let mut statuses = Vec::new();
    for _ in 0..6 {
        statuses.push(app.get("/facts?subject=cat").await.status);
    }

    assert_eq!(statuses, vec![200, 500, 200, 429, 200, 504]);
    assert_eq!(app.counter.count(), 3);
    assert_eq!(app.logs.lines().len(), 3);
}

#[tokio::test]
async fn test_exported_model_call_counter_counts_only_successes() {
    use genai_facts::observability::{OtelCallCounter, MODEL_CALL_COUNTER};
    use opentelemetry::{metrics::MeterProvider as _, KeyValue};

    let (provider, exporter) = common::exporting_meter_provider();
    let counter = Arc::new(OtelCallCounter::new(&provider.meter("test")));
    let app = TestApp::with_counter(
        ScriptedModel::new(vec![
            Err(ModelError::new(503, "unavailable")),
            Ok("a".to_string()),
            Ok("b".to_string()),
            Err(ModelError::new(429, "slow down")),
        ]),
        counter,
    );

    for _ in 0..4 {
        app.get("/facts?subject=cat").await;
    }
    provider.force_flush().unwrap();

    let points = common::exported_sum(&exporter, MODEL_CALL_COUNTER);
    assert_eq!(points, vec![(2, vec![KeyValue::new("language", "rust")])]);
}

#[tokio::test]
async fn test_success_emits_one_structured_log() {
    let app = TestApp::new(ScriptedModel::always("<ul><li>fact</li></ul>"));

    app.get("/facts?subject=cat").await;

    let lines = app.logs.lines();
    assert_eq!(lines.len(), 1);

    let log = &lines[0];
    assert_eq!(log["severity"], "DEBUG");
    assert_eq!(log["message"], "content is generated");
    assert_eq!(log["subject"], "cat");
    assert_eq!(
        log["prompt"],
        "Give me 10 fun facts about cat. Return this as html without backticks."
    );
    assert_eq!(
        log["response"]["candidates"][0]["content"]["parts"][0]["text"],
        "<ul><li>fact</li></ul>"
    );
    assert!(log["timestamp"].is_string());

    // No OpenTelemetry subscriber in this test: the zero context is logged
    assert_eq!(
        log[TRACE_KEY],
        format!("projects/test-project/traces/{}", "0".repeat(32))
    );
    assert_eq!(log[SPAN_ID_KEY], "0".repeat(16));
    assert_eq!(log[TRACE_SAMPLED_KEY], false);
}

#[tokio::test]
async fn test_log_is_correlated_with_inbound_trace() {
    use opentelemetry::global;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider};
    use tracing_subscriber::prelude::*;

    global::set_text_map_propagator(TraceContextPropagator::new());
    let provider = SdkTracerProvider::builder().build();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new(ScriptedModel::always("T"));
    let trace_id = "4bf92f3577b34da6a3ce929d0e0e4736";
    let parent_span_id = "00f067aa0ba902b7";
    let request = Request::builder()
        .uri("/facts?subject=cat")
        .header("traceparent", format!("00-{trace_id}-{parent_span_id}-01"))
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status, 200);

    let lines = app.logs.lines();
    assert_eq!(lines.len(), 1);
    let log = &lines[0];

    assert_eq!(
        log[TRACE_KEY],
        format!("projects/test-project/traces/{trace_id}")
    );
    let span_id = log[SPAN_ID_KEY].as_str().unwrap();
    assert_eq!(span_id.len(), 16);
    assert_ne!(span_id, "0".repeat(16));
    assert_ne!(span_id, parent_span_id);
    assert_eq!(log[TRACE_SAMPLED_KEY], true);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(ScriptedModel::always("T"));

    let response = app.get("/health").await;

    assert_eq!(response.status, 200);
    assert!(response.body.contains("\"status\":\"healthy\""));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let app = TestApp::new(ScriptedModel::always("T"));

    let index = app.get("/").await;
    assert_eq!(index.status, 200);
    assert!(index.body.contains("Fun Facts"));

    let favicon = app.get("/favicon.ico").await;
    assert_eq!(favicon.status, 200);
}
