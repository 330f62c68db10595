use anyhow::Result;
use axum::{body::Body, http::Request, response::Response, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry::global;
use opentelemetry_http::HeaderExtractor;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::{info, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::{
    config::ServerConfig,
    handlers::{self, facts::AppState},
    signals::setup_signal_handlers,
};

/// Serve `app` until SIGTERM/SIGINT, then drain in-flight requests
pub async fn start_server(config: &ServerConfig, app: Router) -> Result<()> {
    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    info!("Starting genai-facts on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: &ServerConfig,
    app_state: AppState,
    metrics_handle: Arc<PrometheusHandle>,
) -> Router {
    let facts_routes = Router::new()
        .route("/facts", get(handlers::facts::handle_facts))
        .with_state(app_state);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(metrics_handle)
        .route_service("/", ServeFile::new(config.index_file()))
        .route_service("/favicon.ico", ServeFile::new(config.favicon_file()))
        .merge(facts_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(record_response),
        )
}

/// Server span for one request, parented on the inbound `traceparent`
fn make_request_span(request: &Request<Body>) -> Span {
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });

    let span = tracing::info_span!(
        "request",
        otel.name = %format!("{} {}", request.method(), request.uri().path()),
        otel.kind = "server",
        http.request.method = %request.method(),
        url.path = %request.uri().path(),
        http.response.status_code = tracing::field::Empty,
    );
    if let Err(err) = span.set_parent(parent) {
        tracing::debug!(error = ?err, "Failed to attach inbound trace context");
    }

    span
}

fn record_response(response: &Response<Body>, latency: Duration, span: &Span) {
    span.record("http.response.status_code", response.status().as_u16());
    tracing::debug!(
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "Finished processing request"
    );
}
