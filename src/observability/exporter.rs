//! OTLP/HTTP exporters authenticated with ambient credentials.
//!
//! The SDK drives exporters from its own background threads, so the HTTP
//! client here is a blocking reqwest client.

use async_trait::async_trait;
use bytes::Bytes;
use http::{header::AUTHORIZATION, HeaderName, HeaderValue, Request, Response};
use opentelemetry_http::{HttpClient, HttpError};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig, WithHttpConfig};
use std::sync::Arc;
use std::time::Duration;

use super::TelemetryError;
use crate::config::TelemetryConfig;
use crate::credentials::AmbientCredentials;

pub const TRACES_PATH: &str = "/v1/traces";
pub const METRICS_PATH: &str = "/v1/metrics";

const USER_PROJECT_HEADER: HeaderName = HeaderName::from_static("x-goog-user-project");

/// Blocking HTTP client that attaches a bearer token and the quota project
/// to every export request.
#[derive(Debug, Clone)]
pub struct GoogleAuthHttpClient {
    client: reqwest::blocking::Client,
    credentials: Arc<AmbientCredentials>,
    project_id: String,
}

impl GoogleAuthHttpClient {
    /// Build the client off the async runtime; reqwest's blocking client
    /// cannot be constructed from inside a tokio worker.
    pub fn new(
        credentials: Arc<AmbientCredentials>,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let client = std::thread::spawn(move || {
            reqwest::blocking::Client::builder().timeout(timeout).build()
        })
        .join()
        .map_err(|_| TelemetryError::HttpClient("client builder thread panicked".to_string()))?
        .map_err(|e| TelemetryError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            project_id: project_id.into(),
        })
    }

    fn authorize<T>(&self, request: &mut Request<T>) -> Result<(), HttpError> {
        let headers = request.headers_mut();

        if let Some(token) = self.credentials.blocking_access_token(&self.client) {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        if !self.project_id.is_empty() {
            headers.insert(USER_PROJECT_HEADER, HeaderValue::from_str(&self.project_id)?);
        }

        Ok(())
    }
}

#[async_trait]
impl HttpClient for GoogleAuthHttpClient {
    async fn send_bytes(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        self.authorize(&mut request)?;

        let request: reqwest::blocking::Request = request.try_into()?;
        let mut response = self.client.execute(request)?.error_for_status()?;

        let headers = std::mem::take(response.headers_mut());
        let mut http_response = Response::builder()
            .status(response.status())
            .body(response.bytes()?)?;
        *http_response.headers_mut() = headers;

        Ok(http_response)
    }
}

/// Join the OTLP base endpoint and a signal path
pub fn signal_endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

pub fn span_exporter(
    config: &TelemetryConfig,
    client: GoogleAuthHttpClient,
) -> Result<SpanExporter, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(&config.otlp_endpoint, TRACES_PATH))
        .with_timeout(config.export_timeout())
        .with_http_client(client)
        .build()?;

    Ok(exporter)
}

pub fn metric_exporter(
    config: &TelemetryConfig,
    client: GoogleAuthHttpClient,
) -> Result<MetricExporter, TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_endpoint(signal_endpoint(&config.otlp_endpoint, METRICS_PATH))
        .with_timeout(config.export_timeout())
        .with_http_client(client)
        .build()?;

    Ok(exporter)
}
