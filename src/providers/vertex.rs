use async_trait::async_trait;
use opentelemetry::global;
use opentelemetry_http::HeaderInjector;
use reqwest::{header::HeaderMap, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{Generation, ModelClient, ModelError};
use crate::{
    config::ModelConfig,
    credentials::AmbientCredentials,
    metadata::ResourceIdentity,
    models::gemini::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse},
};

/// Location used when neither the config nor the metadata server names one
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Vertex AI `generateContent` client
pub struct VertexClient {
    client: Client,
    credentials: Arc<AmbientCredentials>,
    model: String,
    url: String,
    timeout: Duration,
}

impl VertexClient {
    pub fn new(
        client: Client,
        credentials: Arc<AmbientCredentials>,
        config: &ModelConfig,
        identity: &ResourceIdentity,
    ) -> Self {
        let location = resolve_location(config, identity);
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(&location));

        Self {
            client,
            credentials,
            url: generate_content_url(&endpoint, &identity.project_id, &location, &config.name),
            model: config.name.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::timeout(format!(
                "model request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            ModelError::bad_gateway(format!("model request failed: {err}"))
        }
    }
}

#[async_trait]
impl ModelClient for VertexClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(
        name = "generate_content",
        skip_all,
        fields(
            otel.kind = "client",
            gen_ai.system = "vertex_ai",
            gen_ai.request.model = tracing::field::Empty
        )
    )]
    async fn generate_content(&self, prompt: &str) -> Result<Generation, ModelError> {
        let span = tracing::Span::current();
        span.record("gen_ai.request.model", self.model.as_str());

        let mut headers = HeaderMap::new();
        let cx = span.context();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut HeaderInjector(&mut headers))
        });

        let mut builder = self
            .client
            .post(&self.url)
            .headers(headers)
            .timeout(self.timeout)
            .json(&GenerateContentRequest::from_prompt(prompt));

        if let Some(token) = self.credentials.access_token(&self.client).await {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }

        let response: GenerateContentResponse = serde_json::from_slice(&body)
            .map_err(|e| ModelError::bad_gateway(format!("failed to decode model response: {e}")))?;

        match response.text() {
            Some(text) => Ok(Generation { text, response }),
            None => Err(ModelError::bad_gateway("model returned no content")),
        }
    }
}

/// `model.location`, then the resolved region, then [`DEFAULT_LOCATION`]
pub fn resolve_location(config: &ModelConfig, identity: &ResourceIdentity) -> String {
    config
        .location
        .as_deref()
        .filter(|l| !l.is_empty())
        .or(Some(identity.region.as_str()).filter(|r| !r.is_empty()))
        .unwrap_or(DEFAULT_LOCATION)
        .to_string()
}

pub fn default_endpoint(location: &str) -> String {
    format!("https://{location}-aiplatform.googleapis.com/v1")
}

pub fn generate_content_url(endpoint: &str, project_id: &str, location: &str, model: &str) -> String {
    format!(
        "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        project_id,
        location,
        model
    )
}

/// Map a non-success response, preferring the Google error envelope
fn upstream_error(status: StatusCode, body: &[u8]) -> ModelError {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        if !envelope.error.message.is_empty() {
            let code = envelope.error.code.unwrap_or_else(|| status.as_u16());
            return ModelError::new(code, envelope.error.message);
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        text
    };

    ModelError::new(status.as_u16(), message)
}
