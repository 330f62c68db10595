pub mod vertex;

pub use vertex::VertexClient;

use async_trait::async_trait;
use axum::http::StatusCode;
use std::fmt;

use crate::models::gemini::{Candidate, Content, GenerateContentResponse, Part};

/// Typed model failure carrying the status code to surface to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    pub code: u16,
    pub message: String,
}

impl ModelError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT.as_u16(), message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY.as_u16(), message)
    }

    /// HTTP status for this error; unrepresentable codes become 502
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code)
            .ok()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for ModelError {}

/// Successful model output
#[derive(Debug, Clone)]
pub struct Generation {
    /// Text returned to the caller
    pub text: String,
    /// Full model payload, logged alongside the request
    pub response: GenerateContentResponse,
}

impl Generation {
    /// Build a generation whose payload holds a single text candidate
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: Some(text.clone()),
                    }],
                },
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: None,
            model_version: None,
        };

        Self { text, response }
    }
}

/// Generative model backend
#[async_trait]
pub trait ModelClient: Send + Sync + 'static {
    /// Model identifier, used as a metric label
    fn model_name(&self) -> &str;

    async fn generate_content(&self, prompt: &str) -> Result<Generation, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ModelError::new(429, "x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ModelError::timeout("x").status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ModelError::new(200, "x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ModelError::new(1000, "x").status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_generation_from_text() {
        let generation = Generation::from_text("T");
        assert_eq!(generation.text, "T");
        assert_eq!(generation.response.text().as_deref(), Some("T"));
    }
}
