use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::AppError,
    logging::{LogError, LogRecord, Severity, StructuredLogger, TraceCorrelation},
    metrics,
    observability::CallCounter,
    providers::{Generation, ModelClient},
};

/// Subject used when the request names none
pub const DEFAULT_SUBJECT: &str = "dog";

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn ModelClient>,
    pub counter: Arc<dyn CallCounter>,
    pub logger: StructuredLogger,
}

/// `/facts` query parameters; `animal` is the legacy name for `subject`
#[derive(Debug, Default, Deserialize)]
pub struct FactsQuery {
    pub subject: Option<String>,
    pub animal: Option<String>,
}

impl FactsQuery {
    pub fn subject(&self) -> &str {
        [self.subject.as_deref(), self.animal.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
    }
}

pub fn build_prompt(subject: &str) -> String {
    format!("Give me 10 fun facts about {subject}. Return this as html without backticks.")
}

/// Handle /facts endpoint
pub async fn handle_facts(
    State(state): State<AppState>,
    Query(query): Query<FactsQuery>,
) -> Result<Response, AppError> {
    let subject = query.subject();
    let prompt = build_prompt(subject);
    let model = state.model.model_name().to_string();

    tracing::debug!(subject = %subject, model = %model, "Generating facts");

    let start = Instant::now();
    let result = state.model.generate_content(&prompt).await;
    metrics::record_duration(&model, start.elapsed());

    match result {
        Ok(generation) => {
            state.counter.record_call();

            let trace = TraceCorrelation::current();
            if let Err(e) = log_generation(&state.logger, &trace, subject, &prompt, &generation) {
                tracing::error!(error = %e, "Failed to write request log");
            }

            Ok(Html(generation.text).into_response())
        }
        Err(err) => {
            metrics::record_model_error(&model, err.code);
            tracing::warn!(
                model = %model,
                code = err.code,
                error = %err.message,
                "Model invocation failed"
            );
            Err(AppError::Model(err))
        }
    }
}

fn log_generation(
    logger: &StructuredLogger,
    trace: &TraceCorrelation,
    subject: &str,
    prompt: &str,
    generation: &Generation,
) -> Result<(), LogError> {
    let record = LogRecord::new(Severity::Debug, "content is generated")
        .field("subject", subject)?
        .field("prompt", prompt)?
        .field("response", &generation.response)?;

    logger.with_trace(*trace).log(&record)
}
