#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use genai_facts::{
    config::ServerConfig,
    handlers::facts::AppState,
    logging::{Severity, SharedBuffer, StructuredLogger},
    observability::{CallCounter, InMemoryCallCounter},
    providers::{Generation, ModelClient, ModelError},
    server::create_router,
};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Model stub replaying scripted outcomes; the last one repeats
pub struct ScriptedModel {
    outcomes: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(outcomes: Vec<Result<String, ModelError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(code: u16, message: &str) -> Self {
        Self::new(vec![Err(ModelError::new(code, message))])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate_content(&self, prompt: &str) -> Result<Generation, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut outcomes = self.outcomes.lock().unwrap();
        let outcome = if outcomes.len() > 1 {
            outcomes.pop_front().unwrap()
        } else {
            outcomes.front().cloned().unwrap()
        };

        outcome.map(Generation::from_text)
    }
}

pub struct TestApp<C = InMemoryCallCounter> {
    pub router: Router,
    pub model: Arc<ScriptedModel>,
    pub counter: Arc<C>,
    pub logs: SharedBuffer,
}

impl TestApp<InMemoryCallCounter> {
    pub fn new(model: ScriptedModel) -> Self {
        Self::with_counter(model, Arc::new(InMemoryCallCounter::new()))
    }
}

impl<C: CallCounter + 'static> TestApp<C> {
    pub fn with_counter(model: ScriptedModel, counter: Arc<C>) -> Self {
        let model = Arc::new(model);
        let logs = SharedBuffer::new();

        let state = AppState {
            model: model.clone(),
            counter: counter.clone(),
            logger: StructuredLogger::with_writer("test-project", Severity::Debug, logs.clone()),
        };
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            static_dir: "static".into(),
        };
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();

        Self {
            router: create_router(&config, state, Arc::new(handle)),
            model,
            counter,
            logs,
        }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        Response {
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Meter provider whose exports land in memory
pub fn exporting_meter_provider() -> (SdkMeterProvider, InMemoryMetricExporter) {
    let exporter = InMemoryMetricExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter.clone()).build())
        .build();
    (provider, exporter)
}

/// Value and attributes of each data point in the latest export of `name`
pub fn exported_sum(exporter: &InMemoryMetricExporter, name: &str) -> Vec<(u64, Vec<KeyValue>)> {
    exporter
        .get_finished_metrics()
        .unwrap()
        .iter()
        .flat_map(|rm| rm.scope_metrics())
        .flat_map(|sm| sm.metrics())
        .filter(|m| m.name() == name)
        .filter_map(|m| match m.data() {
            AggregatedMetrics::U64(MetricData::Sum(sum)) => Some(
                sum.data_points()
                    .map(|dp| (dp.value(), dp.attributes().cloned().collect()))
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .last()
        .unwrap_or_default()
}
