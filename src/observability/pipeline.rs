use opentelemetry::global;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::counter::{CallCounter, OtelCallCounter};
use super::exporter::{self, GoogleAuthHttpClient};
use super::resource::{build_resource, CloudRunDetector};
use super::TelemetryError;
use crate::config::Config;
use crate::credentials::AmbientCredentials;
use crate::logging::{Severity, StructuredLogger};
use crate::metadata::{MetadataClient, ResourceIdentity};

/// Instrumentation scope for every tracer and meter this service creates
pub const INSTRUMENTATION_SCOPE: &str = "o11y/demo/rust";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Process-wide telemetry state created once by [`Telemetry::bootstrap`]
pub struct Telemetry {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    resource: Resource,
    identity: ResourceIdentity,
    credentials: Arc<AmbientCredentials>,
    http_client: reqwest::Client,
    counter: Arc<OtelCallCounter>,
    min_severity: Severity,
}

impl Telemetry {
    /// Resolve the resource identity, build the trace and metric pipelines,
    /// and install them as the OpenTelemetry globals.
    ///
    /// Only the first call in a process does any work; every later call
    /// returns [`TelemetryError::AlreadyInitialized`].
    pub async fn bootstrap(config: &Config) -> Result<Self, TelemetryError> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TelemetryError::AlreadyInitialized);
        }

        let min_severity = config
            .telemetry
            .min_severity
            .parse::<Severity>()
            .map_err(TelemetryError::Config)?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| TelemetryError::HttpClient(e.to_string()))?;

        let metadata = MetadataClient::from_config(http_client.clone(), &config.google);
        let identity = ResourceIdentity::resolve(&config.google, &metadata).await;
        let credentials = Arc::new(AmbientCredentials::new(&config.google));

        let telemetry_config = &config.telemetry;
        let resource = build_resource(
            telemetry_config.service_name(),
            CloudRunDetector::from_env(identity.clone()),
        );

        let mut tracer_builder = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_sampler(Sampler::AlwaysOn);
        let mut meter_builder = SdkMeterProvider::builder().with_resource(resource.clone());

        if telemetry_config.export_enabled {
            let client = GoogleAuthHttpClient::new(
                Arc::clone(&credentials),
                identity.project_id.clone(),
                telemetry_config.export_timeout(),
            )?;

            tracer_builder =
                tracer_builder.with_batch_exporter(exporter::span_exporter(telemetry_config, client.clone())?);

            let reader = PeriodicReader::builder(exporter::metric_exporter(telemetry_config, client)?)
                .with_interval(telemetry_config.metric_export_interval())
                .build();
            meter_builder = meter_builder.with_reader(reader);
        }

        let tracer_provider = tracer_builder.build();
        let meter_provider = meter_builder.build();

        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        let counter = Arc::new(OtelCallCounter::new(
            &meter_provider.meter(INSTRUMENTATION_SCOPE),
        ));

        Ok(Self {
            tracer_provider,
            meter_provider,
            resource,
            identity,
            credentials,
            http_client,
            counter,
            min_severity,
        })
    }

    /// Tracer backing the `tracing-opentelemetry` layer
    pub fn tracer(&self) -> SdkTracer {
        self.tracer_provider.tracer(INSTRUMENTATION_SCOPE)
    }

    pub fn call_counter(&self) -> Arc<dyn CallCounter> {
        self.counter.clone()
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn credentials(&self) -> Arc<AmbientCredentials> {
        Arc::clone(&self.credentials)
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Push buffered spans and metric points before the process exits
    pub fn flush(&self) {
        if let Err(e) = self.tracer_provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush spans");
        }
        if let Err(e) = self.meter_provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush metrics");
        }
    }

    /// Request logger writing to stdout, attributed to the resolved project
    pub fn logger(&self) -> StructuredLogger {
        StructuredLogger::stdout(self.identity.project_id.clone(), self.min_severity)
    }
}
