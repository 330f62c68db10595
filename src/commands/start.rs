use anyhow::Result;
use genai_facts::{
    config,
    handlers::facts::AppState,
    init_tracing, metrics,
    observability::Telemetry,
    providers::VertexClient,
    server,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the start command
///
/// This will:
/// 1. Load configuration
/// 2. Bootstrap telemetry (identity, exporters, globals)
/// 3. Install the tracing subscriber bridged to OpenTelemetry
/// 4. Start the server, flushing telemetry once it stops
pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    let telemetry = Telemetry::bootstrap(&cfg).await?;
    init_tracing(&cfg.telemetry.log_level, Some(telemetry.tracer()))?;

    info!(
        project_id = %telemetry.identity().project_id,
        region = %telemetry.identity().region,
        service_name = cfg.telemetry.service_name(),
        export_enabled = cfg.telemetry.export_enabled,
        resource_attributes = telemetry.resource().len(),
        "Telemetry initialized"
    );

    // Metadata lookups ran before the subscriber existed
    let missing = telemetry.identity().missing_fields();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            metadata_url = %cfg.google.metadata_url,
            "Resource identity incomplete; set GOOGLE_CLOUD_PROJECT / LOCATION_ID or check the metadata server"
        );
    }

    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let model = VertexClient::new(
        telemetry.http_client().clone(),
        telemetry.credentials(),
        &cfg.model,
        telemetry.identity(),
    );
    info!(model = %cfg.model.name, url = %model.url(), "Model client configured");

    let app_state = AppState {
        model: Arc::new(model),
        counter: telemetry.call_counter(),
        logger: telemetry.logger(),
    };

    let app = server::create_router(&cfg.server, app_state, metrics_handle);
    let result = server::start_server(&cfg.server, app).await;
    telemetry.flush();
    result
}
