use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for explicit configuration variables (`GENAI_FACTS__SERVER__PORT`)
pub const ENV_PREFIX: &str = "GENAI_FACTS";

/// Service name used when the platform does not inject one
pub const DEFAULT_SERVICE_NAME: &str = "genai-facts";

/// Default Gemini model identifier
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.5-flash";

/// Platform-injected variables mapped onto configuration keys.
/// These win over the file and the prefixed environment.
const PLATFORM_OVERRIDES: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("MODEL_NAME", "model.name"),
    ("K_SERVICE", "telemetry.service_name"),
    ("GOOGLE_CLOUD_PROJECT", "google.project_id"),
    ("LOCATION_ID", "google.region"),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub google: GoogleConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `index.html` and `favicon.ico`
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub name: String,
    /// Vertex AI location; falls back to the resolved region
    pub location: Option<String>,
    /// API base URL override (defaults to the regional Vertex AI endpoint)
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleConfig {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub metadata_url: String,
    pub metadata_timeout_seconds: u64,
    /// Static OAuth token, used instead of the metadata server
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub service_name: Option<String>,
    /// When false, providers are built without exporters
    pub export_enabled: bool,
    pub otlp_endpoint: String,
    pub metric_export_interval_seconds: u64,
    pub export_timeout_seconds: u64,
    /// Default filter for diagnostics when `RUST_LOG` is unset
    pub log_level: String,
    /// Minimum severity written by the structured request logger
    pub min_severity: String,
}

impl ServerConfig {
    pub fn index_file(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }

    pub fn favicon_file(&self) -> PathBuf {
        self.static_dir.join("favicon.ico")
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl GoogleConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_seconds)
    }
}

impl TelemetryConfig {
    pub fn service_name(&self) -> &str {
        self.service_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SERVICE_NAME)
    }

    pub fn metric_export_interval(&self) -> Duration {
        Duration::from_secs(self.metric_export_interval_seconds)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_seconds)
    }
}

/// Load configuration from the process environment.
///
/// `path` names an explicit configuration file; without it an optional
/// `config.{toml,yaml,json}` in the working directory is used.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let env: HashMap<String, String> = std::env::vars().collect();
    build_config(path, &env)
}

/// Build configuration from an explicit environment map.
pub fn build_config(path: Option<&Path>, env: &HashMap<String, String>) -> anyhow::Result<Config> {
    let mut builder = config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080_i64)?
        .set_default("server.static_dir", "static")?
        .set_default("model.name", DEFAULT_MODEL_NAME)?
        .set_default("model.timeout_seconds", 60_i64)?
        .set_default(
            "google.metadata_url",
            crate::metadata::DEFAULT_METADATA_URL,
        )?
        .set_default("google.metadata_timeout_seconds", 5_i64)?
        .set_default("telemetry.export_enabled", true)?
        .set_default("telemetry.otlp_endpoint", "https://telemetry.googleapis.com")?
        .set_default("telemetry.metric_export_interval_seconds", 5_i64)?
        .set_default("telemetry.export_timeout_seconds", 10_i64)?
        .set_default("telemetry.log_level", "info")?
        .set_default("telemetry.min_severity", "DEBUG")?;

    builder = match path {
        Some(path) => builder.add_source(config::File::from(path)),
        None => builder.add_source(config::File::with_name("config").required(false)),
    };

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(env.clone().into_iter().collect())),
    );

    for (variable, key) in PLATFORM_OVERRIDES {
        let value = env.get(*variable).filter(|v| !v.is_empty()).cloned();
        builder = builder.set_override_option(*key, value)?;
    }

    let cfg: Config = builder.build()?.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.model.name.trim().is_empty() {
        anyhow::bail!("Model name cannot be empty");
    }

    if cfg.model.timeout_seconds == 0 {
        anyhow::bail!("model.timeout_seconds must be greater than 0");
    }

    if cfg.google.metadata_timeout_seconds == 0 {
        anyhow::bail!("google.metadata_timeout_seconds must be greater than 0");
    }

    if cfg.telemetry.metric_export_interval_seconds == 0 {
        anyhow::bail!("telemetry.metric_export_interval_seconds must be greater than 0");
    }

    if cfg.telemetry.export_timeout_seconds == 0 {
        anyhow::bail!("telemetry.export_timeout_seconds must be greater than 0");
    }

    if cfg
        .telemetry
        .min_severity
        .parse::<crate::logging::Severity>()
        .is_err()
    {
        anyhow::bail!(
            "Invalid telemetry.min_severity: {}",
            cfg.telemetry.min_severity
        );
    }

    Ok(())
}
