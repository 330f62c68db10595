//! Resource identity resolution against the GCE/Cloud Run metadata server.
//!
//! Every lookup degrades to an empty string: an unreachable metadata server
//! means "unknown", never an error for the caller.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::GoogleConfig;

/// Base URL of the metadata server
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1/";

/// Header required by the metadata server on every request
pub const METADATA_FLAVOR_HEADER: (&str, &str) = ("Metadata-Flavor", "Google");

pub const PROJECT_ID_KEY: &str = "project/project-id";
pub const REGION_KEY: &str = "instance/region";
pub const TOKEN_KEY: &str = "instance/service-accounts/default/token";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metadata server returned {0}")]
    Status(reqwest::StatusCode),
}

/// Client for the metadata server
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl MetadataClient {
    pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(client: Client, config: &GoogleConfig) -> Self {
        Self::new(client, config.metadata_url.clone(), config.metadata_timeout())
    }

    pub fn url(&self, key: &str) -> String {
        metadata_url(&self.base_url, key)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch a metadata value, reporting why it was unavailable
    pub async fn fetch(&self, key: &str) -> Result<String, MetadataError> {
        let response = self
            .client
            .get(self.url(key))
            .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MetadataError::Status(response.status()));
        }

        Ok(response.text().await?)
    }

    /// Resolve a metadata value; any failure yields an empty string
    pub async fn resolve(&self, key: &str) -> String {
        match self.fetch(key).await {
            Ok(value) => value,
            Err(err) => {
                debug!(key, error = %err, "metadata lookup failed");
                String::new()
            }
        }
    }

    pub async fn project_id(&self) -> String {
        self.resolve(PROJECT_ID_KEY).await
    }

    pub async fn region(&self) -> String {
        parse_region(&self.resolve(REGION_KEY).await).to_string()
    }
}

/// Join a metadata base URL and key
pub fn metadata_url(base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Extract the region from a fully qualified `projects/<num>/regions/<region>` value.
///
/// Returns the final path segment; input without a slash is returned unchanged.
pub fn parse_region(raw: &str) -> &str {
    match raw.rfind('/') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    }
}

/// Project and region this process runs in. Empty strings mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub project_id: String,
    pub region: String,
}

impl ResourceIdentity {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
        }
    }

    /// Resolve identity, preferring configured overrides over the metadata server.
    ///
    /// The metadata server is only queried for values without an override.
    pub async fn resolve(config: &GoogleConfig, metadata: &MetadataClient) -> Self {
        let project_id = match non_empty(config.project_id.as_deref()) {
            Some(project_id) => project_id.to_string(),
            None => metadata.project_id().await,
        };

        let region = match non_empty(config.region.as_deref()) {
            Some(region) => parse_region(region).to_string(),
            None => metadata.region().await,
        };

        Self { project_id, region }
    }

    /// Names of the fields neither an override nor the metadata server supplied
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("project_id", &self.project_id), ("region", &self.region)]
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
