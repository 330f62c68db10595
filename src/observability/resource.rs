//! Resource detection for Cloud Run.

use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::{Resource, ResourceDetector};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;

use crate::metadata::ResourceIdentity;

const CLOUD_PROVIDER: &str = "cloud.provider";
const CLOUD_PLATFORM: &str = "cloud.platform";
const CLOUD_ACCOUNT_ID: &str = "cloud.account.id";
const CLOUD_REGION: &str = "cloud.region";
const FAAS_NAME: &str = "faas.name";
const FAAS_VERSION: &str = "faas.version";
const GCP_PROJECT_ID: &str = "gcp.project_id";

/// Detects Cloud Run attributes from the resolved identity and the
/// `K_SERVICE`/`K_REVISION` variables the platform injects.
///
/// Unknown values are omitted, so detection outside Cloud Run yields a
/// partial resource.
#[derive(Debug, Clone, Default)]
pub struct CloudRunDetector {
    identity: ResourceIdentity,
    service: Option<String>,
    revision: Option<String>,
}

impl CloudRunDetector {
    pub fn new(
        identity: ResourceIdentity,
        service: Option<String>,
        revision: Option<String>,
    ) -> Self {
        Self {
            identity,
            service,
            revision,
        }
    }

    pub fn from_env(identity: ResourceIdentity) -> Self {
        Self::new(
            identity,
            std::env::var("K_SERVICE").ok(),
            std::env::var("K_REVISION").ok(),
        )
    }

    pub fn attributes(&self) -> Vec<KeyValue> {
        let on_cloud_run = self.service.as_deref().is_some_and(|s| !s.is_empty());

        let mut attributes = Vec::new();
        if on_cloud_run || !self.identity.project_id.is_empty() {
            attributes.push(KeyValue::new(CLOUD_PROVIDER, "gcp"));
        }
        if on_cloud_run {
            attributes.push(KeyValue::new(CLOUD_PLATFORM, "gcp_cloud_run"));
        }

        let candidates = [
            (CLOUD_ACCOUNT_ID, Some(self.identity.project_id.as_str())),
            (CLOUD_REGION, Some(self.identity.region.as_str())),
            (FAAS_NAME, self.service.as_deref()),
            (FAAS_VERSION, self.revision.as_deref()),
        ];
        attributes.extend(
            candidates
                .into_iter()
                .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
                .map(|(key, value)| KeyValue::new(key, value.to_string())),
        );

        attributes
    }
}

impl ResourceDetector for CloudRunDetector {
    fn detect(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(self.attributes())
            .build()
    }
}

/// Attributes set explicitly on top of everything detected
pub fn service_attributes(service_name: &str, identity: &ResourceIdentity) -> Vec<KeyValue> {
    vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(GCP_PROJECT_ID, identity.project_id.clone()),
    ]
}

/// Build the process resource: SDK defaults, then Cloud Run detection,
/// then the explicit service attributes.
pub fn build_resource(service_name: &str, detector: CloudRunDetector) -> Resource {
    let explicit = service_attributes(service_name, &detector.identity);

    Resource::builder()
        .with_detector(Box::new(detector))
        .with_attributes(explicit)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Key;

    fn keys(attributes: &[KeyValue]) -> Vec<&str> {
        attributes.iter().map(|kv| kv.key.as_str()).collect()
    }

    #[test]
    fn test_full_cloud_run_detection() {
        let detector = CloudRunDetector::new(
            ResourceIdentity::new("my-project", "us-central1"),
            Some("facts".to_string()),
            Some("facts-00001-abc".to_string()),
        );

        let attributes = detector.attributes();
        assert_eq!(
            keys(&attributes),
            vec![
                CLOUD_PROVIDER,
                CLOUD_PLATFORM,
                CLOUD_ACCOUNT_ID,
                CLOUD_REGION,
                FAAS_NAME,
                FAAS_VERSION
            ]
        );
    }

    #[test]
    fn test_partial_detection_skips_unknown_values() {
        let detector = CloudRunDetector::new(ResourceIdentity::new("my-project", ""), None, None);

        let attributes = detector.attributes();
        assert_eq!(keys(&attributes), vec![CLOUD_PROVIDER, CLOUD_ACCOUNT_ID]);
    }

    #[test]
    fn test_nothing_detected_off_platform() {
        let detector = CloudRunDetector::new(ResourceIdentity::default(), Some(String::new()), None);
        assert!(detector.attributes().is_empty());
    }

    #[test]
    fn test_explicit_service_attributes_win() {
        let detector = CloudRunDetector::new(
            ResourceIdentity::new("p", "r"),
            Some("k-service".to_string()),
            None,
        );
        let resource = build_resource("genai-facts", detector);

        assert_eq!(
            resource.get(&Key::new(SERVICE_NAME)).map(|v| v.to_string()),
            Some("genai-facts".to_string())
        );
        assert_eq!(
            resource.get(&Key::new(FAAS_NAME)).map(|v| v.to_string()),
            Some("k-service".to_string())
        );
    }
}
