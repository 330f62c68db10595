//! Ambient platform credentials.
//!
//! Access tokens come from a configured static token or from the metadata
//! server's default service account. Tokens are cached until shortly before
//! they expire. A missing token is not an error: callers send the request
//! unauthenticated and let the upstream decide.

use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::GoogleConfig;
use crate::metadata::{metadata_url, METADATA_FLAVOR_HEADER, TOKEN_KEY};

/// Tokens are refreshed this long before the server-reported expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug)]
pub struct AmbientCredentials {
    static_token: Option<String>,
    token_url: String,
    timeout: Duration,
    cache: Mutex<Option<CachedToken>>,
}

impl AmbientCredentials {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            static_token: config.access_token.clone().filter(|t| !t.is_empty()),
            token_url: metadata_url(&config.metadata_url, TOKEN_KEY),
            timeout: config.metadata_timeout(),
            cache: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Resolve an access token from an async context
    pub async fn access_token(&self, client: &reqwest::Client) -> Option<String> {
        if let Some(token) = self.cached() {
            return Some(token);
        }

        let result = async {
            client
                .get(&self.token_url)
                .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1)
                .timeout(self.timeout)
                .send()
                .await?
                .error_for_status()?
                .json::<TokenResponse>()
                .await
        }
        .await;

        self.store(result)
    }

    /// Resolve an access token from a blocking context (exporter threads)
    pub fn blocking_access_token(&self, client: &reqwest::blocking::Client) -> Option<String> {
        if let Some(token) = self.cached() {
            return Some(token);
        }

        let result = client
            .get(&self.token_url)
            .header(METADATA_FLAVOR_HEADER.0, METADATA_FLAVOR_HEADER.1)
            .timeout(self.timeout)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json::<TokenResponse>());

        self.store(result)
    }

    fn cached(&self) -> Option<String> {
        if let Some(token) = &self.static_token {
            return Some(token.clone());
        }

        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
            .map(|token| token.value.clone())
    }

    fn store(&self, result: Result<TokenResponse, reqwest::Error>) -> Option<String> {
        match result {
            Ok(response) => {
                let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
                let token = CachedToken {
                    value: response.access_token,
                    refresh_at: Instant::now() + lifetime,
                };
                let value = token.value.clone();
                *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
                Some(value)
            }
            Err(err) => {
                debug!(error = %err, "no ambient access token available");
                None
            }
        }
    }
}
