//! Authority discovery document.
//!
//! The introspection endpoint is located through the authority's OpenID
//! Connect discovery document at `{authority}/.well-known/openid-configuration`.
//! The document is cached with a TTL so steady-state validation does one
//! network round trip (introspection), not two.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

const TARGET: &str = "grain.auth.discovery";

/// Well-known path of the discovery document, relative to the authority.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Default discovery cache TTL (1 hour).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Fields of the discovery document the host uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,

    /// RFC 7662 token introspection endpoint.
    #[serde(default)]
    pub introspection_endpoint: Option<String>,

    #[serde(default)]
    pub token_endpoint: Option<String>,

    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl DiscoveryDocument {
    /// The introspection endpoint, required for remote validation.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::MissingIntrospectionEndpoint` when the
    /// authority does not advertise one.
    pub fn introspection_endpoint(&self) -> Result<&str, DiscoveryError> {
        self.introspection_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(DiscoveryError::MissingIntrospectionEndpoint)
    }
}

/// Discovery failures. All of them surface to callers as an unavailable
/// authority.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Discovery request failed: {0}")]
    Request(String),

    #[error("Discovery endpoint returned status {0}")]
    Status(u16),

    #[error("Discovery document could not be parsed: {0}")]
    Parse(String),

    #[error("Discovery document has no introspection endpoint")]
    MissingIntrospectionEndpoint,
}

/// Source of the authority's discovery document.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Current discovery document, possibly served from cache.
    async fn discovery(&self) -> Result<DiscoveryDocument, DiscoveryError>;
}

struct CachedDocument {
    document: DiscoveryDocument,
    expires_at: Instant,
}

/// Fetches the discovery document over HTTP and caches it for a TTL.
pub struct HttpDiscoveryProvider {
    discovery_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedDocument>>>,
    cache_ttl: Duration,
}

impl HttpDiscoveryProvider {
    /// Create a provider for `authority_url` with the default TTL.
    pub fn new(authority_url: &str, http_client: reqwest::Client) -> Self {
        Self::with_ttl(
            authority_url,
            http_client,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
        )
    }

    /// Create a provider for `authority_url` with a custom cache TTL.
    pub fn with_ttl(authority_url: &str, http_client: reqwest::Client, cache_ttl: Duration) -> Self {
        let discovery_url = format!("{}{DISCOVERY_PATH}", authority_url.trim_end_matches('/'));
        Self {
            discovery_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    #[must_use]
    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<DiscoveryDocument, DiscoveryError> {
        tracing::debug!(target: TARGET, url = %self.discovery_url, "Fetching discovery document");

        let response = self
            .http_client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: TARGET, error = %e, "Failed to fetch discovery document");
                DiscoveryError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: TARGET, status = %status, "Discovery endpoint returned error");
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let document: DiscoveryDocument = response.json().await.map_err(|e| {
            tracing::warn!(target: TARGET, error = %e, "Failed to parse discovery document");
            DiscoveryError::Parse(e.to_string())
        })?;

        tracing::info!(
            target: TARGET,
            issuer = %document.issuer,
            has_introspection = document.introspection_endpoint.is_some(),
            "Discovery document refreshed"
        );

        Ok(document)
    }

    /// Drop the cached document so the next call refetches.
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }
}

#[async_trait]
impl DiscoveryProvider for HttpDiscoveryProvider {
    async fn discovery(&self) -> Result<DiscoveryDocument, DiscoveryError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.document.clone());
                }
            }
        }

        // Concurrent misses may each fetch; the last one to finish is kept.
        let document = self.fetch().await?;

        match Instant::now().checked_add(self.cache_ttl) {
            Some(expires_at) => {
                *self.cache.write().await = Some(CachedDocument {
                    document: document.clone(),
                    expires_at,
                });
            }
            None => {
                tracing::warn!(
                    target: TARGET,
                    ttl_secs = self.cache_ttl.as_secs(),
                    "Discovery cache TTL out of range, document not cached"
                );
            }
        }

        Ok(document)
    }
}

/// Fixed discovery document, for hosts whose endpoints are configured
/// statically and for tests.
pub struct StaticDiscovery {
    document: DiscoveryDocument,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(document: DiscoveryDocument) -> Self {
        Self { document }
    }
}

#[async_trait]
impl DiscoveryProvider for StaticDiscovery {
    async fn discovery(&self) -> Result<DiscoveryDocument, DiscoveryError> {
        Ok(self.document.clone())
    }
}
