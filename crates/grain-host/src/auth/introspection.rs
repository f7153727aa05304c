//! Remote token introspection (RFC 7662).
//!
//! Asks the authority whether a token is still active. The endpoint is taken
//! from the discovery document; the host authenticates as an API resource
//! with HTTP basic client credentials.
//!
//! # Security
//!
//! - The raw token is sent only in the form body, never logged
//! - The client secret is held in a `SecretString`
//! - Response status and bodies are logged at debug/warn, never surfaced

use crate::auth::discovery::DiscoveryProvider;
use crate::observability::metrics;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const TARGET: &str = "grain.auth.introspection";

/// Token type hint sent with every request.
const ACCESS_TOKEN_HINT: &str = "access_token";

/// Authority's verdict on a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionOutcome {
    Active,
    Inactive,
}

/// Introspection failures.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("Introspection transport error: {0}")]
    Transport(String),

    /// The authority could not be used: discovery failed, a non-success
    /// status was returned, or the response body was not understood.
    #[error("Introspection authority error: {0}")]
    Authority(String),
}

impl IntrospectionError {
    fn status_label(&self) -> &'static str {
        match self {
            IntrospectionError::Transport(_) => "transport_error",
            IntrospectionError::Authority(_) => "authority_error",
        }
    }
}

/// Remote token liveness check.
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    /// Ask the authority whether `raw` is active.
    async fn introspect(&self, raw: &str) -> Result<IntrospectionOutcome, IntrospectionError>;
}

/// Fields of the introspection response the host reads.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

/// API resource credentials presented to the introspection endpoint.
#[derive(Clone)]
pub struct IntrospectionCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl fmt::Debug for IntrospectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Introspection over HTTP against the discovered endpoint.
pub struct HttpTokenIntrospector {
    discovery: Arc<dyn DiscoveryProvider>,
    credentials: IntrospectionCredentials,
    http_client: reqwest::Client,
}

impl HttpTokenIntrospector {
    pub fn new(
        discovery: Arc<dyn DiscoveryProvider>,
        credentials: IntrospectionCredentials,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            discovery,
            credentials,
            http_client,
        }
    }

    async fn introspect_inner(
        &self,
        raw: &str,
    ) -> Result<IntrospectionOutcome, IntrospectionError> {
        let document = self.discovery.discovery().await.map_err(|e| {
            tracing::warn!(target: TARGET, error = %e, "Discovery failed");
            IntrospectionError::Authority(e.to_string())
        })?;

        let endpoint = document.introspection_endpoint().map_err(|e| {
            tracing::warn!(target: TARGET, error = %e, "No introspection endpoint");
            IntrospectionError::Authority(e.to_string())
        })?;

        let response = self
            .http_client
            .post(endpoint)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&[("token", raw), ("token_type_hint", ACCESS_TOKEN_HINT)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: TARGET, error = %e, "Introspection request failed");
                IntrospectionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: TARGET, status = %status, "Introspection endpoint returned error");
            return Err(IntrospectionError::Authority(format!("status {status}")));
        }

        let body: IntrospectionResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: TARGET, error = %e, "Failed to parse introspection response");
            IntrospectionError::Authority(e.to_string())
        })?;

        Ok(if body.active {
            IntrospectionOutcome::Active
        } else {
            IntrospectionOutcome::Inactive
        })
    }
}

#[async_trait]
impl TokenIntrospector for HttpTokenIntrospector {
    #[instrument(skip_all)]
    async fn introspect(&self, raw: &str) -> Result<IntrospectionOutcome, IntrospectionError> {
        let start = Instant::now();
        let result = self.introspect_inner(raw).await;

        let status = match &result {
            Ok(IntrospectionOutcome::Active) => "active",
            Ok(IntrospectionOutcome::Inactive) => "inactive",
            Err(e) => e.status_label(),
        };
        metrics::record_introspection(status, start.elapsed());
        tracing::debug!(target: TARGET, status, "Introspection completed");

        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::discovery::{DiscoveryDocument, HttpDiscoveryProvider, StaticDiscovery};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("api:secret")
    const BASIC_API_SECRET: &str = "Basic YXBpOnNlY3JldA==";

    fn credentials() -> IntrospectionCredentials {
        IntrospectionCredentials {
            client_id: "api".to_string(),
            client_secret: SecretString::from("secret"),
        }
    }

    fn introspector_for(server: &MockServer) -> HttpTokenIntrospector {
        let discovery = StaticDiscovery::new(DiscoveryDocument {
            issuer: server.uri(),
            introspection_endpoint: Some(format!("{}/connect/introspect", server.uri())),
            token_endpoint: None,
            jwks_uri: None,
        });
        HttpTokenIntrospector::new(Arc::new(discovery), credentials(), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_active_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/introspect"))
            .and(header("authorization", BASIC_API_SECRET))
            .and(body_string_contains("token=eyJ.a.b"))
            .and(body_string_contains("token_type_hint=access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "active": true,
                "sub": "alice",
                "scope": "api"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = introspector_for(&server).introspect("eyJ.a.b").await.unwrap();
        assert_eq!(outcome, IntrospectionOutcome::Active);
    }

    #[tokio::test]
    async fn test_inactive_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/introspect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "active": false })),
            )
            .mount(&server)
            .await;

        let outcome = introspector_for(&server).introspect("eyJ.a.b").await.unwrap();
        assert_eq!(outcome, IntrospectionOutcome::Inactive);
    }

    #[tokio::test]
    async fn test_error_status_is_authority_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/introspect"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = introspector_for(&server).introspect("eyJ.a.b").await;
        assert!(matches!(result, Err(IntrospectionError::Authority(ref m)) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_unparsable_body_is_authority_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/connect/introspect"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"scope\": \"api\"}"))
            .mount(&server)
            .await;

        let result = introspector_for(&server).introspect("eyJ.a.b").await;
        assert!(matches!(result, Err(IntrospectionError::Authority(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let discovery = StaticDiscovery::new(DiscoveryDocument {
            issuer: "http://127.0.0.1:9".to_string(),
            introspection_endpoint: Some("http://127.0.0.1:9/connect/introspect".to_string()),
            token_endpoint: None,
            jwks_uri: None,
        });
        let introspector =
            HttpTokenIntrospector::new(Arc::new(discovery), credentials(), reqwest::Client::new());

        let result = introspector.introspect("eyJ.a.b").await;
        assert!(matches!(result, Err(IntrospectionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_authority_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let discovery = HttpDiscoveryProvider::new(&server.uri(), reqwest::Client::new());
        let introspector =
            HttpTokenIntrospector::new(Arc::new(discovery), credentials(), reqwest::Client::new());

        let result = introspector.introspect("eyJ.a.b").await;
        assert!(matches!(result, Err(IntrospectionError::Authority(_))));
    }

    #[tokio::test]
    async fn test_missing_introspection_endpoint_is_authority_error() {
        let discovery = StaticDiscovery::new(DiscoveryDocument {
            issuer: "https://authority".to_string(),
            introspection_endpoint: None,
            token_endpoint: None,
            jwks_uri: None,
        });
        let introspector =
            HttpTokenIntrospector::new(Arc::new(discovery), credentials(), reqwest::Client::new());

        let result = introspector.introspect("eyJ.a.b").await;
        assert!(matches!(result, Err(IntrospectionError::Authority(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let debug_str = format!("{:?}", credentials());
        assert!(debug_str.contains("api"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret\""));
    }
}
