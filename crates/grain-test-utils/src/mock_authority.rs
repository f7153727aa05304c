//! Mock OIDC authority for grain-host tests.
//!
//! A wiremock server serving the discovery document and an RFC 7662
//! introspection endpoint that only answers the `api`/`secret` client.

use common::secret::SecretString;
use grain_host::config::Config;
use grain_host::filter::AccessTokenFilter;
use std::time::Duration;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const INTROSPECTION_PATH: &str = "/connect/introspect";
pub const CLIENT_ID: &str = "api";
pub const CLIENT_SECRET: &str = "secret";

/// How the introspection endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionBehavior {
    Active,
    Inactive,
    Status(u16),
    Garbage,
}

/// Mock authority backed by a wiremock server.
pub struct MockAuthority {
    server: MockServer,
}

impl MockAuthority {
    /// Start an authority whose introspection reports every token active.
    pub async fn start() -> Self {
        Self::start_with(IntrospectionBehavior::Active).await
    }

    /// Start an authority with the given introspection behavior.
    pub async fn start_with(behavior: IntrospectionBehavior) -> Self {
        let authority = Self {
            server: MockServer::start().await,
        };
        authority.mount(behavior).await;
        authority
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Change how introspection answers. Recorded requests are cleared.
    pub async fn set_behavior(&self, behavior: IntrospectionBehavior) {
        self.server.reset().await;
        self.mount(behavior).await;
    }

    async fn mount(&self, behavior: IntrospectionBehavior) {
        let base = self.server.uri();
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": base,
                "introspection_endpoint": format!("{base}{INTROSPECTION_PATH}"),
                "token_endpoint": format!("{base}/connect/token"),
                "jwks_uri": format!("{base}{DISCOVERY_PATH}/jwks"),
            })))
            .mount(&self.server)
            .await;

        let response = match behavior {
            IntrospectionBehavior::Active => ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"active": true, "scope": "api"})),
            IntrospectionBehavior::Inactive => {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"active": false}))
            }
            IntrospectionBehavior::Status(code) => ResponseTemplate::new(code),
            IntrospectionBehavior::Garbage => ResponseTemplate::new(200).set_body_string("not json"),
        };

        Mock::given(method("POST"))
            .and(path(INTROSPECTION_PATH))
            .and(basic_auth(CLIENT_ID, CLIENT_SECRET))
            .respond_with(response)
            .mount(&self.server)
            .await;

        // Wrong client credentials
        Mock::given(method("POST"))
            .and(path(INTROSPECTION_PATH))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(10)
            .mount(&self.server)
            .await;
    }

    /// Number of introspection requests received since start or the last
    /// `set_behavior`.
    pub async fn introspection_requests(&self) -> usize {
        self.count_requests(INTROSPECTION_PATH).await
    }

    /// Number of discovery requests received since start or the last
    /// `set_behavior`.
    pub async fn discovery_requests(&self) -> usize {
        self.count_requests(DISCOVERY_PATH).await
    }

    async fn count_requests(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }

    /// Host configuration pointing at this authority.
    pub fn config(&self) -> Config {
        Config {
            authority_url: self.uri(),
            introspection_client_id: CLIENT_ID.to_string(),
            introspection_client_secret: SecretString::from(CLIENT_SECRET),
            required_audience: "api".to_string(),
            expected_token_type: "at+jwt".to_string(),
            discovery_cache_ttl: Duration::from_secs(3600),
            http_timeout: Duration::from_secs(5),
            demo_bearer_token: None,
        }
    }

    /// Call filter wired to this authority over HTTP.
    pub fn filter(&self) -> AccessTokenFilter {
        grain_host::build_filter(&self.config())
    }
}
