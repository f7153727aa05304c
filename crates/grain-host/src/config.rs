//! Grain host configuration.
//!
//! Configuration is loaded from environment variables. The introspection
//! client secret and the demo bearer token are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default client id used for HTTP basic auth against the introspection endpoint.
pub const DEFAULT_INTROSPECTION_CLIENT_ID: &str = "api";

/// Audience every protected call's token must carry.
pub const DEFAULT_REQUIRED_AUDIENCE: &str = "api";

/// Expected `typ` header of access tokens.
pub const DEFAULT_EXPECTED_TOKEN_TYPE: &str = "at+jwt";

/// Default discovery document cache TTL in seconds (1 hour).
pub const DEFAULT_DISCOVERY_CACHE_TTL_SECONDS: u64 = 3600;

/// Default HTTP timeout for discovery and introspection requests.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the discovery cache TTL (7 days).
pub const MAX_DISCOVERY_CACHE_TTL_SECONDS: u64 = 7 * 24 * 3600;

/// Upper bound for the authority HTTP timeout (5 minutes).
pub const MAX_HTTP_TIMEOUT_SECONDS: u64 = 300;

/// Grain host configuration.
#[derive(Clone)]
pub struct Config {
    /// Issuer base URL. The discovery document is read from
    /// `{authority_url}/.well-known/openid-configuration`.
    pub authority_url: String,

    /// Client id for introspection (HTTP basic user).
    pub introspection_client_id: String,

    /// Client secret for introspection (HTTP basic password).
    pub introspection_client_secret: SecretString,

    /// Audience required on every token (default: "api").
    pub required_audience: String,

    /// Required `typ` header (default: "at+jwt").
    pub expected_token_type: String,

    /// How long a fetched discovery document is reused.
    pub discovery_cache_ttl: Duration,

    /// Timeout applied to each authority HTTP request.
    pub http_timeout: Duration,

    /// Bearer token used by the binary's demo call, if any.
    pub demo_bearer_token: Option<SecretString>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("authority_url", &self.authority_url)
            .field("introspection_client_id", &self.introspection_client_id)
            .field("introspection_client_secret", &"[REDACTED]")
            .field("required_audience", &self.required_audience)
            .field("expected_token_type", &self.expected_token_type)
            .field("discovery_cache_ttl", &self.discovery_cache_ttl)
            .field("http_timeout", &self.http_timeout)
            .field(
                "demo_bearer_token",
                &self.demo_bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - `MissingEnvVar` if `GRAIN_AUTHORITY_URL` or
    ///   `GRAIN_INTROSPECTION_CLIENT_SECRET` is absent
    /// - `InvalidValue` for a non-http(s) authority, or a duration that is not
    ///   a number of seconds or exceeds its maximum
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let authority_url = vars
            .get("GRAIN_AUTHORITY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("GRAIN_AUTHORITY_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        if !authority_url.starts_with("https://") && !authority_url.starts_with("http://") {
            return Err(ConfigError::InvalidValue(format!(
                "GRAIN_AUTHORITY_URL must be an http(s) URL, got '{authority_url}'"
            )));
        }

        let introspection_client_secret = SecretString::from(
            vars.get("GRAIN_INTROSPECTION_CLIENT_SECRET")
                .ok_or_else(|| {
                    ConfigError::MissingEnvVar("GRAIN_INTROSPECTION_CLIENT_SECRET".to_string())
                })?
                .clone(),
        );

        let introspection_client_id = vars
            .get("GRAIN_INTROSPECTION_CLIENT_ID")
            .cloned()
            .unwrap_or_else(|| DEFAULT_INTROSPECTION_CLIENT_ID.to_string());

        let required_audience = vars
            .get("GRAIN_REQUIRED_AUDIENCE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REQUIRED_AUDIENCE.to_string());

        let expected_token_type = vars
            .get("GRAIN_EXPECTED_TOKEN_TYPE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_EXPECTED_TOKEN_TYPE.to_string());

        let discovery_cache_ttl = Duration::from_secs(parse_seconds(
            vars,
            "GRAIN_DISCOVERY_CACHE_TTL_SECONDS",
            DEFAULT_DISCOVERY_CACHE_TTL_SECONDS,
            MAX_DISCOVERY_CACHE_TTL_SECONDS,
        )?);

        let http_timeout = Duration::from_secs(parse_seconds(
            vars,
            "GRAIN_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
            MAX_HTTP_TIMEOUT_SECONDS,
        )?);

        let demo_bearer_token = vars
            .get("GRAIN_DEMO_BEARER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::from(t.clone()));

        Ok(Config {
            authority_url,
            introspection_client_id,
            introspection_client_secret,
            required_audience,
            expected_token_type,
            discovery_cache_ttl,
            http_timeout,
            demo_bearer_token,
        })
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = vars.get(key) else {
        return Ok(default);
    };

    let seconds: u64 = value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{key} must be a number of seconds")))?;

    if seconds > max {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be at most {max} seconds, got {seconds}"
        )));
    }

    Ok(seconds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "GRAIN_AUTHORITY_URL".to_string(),
                "https://demo.identityserver.io/".to_string(),
            ),
            (
                "GRAIN_INTROSPECTION_CLIENT_SECRET".to_string(),
                "secret".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        // Trailing slash is trimmed so discovery URLs join cleanly
        assert_eq!(config.authority_url, "https://demo.identityserver.io");
        assert_eq!(config.introspection_client_secret.expose_secret(), "secret");
        assert_eq!(config.introspection_client_id, DEFAULT_INTROSPECTION_CLIENT_ID);
        assert_eq!(config.required_audience, "api");
        assert_eq!(config.expected_token_type, "at+jwt");
        assert_eq!(
            config.discovery_cache_ttl,
            Duration::from_secs(DEFAULT_DISCOVERY_CACHE_TTL_SECONDS)
        );
        assert_eq!(
            config.http_timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS)
        );
        assert!(config.demo_bearer_token.is_none());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert(
            "GRAIN_INTROSPECTION_CLIENT_ID".to_string(),
            "orders-api".to_string(),
        );
        vars.insert("GRAIN_REQUIRED_AUDIENCE".to_string(), "orders".to_string());
        vars.insert("GRAIN_EXPECTED_TOKEN_TYPE".to_string(), "jwt".to_string());
        vars.insert(
            "GRAIN_DISCOVERY_CACHE_TTL_SECONDS".to_string(),
            "60".to_string(),
        );
        vars.insert("GRAIN_HTTP_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert(
            "GRAIN_DEMO_BEARER_TOKEN".to_string(),
            "eyJ.demo.token".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.introspection_client_id, "orders-api");
        assert_eq!(config.required_audience, "orders");
        assert_eq!(config.expected_token_type, "jwt");
        assert_eq!(config.discovery_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(
            config.demo_bearer_token.unwrap().expose_secret(),
            "eyJ.demo.token"
        );
    }

    #[test]
    fn test_missing_authority_url() {
        let mut vars = base_vars();
        vars.remove("GRAIN_AUTHORITY_URL");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "GRAIN_AUTHORITY_URL")
        );
    }

    #[test]
    fn test_missing_client_secret() {
        let mut vars = base_vars();
        vars.remove("GRAIN_INTROSPECTION_CLIENT_SECRET");

        let result = Config::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::MissingEnvVar(ref v)) if v == "GRAIN_INTROSPECTION_CLIENT_SECRET"
        ));
    }

    #[test]
    fn test_non_http_authority_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "GRAIN_AUTHORITY_URL".to_string(),
            "ftp://authority".to_string(),
        );

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_non_numeric_duration_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "GRAIN_HTTP_TIMEOUT_SECONDS".to_string(),
            "ten".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(ref msg)) if msg.contains("GRAIN_HTTP_TIMEOUT_SECONDS"))
        );
    }

    #[test]
    fn test_oversized_durations_rejected() {
        for key in [
            "GRAIN_DISCOVERY_CACHE_TTL_SECONDS",
            "GRAIN_HTTP_TIMEOUT_SECONDS",
        ] {
            let mut vars = base_vars();
            vars.insert(key.to_string(), u64::MAX.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref msg)) if msg.contains(key)),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_durations_at_maximum_accepted() {
        let mut vars = base_vars();
        vars.insert(
            "GRAIN_DISCOVERY_CACHE_TTL_SECONDS".to_string(),
            MAX_DISCOVERY_CACHE_TTL_SECONDS.to_string(),
        );
        vars.insert(
            "GRAIN_HTTP_TIMEOUT_SECONDS".to_string(),
            MAX_HTTP_TIMEOUT_SECONDS.to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.discovery_cache_ttl,
            Duration::from_secs(MAX_DISCOVERY_CACHE_TTL_SECONDS)
        );
        assert_eq!(
            config.http_timeout,
            Duration::from_secs(MAX_HTTP_TIMEOUT_SECONDS)
        );
    }

    #[test]
    fn test_blank_demo_token_is_ignored() {
        let mut vars = base_vars();
        vars.insert("GRAIN_DEMO_BEARER_TOKEN".to_string(), "   ".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.demo_bearer_token.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_vars();
        vars.insert(
            "GRAIN_DEMO_BEARER_TOKEN".to_string(),
            "eyJ.super-secret.token".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("\"secret\""));
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("demo.identityserver.io"));
    }
}
