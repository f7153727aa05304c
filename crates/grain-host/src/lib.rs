//! Bastion Grain Host Library
//!
//! In-process actor host whose calls pass through an access-token filter:
//!
//! - Methods replying with `ResultEnvelope<T>` require a bearer token in the
//!   caller's request context
//! - Tokens are checked structurally (expiry, audience, type), then confirmed
//!   with the authority through RFC 7662 introspection
//! - Confirmed tokens are cached per subject, so an unchanged token costs one
//!   introspection
//! - All other methods pass through untouched
//!
//! # Architecture
//!
//! ```text
//! ActorHandle::call -> Reply::intercept -> AccessTokenFilter -> TokenValidator
//!                                                                ├── ValidationCache (fast path)
//!                                                                └── TokenIntrospector (slow path)
//!                                                                      └── DiscoveryProvider
//! ```
//!
//! # Modules
//!
//! - `actors` - actor runtime and the `SecureAdder` sample actor
//! - `auth` - validator, cache, discovery and introspection
//! - `config` - configuration from environment
//! - `context` - per-call request context
//! - `errors` - rejection reasons and host errors
//! - `filter` - result envelope and call filter
//! - `observability` - metrics

pub mod actors;
pub mod auth;
pub mod config;
pub mod context;
pub mod errors;
pub mod filter;
pub mod observability;

use auth::{
    HttpDiscoveryProvider, HttpTokenIntrospector, IntrospectionCredentials, TokenValidator,
    ValidationCache,
};
use config::Config;
use filter::AccessTokenFilter;
use std::sync::Arc;

/// Build the call filter described by `config`: HTTP discovery and
/// introspection against the configured authority, with a fresh cache.
#[must_use]
pub fn build_filter(config: &Config) -> AccessTokenFilter {
    if config.authority_url.starts_with("http://") {
        tracing::warn!(
            target: "grain.auth",
            authority = %config.authority_url,
            "Authority URL is not HTTPS; tokens and client credentials travel in clear text"
        );
    }

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "grain.auth", error = %e, "Failed to build HTTP client with custom config, using defaults");
            reqwest::Client::new()
        });

    let discovery = HttpDiscoveryProvider::with_ttl(
        &config.authority_url,
        http_client.clone(),
        config.discovery_cache_ttl,
    );
    let introspector = HttpTokenIntrospector::new(
        Arc::new(discovery),
        IntrospectionCredentials {
            client_id: config.introspection_client_id.clone(),
            client_secret: config.introspection_client_secret.clone(),
        },
        http_client,
    );
    let validator = TokenValidator::new(Arc::new(introspector), ValidationCache::new())
        .with_required_audience(config.required_audience.clone())
        .with_expected_token_type(config.expected_token_type.clone());

    AccessTokenFilter::new(Arc::new(validator))
}
