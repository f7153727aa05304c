//! Access token validator.
//!
//! Single entry point for deciding whether a bearer token may invoke a
//! protected method. Checks run in order and the first failure wins:
//!
//! 1. Parse (structure, size, `sub`) → `MalformedToken`
//! 2. `exp <= now` → `TokenExpired`
//! 3. Required audience absent → `InsufficientScope`
//! 4. `typ` header not the expected type → `WrongTokenType`
//!
//! Failures of 2-4 invalidate the subject's cache entry before returning.
//!
//! A token that passes all four is accepted without a network call when the
//! cache already holds exactly this raw token for its subject. Otherwise the
//! authority is asked through introspection, and only an `Active` verdict is
//! cached.

use crate::auth::cache::ValidationCache;
use crate::auth::introspection::{IntrospectionOutcome, TokenIntrospector};
use crate::config::{DEFAULT_EXPECTED_TOKEN_TYPE, DEFAULT_REQUIRED_AUDIENCE};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::AccessToken;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

const TARGET: &str = "grain.auth.validator";

/// Source of the current Unix time in seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// Validates bearer tokens for protected calls.
///
/// Shared by every actor through an `Arc`. Holds no lock across the
/// introspection await.
pub struct TokenValidator {
    cache: ValidationCache,
    introspector: Arc<dyn TokenIntrospector>,
    required_audience: String,
    expected_token_type: String,
    clock: Clock,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("required_audience", &self.required_audience)
            .field("expected_token_type", &self.expected_token_type)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator requiring audience `api` and type `at+jwt`.
    pub fn new(introspector: Arc<dyn TokenIntrospector>, cache: ValidationCache) -> Self {
        Self {
            cache,
            introspector,
            required_audience: DEFAULT_REQUIRED_AUDIENCE.to_string(),
            expected_token_type: DEFAULT_EXPECTED_TOKEN_TYPE.to_string(),
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_required_audience(mut self, audience: impl Into<String>) -> Self {
        self.required_audience = audience.into();
        self
    }

    #[must_use]
    pub fn with_expected_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.expected_token_type = token_type.into();
        self
    }

    /// Replace the time source used for the expiry check.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    /// Validate `raw` against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an [`AuthError`].
    pub async fn validate(&self, raw: &str) -> Result<AccessToken, AuthError> {
        let now = (self.clock)();
        self.validate_at(raw, now).await
    }

    /// Validate `raw` as of Unix time `now` (seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an [`AuthError`].
    #[instrument(skip_all, fields(outcome))]
    pub async fn validate_at(&self, raw: &str, now: i64) -> Result<AccessToken, AuthError> {
        let result = self.run_checks(raw, now).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.as_label(),
        };
        tracing::Span::current().record("outcome", outcome);
        metrics::record_token_validation(outcome);

        result
    }

    async fn run_checks(&self, raw: &str, now: i64) -> Result<AccessToken, AuthError> {
        let token = AccessToken::parse(raw).map_err(|e| {
            tracing::debug!(target: TARGET, error = ?e, "Token failed to parse");
            AuthError::MalformedToken
        })?;

        if let Err(reason) = self.check_claims(&token, now) {
            if self.cache.invalidate(token.subject()).await {
                metrics::record_cache_event("invalidated");
            }
            tracing::debug!(target: TARGET, reason = reason.as_label(), "Token rejected by local checks");
            return Err(reason);
        }

        match self.cache.get(token.subject()).await {
            Some(cached) if cached == token.raw() => {
                metrics::record_cache_event("hit");
                tracing::debug!(target: TARGET, "Token accepted from cache");
                return Ok(token);
            }
            Some(_) => {
                // Rotated token: the old entry must not survive a failed
                // introspection of the new one.
                self.cache.invalidate(token.subject()).await;
                metrics::record_cache_event("stale");
            }
            None => metrics::record_cache_event("miss"),
        }

        match self.introspector.introspect(token.raw()).await {
            Ok(IntrospectionOutcome::Active) => {
                self.cache.put(token.subject(), token.raw()).await;
                tracing::debug!(target: TARGET, "Token accepted by authority");
                Ok(token)
            }
            Ok(IntrospectionOutcome::Inactive) => {
                tracing::debug!(target: TARGET, "Token reported inactive by authority");
                Err(AuthError::TokenInactive)
            }
            Err(e) => {
                tracing::warn!(target: TARGET, error = %e, "Token introspection failed");
                Err(AuthError::AuthorityUnavailable)
            }
        }
    }

    fn check_claims(&self, token: &AccessToken, now: i64) -> Result<(), AuthError> {
        if token.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        if !token.has_audience(&self.required_audience) {
            return Err(AuthError::InsufficientScope);
        }
        if !token.has_type(&self.expected_token_type) {
            return Err(AuthError::WrongTokenType);
        }
        Ok(())
    }
}
