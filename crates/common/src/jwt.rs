//! Access token model shared across Bastion components.
//!
//! Parses a compact JWS access token into the structural fields the call
//! filter checks:
//! - `sub` (subject, used as the validation cache key)
//! - `aud` (audience set, a single string or an array)
//! - `exp` (expiry, Unix epoch seconds; fractional NumericDates are floored)
//! - `typ` header (token type, e.g. `at+jwt`)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The signature is NOT verified here. Issuer trust is established by the
//!   authority through introspection, which happens after these checks pass.
//! - Error messages are generic; details go to debug logs
//! - `sub` and the raw token are redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::AccessToken;
//!
//! let token = AccessToken::parse(raw)?;
//! if token.is_expired_at(now) {
//!     // reject
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed access token size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 or JSON work.
/// Typical access tokens from an OIDC authority are 600-1200 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing an access token.
///
/// Note: every variant means "this is not a usable token". Callers map all of
/// them to the same client-facing rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is malformed")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is malformed")]
    MalformedToken,

    /// Token payload has no string `sub` claim.
    #[error("The access token is malformed")]
    MissingSubject,
}

// =============================================================================
// Wire Types
// =============================================================================

/// JOSE header fields read by the filter.
#[derive(Deserialize)]
struct TokenHeader {
    #[serde(default)]
    typ: Option<String>,
}

/// The `aud` claim is either one string or an array of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum AudienceClaim {
    One(String),
    Many(Vec<String>),
}

/// Payload claims read by the filter. Everything else is ignored.
#[derive(Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<AudienceClaim>,
    #[serde(default)]
    exp: Option<f64>,
}

/// Floor a NumericDate to whole seconds. Out-of-range values saturate.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date_seconds(exp: f64) -> i64 {
    exp.floor() as i64
}

// =============================================================================
// Access Token
// =============================================================================

/// A parsed (but not signature-verified) access token.
///
/// Built fresh from the raw bearer string on every call; never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    subject: String,
    audiences: BTreeSet<String>,
    expiry: Option<i64>,
    type_header: Option<String>,
    raw: String,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("subject", &"[REDACTED]")
            .field("audiences", &self.audiences)
            .field("expiry", &self.expiry)
            .field("type_header", &self.type_header)
            .field("raw", &"[REDACTED]")
            .finish()
    }
}

impl AccessToken {
    /// Parse a compact `header.payload.signature` token.
    ///
    /// # Errors
    ///
    /// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
    /// - `MalformedToken` - Wrong segment count, bad base64url, or header/payload
    ///   not a JSON object of the expected shape
    /// - `MissingSubject` - Payload has no non-empty string `sub`
    pub fn parse(raw: &str) -> Result<Self, JwtValidationError> {
        // Check token size first (DoS prevention)
        if raw.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "common.jwt",
                token_size = raw.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(JwtValidationError::TokenTooLarge);
        }

        let parts: Vec<&str> = raw.split('.').collect();
        let [header_part, payload_part, _signature] = parts.as_slice() else {
            tracing::debug!(
                target: "common.jwt",
                parts = parts.len(),
                "Token rejected: invalid JWT format"
            );
            return Err(JwtValidationError::MalformedToken);
        };

        let header: TokenHeader = decode_segment(header_part, "header")?;
        let claims: TokenClaims = decode_segment(payload_part, "payload")?;

        let subject = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(JwtValidationError::MissingSubject)?;

        let audiences = match claims.aud {
            Some(AudienceClaim::One(aud)) => BTreeSet::from([aud]),
            Some(AudienceClaim::Many(auds)) => auds.into_iter().collect(),
            None => BTreeSet::new(),
        };

        Ok(Self {
            subject,
            audiences,
            expiry: claims.exp.map(numeric_date_seconds),
            type_header: header.typ,
            raw: raw.to_string(),
        })
    }

    /// Subject claim. Cache key for validated tokens.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Audience set.
    #[must_use]
    pub fn audiences(&self) -> &BTreeSet<String> {
        &self.audiences
    }

    /// Expiry as Unix epoch seconds, if the token carries one.
    #[must_use]
    pub fn expiry(&self) -> Option<i64> {
        self.expiry
    }

    /// The `typ` JOSE header.
    #[must_use]
    pub fn type_header(&self) -> Option<&str> {
        self.type_header.as_deref()
    }

    /// The encoded token exactly as presented.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the token is expired at `now` (Unix epoch seconds).
    ///
    /// A token without `exp` never had a valid window and counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry.map_or(true, |exp| exp <= now)
    }

    /// Whether `audience` is one of the token's audiences (exact match).
    #[must_use]
    pub fn has_audience(&self, audience: &str) -> bool {
        self.audiences.contains(audience)
    }

    /// Whether the `typ` header is present and equals `expected` (exact match).
    #[must_use]
    pub fn has_type(&self, expected: &str) -> bool {
        self.type_header.as_deref() == Some(expected)
    }
}

/// Decode one base64url JSON segment into `T`.
fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    segment_name: &'static str,
) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = segment_name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = segment_name, error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })
}

// =============================================================================
// Tests
// =============================================================================
