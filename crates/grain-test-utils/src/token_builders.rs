//! Builder patterns for test access tokens.
//!
//! Tokens are real compact JWS strings (HS256 over a fixed test key), so they
//! look like what an authority issues. The host never verifies signatures
//! locally, so the key only has to be stable.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Fixed HMAC key used to sign test tokens.
pub const TEST_SIGNING_KEY: &[u8] = b"grain-test-utils-signing-key-0001";

/// Builder for test access tokens.
///
/// Defaults to a token the host accepts structurally: `sub = "test-subject"`,
/// `aud = "api"`, `typ = "at+jwt"`, expiring in one hour.
///
/// # Example
/// ```rust,ignore
/// let raw = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_audiences(&["api", "web"])
///     .expires_in(60)
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    audiences: Vec<String>,
    exp: Option<i64>,
    typ: Option<String>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        Self {
            sub: Some("test-subject".to_string()),
            audiences: vec!["api".to_string()],
            exp: Some((Utc::now() + Duration::seconds(3600)).timestamp()),
            typ: Some("at+jwt".to_string()),
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the `sub` claim
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set a single audience (serialized as a string)
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.audiences = vec![audience.to_string()];
        self
    }

    /// Set several audiences (serialized as an array)
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.audiences = audiences.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set an absolute expiration (Unix seconds)
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(timestamp);
        self
    }

    /// Omit the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set the `typ` header
    pub fn with_type(mut self, typ: &str) -> Self {
        self.typ = Some(typ.to_string());
        self
    }

    /// Omit the `typ` header
    pub fn without_type(mut self) -> Self {
        self.typ = None;
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        let mut claims = self.extra.clone();
        if let Some(sub) = &self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        match self.audiences.as_slice() {
            [] => {}
            [single] => {
                claims.insert("aud".to_string(), json!(single));
            }
            many => {
                claims.insert("aud".to_string(), json!(many));
            }
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        Value::Object(claims)
    }

    /// Build the signed compact token
    pub fn build(self) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = self.typ.clone();

        encode(
            &header,
            &self.claims(),
            &EncodingKey::from_secret(TEST_SIGNING_KEY),
        )
        .expect("test token encoding should not fail")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
