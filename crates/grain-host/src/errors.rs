//! Grain host error types.
//!
//! [`AuthError`] is the rejection taxonomy of the access-token filter. It is
//! only ever surfaced to callers as the `message` of a failure envelope, via
//! [`AuthError::client_message`]. Underlying causes are logged server-side.
//!
//! [`HostError`] covers failures of the in-process actor host itself (mailbox
//! closed, reply dropped). Those are returned by actor handles as `Result` and
//! never enter an envelope.

use thiserror::Error;

/// Access-token rejection reasons.
///
/// `Display` yields the exact client-facing reason string.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token in the request context, or a blank one.
    #[error("bearer token missing")]
    MissingToken,

    /// Token could not be parsed into header and claims.
    #[error("malformed token")]
    MalformedToken,

    /// `exp` is at or before the current time.
    #[error("token expired")]
    TokenExpired,

    /// Required audience not among the token's audiences.
    #[error("api scope required")]
    InsufficientScope,

    /// `typ` header missing or not the expected access token type.
    #[error("wrong token type")]
    WrongTokenType,

    /// Discovery or introspection against the authority failed.
    #[error("authority discovery/introspection failed")]
    AuthorityUnavailable,

    /// Authority reports the token as not active.
    #[error("token deactivated by authority")]
    TokenInactive,

    /// The validator or the protected method failed unexpectedly.
    #[error("internal error")]
    InternalError,
}

impl AuthError {
    /// Client-safe message placed in the failure envelope.
    #[must_use]
    pub fn client_message(&self) -> String {
        self.to_string()
    }

    /// Bounded label for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InsufficientScope => "insufficient_scope",
            AuthError::WrongTokenType => "wrong_token_type",
            AuthError::AuthorityUnavailable => "authority_unavailable",
            AuthError::TokenInactive => "token_inactive",
            AuthError::InternalError => "internal_error",
        }
    }
}

/// Failure reported by a protected method's own logic.
///
/// The text is for server-side logs only; callers of a protected method see
/// the generic internal-error envelope instead.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CallError(pub String);

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by the actor host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The actor's mailbox is closed (actor stopped).
    #[error("Actor mailbox closed: {0}")]
    MailboxClosed(String),

    /// The actor dropped the reply channel without answering.
    #[error("Actor dropped reply: {0}")]
    ReplyDropped(String),
}
