//! Per-call request context.
//!
//! A [`RequestContext`] is a small key/value carrier that travels with exactly
//! one logical call. Callers set values (most importantly the bearer token
//! under [`BEARER_KEY`]) by running the call inside [`RequestContext::scope`].
//! When an [`ActorHandle`](crate::actors::ActorHandle) sends a message it takes
//! a snapshot of the caller's current context and attaches it to the message,
//! so the callee sees the context its caller had, and nothing flows back.
//!
//! Context values are redacted in Debug output.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Context key carrying the raw bearer token.
pub const BEARER_KEY: &str = "Bearer";

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Key/value carrier for one call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    values: HashMap<String, String>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("RequestContext")
            .field("keys", &keys)
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl RequestContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context carrying only a bearer token.
    #[must_use]
    pub fn with_bearer(token: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.set(BEARER_KEY, token);
        ctx
    }

    /// Set a value, replacing any previous value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Remove the value for `key`, returning it.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// The bearer token, if present and not blank.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.get(BEARER_KEY).filter(|t| !t.trim().is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Run `fut` with `ctx` as the current context.
    ///
    /// Scopes nest: the inner scope fully replaces the outer one for its
    /// duration and the outer context is visible again afterwards.
    pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(ctx, fut).await
    }

    /// Snapshot of the current context, or an empty context outside any scope.
    #[must_use]
    pub fn current() -> RequestContext {
        CURRENT.try_with(Clone::clone).unwrap_or_default()
    }
}
