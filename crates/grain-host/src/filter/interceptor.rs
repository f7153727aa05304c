//! Access-token call filter.
//!
//! Every actor call runs through [`Reply::intercept`] for its reply type.
//! Whether a method is protected is fixed when its message type is defined:
//!
//! - Reply `ResultEnvelope<T>`: the handler produces `Result<T, CallError>`
//!   and the call is guarded by [`AccessTokenFilter`]. The caller always gets
//!   an envelope back, whatever happens inside.
//! - Any other reply: the handler's value is returned unchanged, with no token
//!   lookup and no validation.
//!
//! # Security
//!
//! - Missing or rejected tokens never reach the handler
//! - Handler errors and panics become the generic internal-error envelope;
//!   their details are logged at debug level only
//! - The raw token is never logged

use crate::auth::TokenValidator;
use crate::context::RequestContext;
use crate::errors::{AuthError, CallError};
use crate::filter::envelope::ResultEnvelope;
use crate::observability::metrics;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::instrument;

const TARGET: &str = "grain.filter";

/// Identity of the call being filtered.
#[derive(Debug, Clone, Copy)]
pub struct CallInfo<'a> {
    pub actor: &'static str,
    pub method: &'static str,
    pub context: &'a RequestContext,
}

/// Reply type of an actor message, deciding how its calls are filtered.
///
/// Implemented by [`ResultEnvelope`] (protected) and, as pass-through, by the
/// common std types. Other pass-through reply types opt in with
/// [`pass_through_reply!`](crate::pass_through_reply).
pub trait Reply: Sized + Send + 'static {
    /// What the message handler produces.
    type Output: Send + 'static;

    /// Turn the handler future into the caller's reply.
    fn intercept<'a>(
        filter: &'a AccessTokenFilter,
        call: CallInfo<'a>,
        handler: BoxFuture<'a, Self::Output>,
    ) -> BoxFuture<'a, Self>;
}

impl<T: Send + 'static> Reply for ResultEnvelope<T> {
    type Output = Result<T, CallError>;

    fn intercept<'a>(
        filter: &'a AccessTokenFilter,
        call: CallInfo<'a>,
        handler: BoxFuture<'a, Self::Output>,
    ) -> BoxFuture<'a, Self> {
        filter.guard(call, handler).boxed()
    }
}

/// Implement [`Reply`] as pass-through for the given types.
///
/// ```rust,ignore
/// struct Status { healthy: bool }
/// grain_host::pass_through_reply!(Status);
/// ```
#[macro_export]
macro_rules! pass_through_reply {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::filter::Reply for $ty {
                type Output = Self;

                fn intercept<'a>(
                    _filter: &'a $crate::filter::AccessTokenFilter,
                    _call: $crate::filter::CallInfo<'a>,
                    handler: ::std::pin::Pin<
                        ::std::boxed::Box<
                            dyn ::std::future::Future<Output = Self> + ::std::marker::Send + 'a,
                        >,
                    >,
                ) -> ::std::pin::Pin<
                    ::std::boxed::Box<
                        dyn ::std::future::Future<Output = Self> + ::std::marker::Send + 'a,
                    >,
                > {
                    handler
                }
            }
        )*
    };
}

pass_through_reply!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String
);

impl<T: Send + 'static> Reply for Option<T> {
    type Output = Self;

    fn intercept<'a>(
        _filter: &'a AccessTokenFilter,
        _call: CallInfo<'a>,
        handler: BoxFuture<'a, Self>,
    ) -> BoxFuture<'a, Self> {
        handler
    }
}

impl<T: Send + 'static> Reply for Vec<T> {
    type Output = Self;

    fn intercept<'a>(
        _filter: &'a AccessTokenFilter,
        _call: CallInfo<'a>,
        handler: BoxFuture<'a, Self>,
    ) -> BoxFuture<'a, Self> {
        handler
    }
}

impl<T: Send + 'static, E: Send + 'static> Reply for Result<T, E> {
    type Output = Self;

    fn intercept<'a>(
        _filter: &'a AccessTokenFilter,
        _call: CallInfo<'a>,
        handler: BoxFuture<'a, Self>,
    ) -> BoxFuture<'a, Self> {
        handler
    }
}

/// Guards protected calls with bearer token validation.
#[derive(Debug, Clone)]
pub struct AccessTokenFilter {
    validator: Arc<TokenValidator>,
}

impl AccessTokenFilter {
    #[must_use]
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }

    #[must_use]
    pub fn validator(&self) -> &Arc<TokenValidator> {
        &self.validator
    }

    /// Run a protected call: validate the bearer token from the call's
    /// context, then invoke `handler` only if it was accepted.
    ///
    /// Always returns an envelope.
    #[instrument(
        name = "grain.filter.guard",
        skip_all,
        fields(actor = call.actor, method = call.method, outcome)
    )]
    pub async fn guard<T: Send>(
        &self,
        call: CallInfo<'_>,
        handler: BoxFuture<'_, Result<T, CallError>>,
    ) -> ResultEnvelope<T> {
        let outcome = match self.authorize(call.context).await {
            Ok(()) => invoke(handler).await,
            Err(reason) => Err(reason),
        };

        let label = match &outcome {
            Ok(_) => "authorized",
            Err(reason) => reason.as_label(),
        };
        tracing::Span::current().record("outcome", label);
        metrics::record_filtered_call(call.method, label);

        match outcome {
            Ok(value) => ResultEnvelope::authorized(value),
            Err(reason) => ResultEnvelope::denied(reason),
        }
    }

    async fn authorize(&self, context: &RequestContext) -> Result<(), AuthError> {
        let Some(token) = context.bearer_token() else {
            tracing::debug!(target: TARGET, "Bearer token missing from request context");
            return Err(AuthError::MissingToken);
        };

        match AssertUnwindSafe(self.validator.validate(token))
            .catch_unwind()
            .await
        {
            Ok(Ok(_token)) => Ok(()),
            Ok(Err(reason)) => {
                tracing::debug!(target: TARGET, reason = reason.as_label(), "Call denied");
                Err(reason)
            }
            Err(payload) => {
                tracing::error!(target: TARGET, "Token validation panicked");
                tracing::debug!(target: TARGET, panic = %panic_message(payload.as_ref()), "Validation panic detail");
                Err(AuthError::InternalError)
            }
        }
    }
}

async fn invoke<T>(handler: BoxFuture<'_, Result<T, CallError>>) -> Result<T, AuthError> {
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::debug!(target: TARGET, error = %e, "Protected method returned an error");
            Err(AuthError::InternalError)
        }
        Err(payload) => {
            tracing::warn!(target: TARGET, "Protected method panicked");
            tracing::debug!(target: TARGET, panic = %panic_message(payload.as_ref()), "Method panic detail");
            Err(AuthError::InternalError)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
