//! Result envelope returned by protected methods.

use crate::errors::AuthError;
use serde::{Deserialize, Serialize};

/// Message carried by every successful envelope.
pub const AUTHORIZED_MESSAGE: &str = "Authorized";

/// Outcome of a protected call.
///
/// `success == true` iff the token was accepted and the method returned a
/// value, in which case `result` is `Some` and `message` is
/// [`AUTHORIZED_MESSAGE`]. Otherwise `result` is `None` and `message` is the
/// rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: Option<T>,
    pub success: bool,
    pub message: String,
}

impl<T> ResultEnvelope<T> {
    /// Envelope for an authorized call that returned `value`.
    pub fn authorized(value: T) -> Self {
        Self {
            result: Some(value),
            success: true,
            message: AUTHORIZED_MESSAGE.to_string(),
        }
    }

    /// Envelope for a call that was denied or failed.
    pub fn denied(reason: AuthError) -> Self {
        Self {
            result: None,
            success: false,
            message: reason.client_message(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Convert into a `Result`, with the envelope message as the error.
    ///
    /// # Errors
    ///
    /// Returns the message when the envelope is not a success.
    pub fn into_result(self) -> Result<T, String> {
        match self.result {
            Some(value) if self.success => Ok(value),
            _ => Err(self.message),
        }
    }
}
