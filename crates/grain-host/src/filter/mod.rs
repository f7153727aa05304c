//! Call filtering for protected actor methods.

pub mod envelope;
pub mod interceptor;

pub use envelope::{ResultEnvelope, AUTHORIZED_MESSAGE};
pub use interceptor::{AccessTokenFilter, CallInfo, Reply};
