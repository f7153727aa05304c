//! Observability for the grain host.

pub mod metrics;
