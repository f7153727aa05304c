//! Common utilities and types shared across Bastion components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for access token parsing (structure and claims, no signature checks)
pub mod jwt;
