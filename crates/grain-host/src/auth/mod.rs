//! Access token validation.
//!
//! - `cache` - subject to known-good raw token map
//! - `discovery` - authority discovery document provider
//! - `introspection` - RFC 7662 introspection client
//! - `validator` - ordered structural checks plus cache/introspection

pub mod cache;
pub mod discovery;
pub mod introspection;
pub mod validator;

pub use cache::ValidationCache;
pub use discovery::{DiscoveryDocument, DiscoveryError, DiscoveryProvider, HttpDiscoveryProvider};
pub use introspection::{
    HttpTokenIntrospector, IntrospectionCredentials, IntrospectionError, IntrospectionOutcome,
    TokenIntrospector,
};
pub use validator::TokenValidator;
