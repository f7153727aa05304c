//! Secret types for credentials that must never reach a log line.
//!
//! Re-exports the [`secrecy`] types used across Bastion. The introspection
//! client secret and any bearer token held outside a request context are kept
//! as [`SecretString`], whose `Debug` output is redacted and whose memory is
//! zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct IntrospectionCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = IntrospectionCredentials {
//!     client_id: "api".to_string(),
//!     client_secret: SecretString::from("secret"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("\"secret\""));
//! assert_eq!(creds.client_secret.expose_secret(), "secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
