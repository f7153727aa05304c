//! # Grain Test Utilities
//!
//! Shared test utilities for the grain host.
//!
//! This crate provides:
//! - Test access token builder (TestTokenBuilder)
//! - Mock OIDC authority (MockAuthority: discovery + introspection over HTTP)
//! - In-process introspector fake (CountingIntrospector)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grain_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let authority = MockAuthority::start().await;
//!     let adder = ActorHandle::spawn(SecureAdder::new(), authority.filter());
//!
//!     let raw = TestTokenBuilder::new().for_user("alice").build();
//!     let env = RequestContext::scope(
//!         RequestContext::with_bearer(raw),
//!         adder.call(Add { a: 2, b: 3 }),
//!     )
//!     .await?;
//!     assert_eq!(authority.introspection_requests().await, 1);
//! }
//! ```

pub mod introspectors;
pub mod mock_authority;
pub mod token_builders;

// Re-export commonly used items
pub use introspectors::*;
pub use mock_authority::*;
pub use token_builders::*;
