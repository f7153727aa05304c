//! `SecureAdder` - sample actor with one protected and one open method.
//!
//! - `Add { a, b }` replies with `ResultEnvelope<i32>` and so requires a valid
//!   bearer token in the caller's request context
//! - `Ping` replies with a plain `String` and is never filtered

use crate::actors::runtime::{Actor, Handler, Message};
use crate::errors::CallError;
use crate::filter::ResultEnvelope;
use async_trait::async_trait;

/// Adds two numbers for authorized callers.
#[derive(Debug, Default)]
pub struct SecureAdder {
    additions: u64,
}

impl SecureAdder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for SecureAdder {
    const NAME: &'static str = "secure_adder";
}

/// Protected: add `a` and `b`.
#[derive(Debug, Clone, Copy)]
pub struct Add {
    pub a: i32,
    pub b: i32,
}

impl Message for Add {
    type Reply = ResultEnvelope<i32>;
    const METHOD: &'static str = "secure_adder.add";
}

/// Open: liveness check.
#[derive(Debug, Clone, Copy)]
pub struct Ping;

impl Message for Ping {
    type Reply = String;
    const METHOD: &'static str = "secure_adder.ping";
}

/// Open: number of additions completed so far.
#[derive(Debug, Clone, Copy)]
pub struct AdditionCount;

impl Message for AdditionCount {
    type Reply = u64;
    const METHOD: &'static str = "secure_adder.addition_count";
}

#[async_trait]
impl Handler<Add> for SecureAdder {
    async fn handle(&mut self, msg: Add) -> Result<i32, CallError> {
        let sum = msg
            .a
            .checked_add(msg.b)
            .ok_or_else(|| CallError::new(format!("overflow adding {} and {}", msg.a, msg.b)))?;
        self.additions += 1;
        Ok(sum)
    }
}

#[async_trait]
impl Handler<Ping> for SecureAdder {
    async fn handle(&mut self, _msg: Ping) -> String {
        "pong".to_string()
    }
}

#[async_trait]
impl Handler<AdditionCount> for SecureAdder {
    async fn handle(&mut self, _msg: AdditionCount) -> u64 {
        self.additions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add() {
        let mut adder = SecureAdder::new();
        assert_eq!(adder.handle(Add { a: 2, b: 3 }).await.unwrap(), 5);
        assert_eq!(adder.handle(Add { a: -7, b: 3 }).await.unwrap(), -4);
        assert_eq!(adder.handle(AdditionCount).await, 2);
    }

    #[tokio::test]
    async fn test_add_overflow_is_an_error() {
        let mut adder = SecureAdder::new();
        let err = adder.handle(Add { a: i32::MAX, b: 1 }).await.unwrap_err();
        assert!(err.to_string().contains("overflow"));
        assert_eq!(adder.handle(AdditionCount).await, 0);
    }

    #[tokio::test]
    async fn test_ping() {
        let mut adder = SecureAdder::new();
        assert_eq!(adder.handle(Ping).await, "pong");
    }
}
