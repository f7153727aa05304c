//! Actor host.
//!
//! - `runtime` - actor/message/handler traits, handles and the mailbox loop
//! - `adder` - the `SecureAdder` sample actor

pub mod adder;
pub mod runtime;

pub use adder::{Add, AdditionCount, Ping, SecureAdder};
pub use runtime::{Actor, ActorHandle, Handler, Message, DEFAULT_MAILBOX_CAPACITY};
