//! In-process actor runtime.
//!
//! Each actor owns its state and runs a mailbox loop on its own task. Callers
//! hold an [`ActorHandle`] and send typed [`Message`]s; every call goes
//! through the reply type's [`Reply::intercept`] before the caller sees a
//! result, so protected methods are filtered without the handler knowing.
//!
//! # Request context
//!
//! [`ActorHandle::call`] snapshots the caller's current
//! [`RequestContext`] into the outgoing message. The actor runs the call
//! (filter and handler) inside that context, so nested calls made by the
//! handler carry it onward. Nothing the handler sets flows back to the caller.
//!
//! # Failure containment
//!
//! One call at a time per actor. A panic escaping a pass-through handler is
//! caught by the mailbox loop: the caller gets `HostError::ReplyDropped` and
//! the actor keeps serving later calls.

use crate::context::RequestContext;
use crate::errors::HostError;
use crate::filter::{AccessTokenFilter, CallInfo, Reply};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

const TARGET: &str = "grain.actors";

/// Default mailbox capacity per actor.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// An actor: state owned by one mailbox loop.
pub trait Actor: Send + 'static {
    /// Name used in logs and host errors.
    const NAME: &'static str;
}

/// A request an actor can handle.
pub trait Message: Send + 'static {
    /// Reply the caller receives. Decides whether the call is protected.
    type Reply: Reply;

    /// Method label for logs and metrics, e.g. `secure_adder.add`.
    const METHOD: &'static str;
}

/// Handling of message `M` by an actor.
#[async_trait]
pub trait Handler<M: Message>: Actor {
    async fn handle(&mut self, msg: M) -> <M::Reply as Reply>::Output;
}

/// Type-erased call waiting in an actor's mailbox.
#[async_trait]
trait Job<A: Actor>: Send {
    async fn run(self: Box<Self>, actor: &mut A, filter: &AccessTokenFilter);
}

struct CallJob<M: Message> {
    msg: M,
    context: RequestContext,
    respond_to: oneshot::Sender<M::Reply>,
}

#[async_trait]
impl<A, M> Job<A> for CallJob<M>
where
    A: Handler<M>,
    M: Message,
{
    async fn run(self: Box<Self>, actor: &mut A, filter: &AccessTokenFilter) {
        let CallJob {
            msg,
            context,
            respond_to,
        } = *self;

        let call = CallInfo {
            actor: A::NAME,
            method: M::METHOD,
            context: &context,
        };
        let handler = actor.handle(msg);
        let reply = RequestContext::scope(
            context.clone(),
            <M::Reply as Reply>::intercept(filter, call, handler),
        )
        .await;

        if respond_to.send(reply).is_err() {
            debug!(target: TARGET, actor = A::NAME, method = M::METHOD, "Caller went away before reply");
        }
    }
}

/// Handle to a running actor.
pub struct ActorHandle<A: Actor> {
    sender: mpsc::Sender<Box<dyn Job<A>>>,
    cancel_token: CancellationToken,
}

impl<A: Actor> Clone for ActorHandle<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }
}

impl<A: Actor> ActorHandle<A> {
    /// Spawn `actor` on its own task and return a handle to it.
    ///
    /// Every call is filtered through `filter`.
    #[must_use]
    pub fn spawn(actor: A, filter: AccessTokenFilter) -> Self {
        Self::spawn_with_capacity(actor, filter, DEFAULT_MAILBOX_CAPACITY)
    }

    #[must_use]
    pub fn spawn_with_capacity(actor: A, filter: AccessTokenFilter, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel_token = CancellationToken::new();

        tokio::spawn(run(actor, receiver, filter, cancel_token.clone()));

        Self {
            sender,
            cancel_token,
        }
    }

    /// Call the actor with the caller's current request context.
    ///
    /// # Errors
    ///
    /// - `HostError::MailboxClosed` if the actor has stopped
    /// - `HostError::ReplyDropped` if the actor stopped or panicked before replying
    pub async fn call<M>(&self, msg: M) -> Result<M::Reply, HostError>
    where
        A: Handler<M>,
        M: Message,
    {
        self.call_with_context(msg, RequestContext::current()).await
    }

    /// Call the actor with an explicit request context.
    ///
    /// # Errors
    ///
    /// See [`ActorHandle::call`].
    pub async fn call_with_context<M>(
        &self,
        msg: M,
        context: RequestContext,
    ) -> Result<M::Reply, HostError>
    where
        A: Handler<M>,
        M: Message,
    {
        let (tx, rx) = oneshot::channel();
        let job: Box<dyn Job<A>> = Box::new(CallJob {
            msg,
            context,
            respond_to: tx,
        });

        self.sender
            .send(job)
            .await
            .map_err(|_| HostError::MailboxClosed(A::NAME.to_string()))?;

        rx.await
            .map_err(|_| HostError::ReplyDropped(A::NAME.to_string()))
    }

    /// Stop the actor. Queued calls are dropped.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[instrument(skip_all, name = "grain.actor", fields(actor = A::NAME))]
async fn run<A: Actor>(
    mut actor: A,
    mut receiver: mpsc::Receiver<Box<dyn Job<A>>>,
    filter: AccessTokenFilter,
    cancel_token: CancellationToken,
) {
    info!(target: TARGET, actor = A::NAME, "Actor started");
    let mut calls_processed: u64 = 0;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!(target: TARGET, actor = A::NAME, "Actor received cancellation signal");
                break;
            }

            job = receiver.recv() => {
                let Some(job) = job else {
                    info!(target: TARGET, actor = A::NAME, "Actor channel closed, exiting");
                    break;
                };

                if AssertUnwindSafe(job.run(&mut actor, &filter))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    error!(target: TARGET, actor = A::NAME, "Actor call panicked, reply dropped");
                }
                calls_processed += 1;
            }
        }
    }

    info!(target: TARGET, actor = A::NAME, calls_processed, "Actor stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::introspection::{IntrospectionError, IntrospectionOutcome, TokenIntrospector};
    use crate::auth::{TokenValidator, ValidationCache};
    use crate::context::BEARER_KEY;
    use crate::errors::CallError;
    use crate::filter::ResultEnvelope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NeverIntrospected(AtomicUsize);

    #[async_trait]
    impl TokenIntrospector for NeverIntrospected {
        async fn introspect(&self, _raw: &str) -> Result<IntrospectionOutcome, IntrospectionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(IntrospectionError::Transport("unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct Counter {
        count: i64,
    }

    impl Actor for Counter {
        const NAME: &'static str = "counter";
    }

    struct Increment;
    impl Message for Increment {
        type Reply = i64;
        const METHOD: &'static str = "counter.increment";
    }

    struct Explode;
    impl Message for Explode {
        type Reply = i64;
        const METHOD: &'static str = "counter.explode";
    }

    struct CallerTag;
    impl Message for CallerTag {
        type Reply = Option<String>;
        const METHOD: &'static str = "counter.caller_tag";
    }

    struct Secret;
    impl Message for Secret {
        type Reply = ResultEnvelope<i64>;
        const METHOD: &'static str = "counter.secret";
    }

    #[async_trait]
    impl Handler<Increment> for Counter {
        async fn handle(&mut self, _msg: Increment) -> i64 {
            self.count += 1;
            self.count
        }
    }

    #[async_trait]
    impl Handler<Explode> for Counter {
        async fn handle(&mut self, _msg: Explode) -> i64 {
            panic!("counter exploded")
        }
    }

    #[async_trait]
    impl Handler<CallerTag> for Counter {
        async fn handle(&mut self, _msg: CallerTag) -> Option<String> {
            RequestContext::current().get("tag").map(str::to_string)
        }
    }

    #[async_trait]
    impl Handler<Secret> for Counter {
        async fn handle(&mut self, _msg: Secret) -> Result<i64, CallError> {
            Ok(self.count)
        }
    }

    fn spawn_counter() -> (ActorHandle<Counter>, Arc<NeverIntrospected>) {
        let introspector = Arc::new(NeverIntrospected(AtomicUsize::new(0)));
        let validator = TokenValidator::new(introspector.clone(), ValidationCache::new());
        let filter = AccessTokenFilter::new(Arc::new(validator));
        (ActorHandle::spawn(Counter::default(), filter), introspector)
    }

    #[tokio::test]
    async fn test_calls_are_processed_in_order() {
        let (handle, introspector) = spawn_counter();

        for expected in 1..=3 {
            assert_eq!(handle.call(Increment).await.unwrap(), expected);
        }
        assert_eq!(introspector.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panic_drops_reply_and_actor_survives() {
        let (handle, _) = spawn_counter();

        let result = handle.call(Explode).await;
        assert!(matches!(result, Err(HostError::ReplyDropped(ref name)) if name == "counter"));

        assert_eq!(handle.call(Increment).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_protected_call_without_token_is_denied() {
        let (handle, introspector) = spawn_counter();

        let env = handle.call(Secret).await.unwrap();
        assert_eq!(env, ResultEnvelope::denied(crate::errors::AuthError::MissingToken));
        assert_eq!(introspector.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_is_snapshotted_from_caller() {
        let (handle, _) = spawn_counter();

        let mut ctx = RequestContext::new();
        ctx.set("tag", "caller-1");
        let tag = RequestContext::scope(ctx, handle.call(CallerTag)).await.unwrap();
        assert_eq!(tag.as_deref(), Some("caller-1"));

        // Outside any scope the callee sees an empty context
        assert_eq!(handle.call(CallerTag).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_explicit_context() {
        let (handle, _) = spawn_counter();

        let mut ctx = RequestContext::new();
        ctx.set("tag", "explicit");
        ctx.set(BEARER_KEY, "not-used-by-pass-through");
        let tag = handle.call_with_context(CallerTag, ctx).await.unwrap();
        assert_eq!(tag.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_cancelled_actor_rejects_calls() {
        let (handle, _) = spawn_counter();
        handle.cancel();
        assert!(handle.is_cancelled());

        // Give the loop a chance to observe cancellation and drop its receiver
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let result = handle.call(Increment).await;
        assert!(matches!(
            result,
            Err(HostError::MailboxClosed(_) | HostError::ReplyDropped(_))
        ));
    }
}
