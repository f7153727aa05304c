//! In-process introspector fakes.

use async_trait::async_trait;
use grain_host::auth::{
    IntrospectionError, IntrospectionOutcome, TokenIntrospector, TokenValidator, ValidationCache,
};
use grain_host::filter::AccessTokenFilter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted verdict returned by [`CountingIntrospector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Active,
    Inactive,
    TransportError,
    AuthorityError,
}

/// Introspector that returns a settable verdict and counts calls.
pub struct CountingIntrospector {
    verdict: Mutex<Verdict>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingIntrospector {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict: Mutex::new(verdict),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn active() -> Arc<Self> {
        Self::new(Verdict::Active)
    }

    pub fn inactive() -> Arc<Self> {
        Self::new(Verdict::Inactive)
    }

    pub fn set_verdict(&self, verdict: Verdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw tokens introspected so far, in order.
    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    /// Validator over this introspector with a fresh cache.
    pub fn validator(self: &Arc<Self>) -> Arc<TokenValidator> {
        Arc::new(TokenValidator::new(self.clone(), ValidationCache::new()))
    }

    /// Call filter over this introspector with a fresh cache.
    pub fn filter(self: &Arc<Self>) -> AccessTokenFilter {
        AccessTokenFilter::new(self.validator())
    }
}

#[async_trait]
impl TokenIntrospector for CountingIntrospector {
    async fn introspect(&self, raw: &str) -> Result<IntrospectionOutcome, IntrospectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(raw.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let verdict = *self.verdict.lock().unwrap();
        match verdict {
            Verdict::Active => Ok(IntrospectionOutcome::Active),
            Verdict::Inactive => Ok(IntrospectionOutcome::Inactive),
            Verdict::TransportError => {
                Err(IntrospectionError::Transport("connection refused".to_string()))
            }
            Verdict::AuthorityError => Err(IntrospectionError::Authority("status 500".to_string())),
        }
    }
}
