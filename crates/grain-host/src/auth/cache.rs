//! Validation cache.
//!
//! Maps a token subject to the raw token most recently confirmed active by the
//! authority. Presence of `subject -> raw` means that exact raw token passed
//! the structural checks and a remote introspection, and has not been
//! invalidated since.
//!
//! There is no TTL or size eviction. Entries persist until invalidated by a
//! structural rejection or replaced by a newer active token for the same
//! subject.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const TARGET: &str = "grain.auth.cache";

/// Concurrent `subject -> raw token` map.
///
/// Cloning is cheap and clones share the same underlying map. Every operation
/// takes the lock for the duration of a single map access only.
#[derive(Clone, Default)]
pub struct ValidationCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl ValidationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known-good raw token for `subject`.
    pub async fn get(&self, subject: &str) -> Option<String> {
        self.entries.read().await.get(subject).cloned()
    }

    /// Record `raw` as the known-good token for `subject`. Last writer wins.
    pub async fn put(&self, subject: &str, raw: &str) {
        self.entries
            .write()
            .await
            .insert(subject.to_string(), raw.to_string());
        tracing::debug!(target: TARGET, "Token cached for subject");
    }

    /// Remove any entry for `subject`. Returns whether one was present.
    pub async fn invalidate(&self, subject: &str) -> bool {
        let removed = self.entries.write().await.remove(subject).is_some();
        if removed {
            tracing::debug!(target: TARGET, "Cache entry invalidated");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ValidationCache::new();
        assert!(cache.get("alice").await.is_none());

        cache.put("alice", "raw-1").await;
        assert_eq!(cache.get("alice").await.as_deref(), Some("raw-1"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = ValidationCache::new();
        cache.put("alice", "raw-1").await;
        cache.put("alice", "raw-2").await;
        assert_eq!(cache.get("alice").await.as_deref(), Some("raw-2"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = ValidationCache::new();
        cache.put("alice", "raw-1").await;
        cache.put("bob", "raw-b").await;

        assert!(cache.invalidate("alice").await);
        assert!(!cache.invalidate("alice").await);
        assert!(cache.get("alice").await.is_none());
        assert_eq!(cache.get("bob").await.as_deref(), Some("raw-b"));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = ValidationCache::new();
        let other = cache.clone();
        other.put("alice", "raw-1").await;
        assert_eq!(cache.get("alice").await.as_deref(), Some("raw-1"));
        assert!(!cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_a_whole_value() {
        let cache = ValidationCache::new();
        let mut tasks = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.put("alice", &format!("raw-{i}")).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let value = cache.get("alice").await.unwrap();
        assert!(value.starts_with("raw-"));
        assert_eq!(cache.len().await, 1);
    }
}
