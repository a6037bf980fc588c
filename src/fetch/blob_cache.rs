//! Store of resolved blob URIs.
//!
//! - `ResolvedUriStore` - What the scheduler needs: membership, insert, reset
//! - `BlobCache` - LRU of blob bytes with a memory budget, shared by clones
//!
//! The cache lives as long as the panel: it is reset when the panel
//! unmounts, not when the application exits.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::task::ResolvedBlob;

/// Minimum memory budget in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory budget in megabytes.
const MAX_MEMORY_MB: usize = 1024;

/// Memoization of which blob URIs are already available.
pub trait ResolvedUriStore {
    fn has_id(&self, uri: &str) -> bool;
    fn mark_resolved(&self, blob: ResolvedBlob);
    fn reset(&self);
}

/// Shared LRU cache of blob bytes keyed by URI.
///
/// Clones share the same entries, so the panel, the scheduler and the
/// renderer can all hold one.
#[derive(Clone)]
pub struct BlobCache {
    /// Maximum memory usage in bytes.
    max_memory_bytes: usize,
    /// Entries and their byte total, guarded together.
    inner: Arc<RwLock<CacheInner>>,
}

struct CacheInner {
    entries: LruCache<String, Arc<[u8]>>,
    /// Current memory usage in bytes.
    current_memory_bytes: usize,
}

impl CacheInner {
    /// Evict entries until `needed_bytes` fits in `max_memory_bytes`.
    fn evict_if_needed(&mut self, needed_bytes: usize, max_memory_bytes: usize) {
        while self.current_memory_bytes + needed_bytes > max_memory_bytes {
            let Some((uri, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.current_memory_bytes = self
                .current_memory_bytes
                .saturating_sub(entry_size(&uri, &evicted));
            trace!(
                uri = %uri,
                current_bytes = self.current_memory_bytes,
                "Evicted blob from cache"
            );
        }
    }
}

impl BlobCache {
    /// Create a cache with a budget in megabytes, clamped to a sane range.
    pub fn new(max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        debug!(max_memory_mb, "Initialized blob cache");
        Self::with_max_bytes(max_memory_mb * 1024 * 1024)
    }

    /// Create a cache with an exact byte budget.
    pub fn with_max_bytes(max_memory_bytes: usize) -> Self {
        Self {
            max_memory_bytes,
            inner: Arc::new(RwLock::new(CacheInner {
                entries: LruCache::unbounded(),
                current_memory_bytes: 0,
            })),
        }
    }

    /// Get the bytes for `uri`, marking it recently used.
    pub fn get(&self, uri: &str) -> Option<Arc<[u8]>> {
        self.inner.write().entries.get(uri).cloned()
    }

    /// Insert a blob, evicting least recently used entries to stay in budget.
    pub fn insert(&self, uri: String, data: Arc<[u8]>) {
        let new_size = entry_size(&uri, &data);
        let mut inner = self.inner.write();

        if let Some(old) = inner.entries.pop(&uri) {
            inner.current_memory_bytes = inner
                .current_memory_bytes
                .saturating_sub(entry_size(&uri, &old));
        }

        inner.evict_if_needed(new_size, self.max_memory_bytes);

        inner.entries.put(uri, data);
        inner.current_memory_bytes += new_size;
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.current_memory_bytes = 0;
        debug!("Cleared blob cache");
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.read().current_memory_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }
}

impl ResolvedUriStore for BlobCache {
    fn has_id(&self, uri: &str) -> bool {
        self.inner.read().entries.contains(uri)
    }

    fn mark_resolved(&self, blob: ResolvedBlob) {
        self.insert(blob.uri, blob.data);
    }

    fn reset(&self) {
        self.clear();
    }
}

fn entry_size(uri: &str, data: &[u8]) -> usize {
    uri.len() + data.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(uri: &str, len: usize) -> ResolvedBlob {
        ResolvedBlob::new(uri, vec![0u8; len])
    }

    #[test]
    fn test_memory_limit_clamping() {
        assert_eq!(BlobCache::new(1).max_memory(), MIN_MEMORY_MB * 1024 * 1024);
        assert_eq!(
            BlobCache::new(100_000).max_memory(),
            MAX_MEMORY_MB * 1024 * 1024
        );
        assert_eq!(BlobCache::new(64).max_memory(), 64 * 1024 * 1024);
    }

    #[test]
    fn test_mark_resolved_then_has_id() {
        let cache = BlobCache::new(16);
        assert!(!cache.has_id("run/img/0"));

        cache.mark_resolved(blob("run/img/0", 10));
        assert!(cache.has_id("run/img/0"));
        assert_eq!(cache.get("run/img/0").unwrap().len(), 10);
        assert_eq!(cache.memory_usage(), "run/img/0".len() + 10);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = BlobCache::new(16);
        let other = cache.clone();
        cache.mark_resolved(blob("a", 1));
        assert!(other.has_id("a"));

        other.reset();
        assert!(!cache.has_id("a"));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        // Each entry is 1 + 10 bytes.
        let cache = BlobCache::with_max_bytes(30);
        cache.mark_resolved(blob("a", 10));
        cache.mark_resolved(blob("b", 10));
        // Touch "a" so "b" is the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.mark_resolved(blob("c", 10));

        assert!(cache.has_id("a"));
        assert!(!cache.has_id("b"));
        assert!(cache.has_id("c"));
        assert_eq!(cache.memory_usage(), 22);
    }

    #[test]
    fn test_reinsert_replaces_size() {
        let cache = BlobCache::with_max_bytes(1000);
        cache.mark_resolved(blob("a", 10));
        cache.mark_resolved(blob("a", 20));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), 21);
    }

    #[test]
    fn test_concurrent_writers_share_one_cache() {
        let cache = BlobCache::with_max_bytes(64);
        let (done_tx, done_rx) = flume::unbounded();

        for t in 0..4 {
            let cache = cache.clone();
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                for i in 0..20_000 {
                    cache.mark_resolved(blob(&format!("t{t}/{}", i % 7), 9));
                }
                let _ = done_tx.send(t);
            });
        }
        drop(done_tx);

        for _ in 0..4 {
            done_rx
                .recv_timeout(std::time::Duration::from_secs(20))
                .expect("writer threads stalled");
        }
        assert!(cache.memory_usage() <= 64);
        let expected: usize = {
            let inner = cache.inner.read();
            inner.entries.iter().map(|(uri, data)| entry_size(uri, data)).sum()
        };
        assert_eq!(cache.memory_usage(), expected);
    }
}
