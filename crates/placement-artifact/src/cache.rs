//! Parse cache keyed by content hash
//!
//! Artifacts are immutable, so a parse result is valid for as long as the
//! content it came from. Identical content shared between artifacts parses
//! once.

use crate::hash::ContentHash;
use crate::parser::{parse, ParseOutcome};
use moka::future::Cache;
use std::sync::Arc;

/// Default number of parse results kept
pub const DEFAULT_CAPACITY: u64 = 1_024;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently cached
    pub entry_count: u64,
    /// Lookups answered from cache
    pub hits: u64,
    /// Lookups that had to parse
    pub misses: u64,
}

/// Concurrent cache of [`ParseOutcome`]s
#[derive(Debug, Clone)]
pub struct ParseCache {
    inner: Cache<ContentHash, Arc<ParseOutcome>>,
    hits: Arc<std::sync::atomic::AtomicU64>,
    misses: Arc<std::sync::atomic::AtomicU64>,
}

impl ParseCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            hits: Arc::default(),
            misses: Arc::default(),
        }
    }

    /// Parse `content`, reusing a cached result for identical text
    pub async fn get_or_parse(&self, content: &str) -> Arc<ParseOutcome> {
        use std::sync::atomic::Ordering;

        let hash = ContentHash::compute(content.as_bytes());
        if let Some(cached) = self.inner.get(&hash).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = Arc::new(parse(content));
        tracing::debug!(
            hash = %hash.short(),
            blocks = outcome.blocks.len(),
            shape = ?outcome.shape,
            "parsed artifact content"
        );
        self.inner.insert(hash, Arc::clone(&outcome)).await;
        outcome
    }

    /// Drop every cached result
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering;

        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_content_parses_once() {
        let cache = ParseCache::new(16);
        let text = r#"<artifact id="Acme">hello</artifact>"#;

        let first = cache.get_or_parse(text).await;
        let second = cache.get_or_parse(text).await;

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn different_content_is_separate() {
        let cache = ParseCache::default();
        let a = cache.get_or_parse("alpha").await;
        let b = cache.get_or_parse("beta").await;
        assert_eq!(a.blocks[0].body, "alpha");
        assert_eq!(b.blocks[0].body, "beta");
        assert_eq!(cache.stats().misses, 2);
    }
}
