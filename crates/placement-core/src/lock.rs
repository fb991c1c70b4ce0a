//! Per-company serialization
//!
//! Propagation, completion, reset and synthesis all read a company's graph
//! and write back to it, so two runs on one company must not interleave.
//! Runs on different companies never contend.

use dashmap::DashMap;
use placement_graph::CompanyId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-company run locks
#[derive(Debug, Default)]
pub struct CompanyLocks {
    locks: DashMap<CompanyId, Arc<Mutex<()>>>,
}

impl CompanyLocks {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `company`
    pub async fn acquire(&self, company: &CompanyId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let lock = Arc::clone(self.locks.entry(company.clone()).or_default().value());
        lock.lock_owned().await
    }

    /// Take the lock only if it is free
    #[must_use]
    pub fn try_acquire(&self, company: &CompanyId) -> Option<OwnedMutexGuard<()>> {
        let lock = Arc::clone(self.locks.entry(company.clone()).or_default().value());
        lock.try_lock_owned().ok()
    }

    /// Number of companies seen
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no company has been locked yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_company_is_exclusive() {
        let locks = CompanyLocks::new();
        let acme = CompanyId::from("acme");

        let guard = locks.acquire(&acme).await;
        assert!(locks.try_acquire(&acme).is_none());
        drop(guard);
        assert!(locks.try_acquire(&acme).is_some());
    }

    #[tokio::test]
    async fn companies_are_independent() {
        let locks = CompanyLocks::new();
        let _acme = locks.acquire(&CompanyId::from("acme")).await;
        assert!(locks.try_acquire(&CompanyId::from("beta")).is_some());
        assert_eq!(locks.len(), 2);
    }
}
