// Per-offer mutual exclusion for lifecycle transitions
//
// Timer tasks and manual API calls can race on the same offer inside the
// multi-threaded runtime; holding the offer's lock serialises them.

use crate::models::OfferId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

/// Async mutex per offer id, created on first use
#[derive(Debug, Default)]
pub struct OfferLocks {
    locks: Mutex<HashMap<OfferId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Guard that releases the offer's lock when dropped
#[derive(Debug)]
pub struct OfferLockGuard {
    offer_id: OfferId,
    _guard: OwnedMutexGuard<()>,
}

impl OfferLockGuard {
    pub fn offer_id(&self) -> OfferId {
        self.offer_id
    }
}

impl OfferLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `offer_id`
    pub async fn acquire(&self, offer_id: OfferId) -> OfferLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(offer_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;
        trace!(offer_id, "Offer lock acquired");

        OfferLockGuard {
            offer_id,
            _guard: guard,
        }
    }

    /// Drop the lock entry for an offer that will never transition again.
    ///
    /// Entries still held or awaited elsewhere are kept.
    pub fn forget(&self, offer_id: OfferId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(&offer_id) {
            // One reference lives in the map; any other is a holder or waiter
            if Arc::strong_count(lock) == 1 {
                locks.remove(&offer_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_offer_is_exclusive() {
        let locks = Arc::new(OfferLocks::new());
        let guard = locks.acquire(1).await;
        assert_eq!(guard.offer_id(), 1);

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(1).await.offer_id() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        assert_eq!(contender.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_different_offers_do_not_block() {
        let locks = OfferLocks::new();
        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_forget_keeps_held_locks() {
        let locks = OfferLocks::new();
        let guard = locks.acquire(5).await;
        locks.forget(5);
        assert_eq!(locks.len(), 1);

        drop(guard);
        locks.forget(5);
        assert!(locks.is_empty());
    }
}
