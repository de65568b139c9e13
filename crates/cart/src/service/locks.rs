//! Per-cart mutation locks.
//!
//! Mutating operations on the same cart must not interleave their
//! read-modify-write of line item quantities, so each takes this registry's
//! exclusive lock for its cart. Operations on different carts never contend.
//! Display reads skip the registry entirely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use verdant_core::CartId;

use crate::store::StoreError;

/// Registry of per-cart async mutexes with a bounded acquisition wait.
#[derive(Debug)]
pub(crate) struct CartLocks {
    wait: Duration,
    inner: Mutex<HashMap<CartId, Arc<AsyncMutex<()>>>>,
}

impl CartLocks {
    pub(crate) fn new(wait: Duration) -> Self {
        Self {
            wait,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, cart: CartId) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("lock registry poisoned".to_owned()))?;
        Ok(Arc::clone(map.entry(cart).or_default()))
    }

    /// Acquire the exclusive lock for one cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockBusy` when the lock cannot be acquired within
    /// the configured wait.
    pub(crate) async fn acquire(&self, cart: CartId) -> Result<OwnedMutexGuard<()>, StoreError> {
        let lock = self.entry(cart)?;
        tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| StoreError::LockBusy)
    }

    /// Acquire the locks for two carts, always in ascending id order so two
    /// concurrent merges over the same pair cannot deadlock.
    pub(crate) async fn acquire_pair(
        &self,
        a: CartId,
        b: CartId,
    ) -> Result<(OwnedMutexGuard<()>, OwnedMutexGuard<()>), StoreError> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.acquire(first).await?;
        let second_guard = self.acquire(second).await?;
        Ok((first_guard, second_guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_cart_contends() {
        let locks = CartLocks::new(Duration::from_millis(50));
        let cart = CartId::new(1);

        let held = locks.acquire(cart).await.expect("first acquire");
        let second = locks.acquire(cart).await;
        assert!(matches!(second, Err(StoreError::LockBusy)));

        drop(held);
        assert!(locks.acquire(cart).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_carts_do_not_contend() {
        let locks = CartLocks::new(Duration::from_millis(50));

        let _held = locks.acquire(CartId::new(1)).await.expect("first");
        assert!(locks.acquire(CartId::new(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_pair_order_is_stable() {
        let locks = CartLocks::new(Duration::from_millis(50));

        let (a, b) = locks
            .acquire_pair(CartId::new(2), CartId::new(1))
            .await
            .expect("pair");
        drop((a, b));

        // Reversed arguments acquire the same locks without deadlocking.
        let _guards = locks
            .acquire_pair(CartId::new(1), CartId::new(2))
            .await
            .expect("pair again");
    }
}
