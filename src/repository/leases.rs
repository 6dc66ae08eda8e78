//! Per-book leases guarding check-then-mutate sequences

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

/// Exclusive lease on a single book. Released on drop, on every exit path.
pub type Lease = OwnedMutexGuard<()>;

/// Hands out short-lived exclusive leases keyed by book id.
///
/// Acquisition waits a bounded time and then fails with [`AppError::Busy`]
/// instead of queueing indefinitely. Unrelated books never contend.
pub struct LeaseRegistry {
    wait: Duration,
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl LeaseRegistry {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, book_id: i64) -> AppResult<Lease> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| AppError::Internal("lease registry poisoned".to_string()))?;
            Arc::clone(locks.entry(book_id).or_default())
        };

        tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| {
                AppError::Busy(format!(
                    "Book {} is being processed by another operation",
                    book_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquires_succeed() {
        let leases = LeaseRegistry::new(Duration::from_millis(50));
        drop(leases.acquire(1).await.unwrap());
        drop(leases.acquire(1).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_books_do_not_contend() {
        let leases = LeaseRegistry::new(Duration::from_millis(50));
        let _a = leases.acquire(1).await.unwrap();
        let _b = leases.acquire(2).await.unwrap();
    }

    #[tokio::test]
    async fn held_lease_surfaces_busy() {
        let leases = LeaseRegistry::new(Duration::from_millis(50));
        let _held = leases.acquire(7).await.unwrap();
        let err = leases.acquire(7).await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
    }
}
