//! Bounding the number of concurrently in-flight shard requests.
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A cloneable gate that admits at most `parallelism` concurrent holders.
///
/// The Engine uses one of these per `DistributeConcat` dispatch: a permit is acquired before a
/// shard request is submitted and held for its duration, so at most `options.parallelism`
/// requests are in flight at any instant, matching the scatter/gather backpressure rule.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting at most `parallelism` concurrent holders.
    ///
    /// # Panics
    /// Panics if `parallelism` is zero; a query must always be able to make progress.
    pub fn new(parallelism: usize) -> Self {
        assert!(parallelism > 0, "parallelism must be at least 1");
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism)),
        }
    }

    /// Waits for a free slot and returns a guard that releases it on drop.
    pub async fn acquire(&self) -> ConcurrencyPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        ConcurrencyPermit { _permit: permit }
    }
}

/// Held for the duration of one shard request; releases its slot on drop.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrency() {
        let limiter = ConcurrencyLimiter::new(2);

        let p1 = limiter.acquire().await;
        let p2 = limiter.acquire().await;

        let limiter2 = limiter.clone();
        let third = tokio::spawn(async move {
            let _p3 = limiter2.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!third.is_finished(), "third acquire should be blocked");

        drop(p1);
        third.await.unwrap();
        drop(p2);
    }
}
