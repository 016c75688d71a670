//! A future extension trait that fails tests that hang instead of blocking CI forever.
use async_trait::async_trait;
use std::{fmt::Debug, future::Future, time::Duration};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extends any [`Future`] with a test-friendly timeout.
#[async_trait]
pub trait FutureTimeout: Future + Sized + Send {
    /// Wait for `self` to resolve, panicking if it doesn't within [`DEFAULT_TIMEOUT`].
    async fn with_timeout_panic(self) -> Self::Output
    where
        Self::Output: Send,
    {
        self.with_timeout(DEFAULT_TIMEOUT).await
    }

    /// Wait for `self` to resolve, panicking if it doesn't within `d`.
    async fn with_timeout(self, d: Duration) -> Self::Output
    where
        Self::Output: Send,
    {
        tokio::time::timeout(d, self)
            .await
            .expect("future did not resolve within timeout")
    }
}

impl<T> FutureTimeout for T where T: Future + Send {}

/// Asserts `err` matches an expected debug-printed substring, for error-shape assertions where
/// deriving `PartialEq` on the whole error enum would be overkill.
pub fn assert_error_contains<E: Debug>(err: &E, needle: &str) {
    let rendered = format!("{:?}", err);
    assert!(
        rendered.contains(needle),
        "expected error to contain {:?}, got {:?}",
        needle,
        rendered
    );
}
