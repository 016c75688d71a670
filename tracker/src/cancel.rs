//! Cancellation plumbing shared by the Engine and ShardExecutor.
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trace::Trace;

/// Derives a per-query cancellation token from the router's process-wide shutdown token, and
/// races it against `deadline`.
///
/// Timeout, client disconnect, and router shutdown all converge on the returned token being
/// cancelled; callers poll [`QueryCancellation::is_cancelled`] at chunk/shard boundaries rather
/// than being interrupted mid-flight.
#[derive(Debug, Clone)]
pub struct QueryCancellation {
    token: CancellationToken,
}

impl QueryCancellation {
    /// Creates a child of `parent` (the router's shutdown token) that additionally cancels
    /// itself once `deadline` elapses.
    pub fn with_deadline(parent: &CancellationToken, deadline: Duration) -> Self {
        let token = parent.child_token();
        let watchdog_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => watchdog_token.cancel(),
                _ = watchdog_token.cancelled() => {}
            }
        });
        Self { token }
    }

    /// A bare child of `parent` with no deadline of its own (used for shard-side requests,
    /// whose only source of cancellation is the parent query's token).
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    /// True once this query has been cancelled, by any source.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels this query and everything derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying token, for passing to APIs (e.g. shard RPC clients) that take one
    /// directly.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Closes `trace` with the outcome implied by whether this query ended up cancelled.
    pub fn close_trace(&self, trace: Trace, success: bool) {
        use trace::Outcome;
        let outcome = if self.is_cancelled() {
            Outcome::Cancelled
        } else if success {
            Outcome::Success
        } else {
            Outcome::Error
        };
        trace.close(outcome);
    }
}
