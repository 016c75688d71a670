//! Per-query observability context.
//!
//! A [`Trace`] is created at request entry and closed exactly once, on the final response
//! (success or failure). It carries no span tree of its own; it is a thin correlation handle
//! that downstream log lines are tagged with, in the spirit of IOx's `trace` crate.
#![warn(missing_debug_implementations, clippy::explicit_iter_loop, clippy::use_self)]

use chrono::{DateTime, Utc};
use observability_deps::tracing::{debug, warn};
use rand::Rng;
use std::fmt;

/// A 128-bit identifier, printed as hex, uniquely naming one query's trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generates a new random trace id.
    pub fn new() -> Self {
        Self(rand::thread_rng().gen())
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome a [`Trace`] is closed with, logged when the query finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The query produced a client-visible result.
    Success,
    /// The query failed with a categorized error.
    Error,
    /// The query was cancelled (timeout, disconnect, or shutdown) before completion.
    Cancelled,
}

/// An open per-query trace. Create with [`Trace::start`], close with [`Trace::close`].
///
/// Dropping a `Trace` that was never closed logs a warning: it means some code path returned
/// without going through the router's single reply point.
pub struct Trace {
    id: TraceId,
    operation: &'static str,
    started_at: DateTime<Utc>,
    closed: bool,
}

impl Trace {
    /// Starts a new trace for `operation` (e.g. `"LogicalPlanQuery"`).
    pub fn start(operation: &'static str) -> Self {
        let trace = Self {
            id: TraceId::new(),
            operation,
            started_at: Utc::now(),
            closed: false,
        };
        debug!(trace_id = %trace.id, operation, "trace started");
        trace
    }

    /// This trace's correlation id.
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Closes the trace, logging its outcome and duration. Idempotent: only the first call
    /// emits a log line.
    pub fn close(mut self, outcome: Outcome) {
        self.close_mut(outcome);
    }

    fn close_mut(&mut self, outcome: Outcome) {
        if self.closed {
            return;
        }
        self.closed = true;
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        debug!(
            trace_id = %self.id,
            operation = self.operation,
            outcome = ?outcome,
            elapsed_ms = elapsed.num_milliseconds(),
            "trace closed"
        );
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for Trace {
    fn drop(&mut self) {
        if !self.closed {
            warn!(trace_id = %self.id, operation = self.operation, "trace dropped without being closed");
            self.close_mut(Outcome::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let trace = Trace::start("test");
        let id = trace.id();
        trace.close(Outcome::Success);
        // second close would be a compile error (trace consumed); dropping an already-closed
        // trace must not panic or double count.
        let mut trace2 = Trace::start("test2");
        assert_ne!(trace2.id(), id);
        trace2.close_mut(Outcome::Error);
        drop(trace2);
    }

    #[test]
    fn drop_without_close_logs_cancelled() {
        let trace = Trace::start("abandoned");
        drop(trace);
    }
}
