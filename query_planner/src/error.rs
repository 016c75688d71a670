//! The error taxonomy shared by the Validator, Planner, Engine and Router.
use data_types::{ShardId, ShardStatus};
use thiserror::Error;

/// Every error this workspace's core can produce, categorized so that user errors
/// are never retried, transport/membership errors are retried with a bound, and anything
/// unrecognized is wrapped rather than allowed to crash the router.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("UnknownColumn({0})")]
    UnknownColumn(String),

    #[error("NoSuchFunction({0})")]
    NoSuchFunction(String),

    #[error("WrongArity: given {given}, expected {expected}")]
    WrongArity { given: usize, expected: usize },

    #[error("BadArgument: {0}")]
    BadArgument(String),

    #[error("NoTimestampColumn")]
    NoTimestampColumn,

    #[error("UnsupportedPlan: {0}")]
    UnsupportedPlan(String),

    #[error("ShardNotActive({shard}, status={status:?})")]
    ShardNotActive { shard: ShardId, status: ShardStatus },

    #[error("NodeUnavailable({0})")]
    NodeUnavailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("ClusterNotReady")]
    ClusterNotReady,

    #[error("InternalError: {0}")]
    InternalError(String),
}

impl QueryError {
    /// Retry policy: transport/membership errors are retried with a fresh `ShardMap`
    /// snapshot up to a small bound; every other kind is a user or terminal error and is
    /// surfaced immediately.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::NodeUnavailable(_) => true,
            Self::ShardNotActive { status, .. } => status.is_transient(),
            _ => false,
        }
    }

    /// `BadQuery(reason)` is the protocol-level wrapper for validation-time failures;
    /// this renders the reason text clients see.
    pub fn bad_query_reason(&self) -> String {
        self.to_string()
    }
}
