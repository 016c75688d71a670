//! The client-facing and shard-internal message protocol the router's mailbox accepts.
//!
//! Each variant carries its own one-shot reply channel rather than an originator address: this
//! workspace is in-process with no network transport, so a `oneshot::Sender` plays the role
//! a networked service would give an RPC response stream.
use data_types::{QueryId, ShardEvent, ShardId, ShardMap};
use query_engine::QueryOptions;
use query_planner::{LocalPlanTemplate, LogicalPlan, PartitionScanMethod, PhysicalPlan, QueryError};
use tokio::sync::oneshot;

/// The reply to a `LogicalPlanQuery`/`ExecPlanQuery`: the resulting wire shape, tagged with the
/// query id it was assigned, or the categorized failure.
pub type QueryReply = Result<(QueryId, query_engine::QueryResult), (QueryId, QueryError)>;

#[derive(Debug)]
pub enum RouterMessage {
    /// Client entry point: full Validator → Planner → Engine pipeline.
    LogicalPlanQuery {
        plan: LogicalPlan,
        options: Option<QueryOptions>,
        reply: oneshot::Sender<QueryReply>,
    },
    /// Client entry point that skips validation: the caller already holds a compiled plan.
    ExecPlanQuery {
        physical_plan: PhysicalPlan,
        options: Option<QueryOptions>,
        reply: oneshot::Sender<QueryReply>,
    },
    /// Shard-side entry point, as dispatched by this (or a remote) node's Engine.
    SingleShardQuery {
        shard: ShardId,
        part_methods: Vec<PartitionScanMethod>,
        template: LocalPlanTemplate,
        reply: oneshot::Sender<Result<query_planner::AggregateValue, QueryError>>,
    },
    GetIndexNames {
        limit: usize,
        reply: oneshot::Sender<Result<Vec<(String, usize)>, QueryError>>,
    },
    GetIndexValues {
        shard: ShardId,
        index: String,
        limit: usize,
        reply: oneshot::Sender<Result<Vec<String>, QueryError>>,
    },
    /// Replaces the `ShardMap` if `map`'s revision is newer; stale updates are discarded.
    CurrentShardSnapshot { map: ShardMap },
    /// A single incremental membership update.
    ShardEvent { event: ShardEvent },
}
