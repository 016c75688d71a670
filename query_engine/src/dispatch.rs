//! The Engine's collaborator seam into per-shard execution.
//!
//! `ShardDispatcher` is the mockable boundary between this crate and whatever actually carries a
//! `SingleShardQuery` to the owning node — in this workspace that is `query_router` dispatching
//! in-process to `shard_executor`; a networked deployment would implement the same trait over an
//! RPC client, the way `DmlSink` decouples ingestion from its transport
//! (`ingester::stream_handler::sink_adaptor`).
use async_trait::async_trait;
use data_types::ShardId;
use query_planner::{AggregateValue, ColumnValue, LocalPlanTemplate, PartitionScanMethod, QueryError};
use tokio_util::sync::CancellationToken;

/// What one shard produced for one `DistributeConcat` dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardOutcome {
    /// One row per partition scanned, in submission order (rules 1 and 2).
    Rows(Vec<Vec<ColumnValue>>),
    /// The shard's single raw aggregate fold over all of its assigned partitions (rules 3 and
    /// 4 both produce this; only `cross_partition` says whether the Engine finishes it alone or
    /// folds it together with the other shards first).
    Aggregate(AggregateValue),
}

/// Carries one shard's slice of a physical plan to wherever that shard is owned, and returns its
/// result or a categorized [`QueryError`].
#[async_trait]
pub trait ShardDispatcher: std::fmt::Debug + Send + Sync {
    async fn dispatch(
        &self,
        shard: ShardId,
        part_methods: Vec<PartitionScanMethod>,
        template: LocalPlanTemplate,
        cancellation: CancellationToken,
    ) -> Result<ShardOutcome, QueryError>;
}
