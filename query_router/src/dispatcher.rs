//! Adapts [`shard_executor::ShardExecutor`] to the Engine's [`query_engine::ShardDispatcher`]
//! seam — in this in-process wiring the router dispatches directly to the local executor; a
//! networked deployment would implement the same trait over an RPC client instead, the way
//! `DmlSink` decouples ingestion from its transport.
use async_trait::async_trait;
use data_types::ShardId;
use query_engine::{ShardDispatcher, ShardOutcome};
use query_planner::{LocalPlanTemplate, PartitionScanMethod, QueryError};
use shard_executor::{ColumnStore, ShardExecutor, ShardResult};
use tokio_util::sync::CancellationToken;

/// Dispatches every shard to the same local [`ShardExecutor`], since this workspace's column
/// store already fronts every shard it hosts via `active_shards`.
#[derive(Debug)]
pub struct LocalDispatcher<S> {
    executor: ShardExecutor<S>,
}

impl<S: ColumnStore> LocalDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            executor: ShardExecutor::new(store),
        }
    }
}

#[async_trait]
impl<S: ColumnStore + 'static> ShardDispatcher for LocalDispatcher<S> {
    async fn dispatch(
        &self,
        _shard: ShardId,
        part_methods: Vec<PartitionScanMethod>,
        template: LocalPlanTemplate,
        cancellation: CancellationToken,
    ) -> Result<ShardOutcome, QueryError> {
        // The Engine enforces `item_limit` once across all shards' gathered results; the shard
        // side scans unbounded and lets the gather stage truncate.
        let result = self
            .executor
            .execute(&part_methods, &template, usize::MAX, &cancellation)
            .await?;
        Ok(convert(result))
    }
}

fn convert(result: ShardResult) -> ShardOutcome {
    match result {
        ShardResult::Rows(rows) => ShardOutcome::Rows(rows),
        ShardResult::Aggregate(value) => ShardOutcome::Aggregate(value),
    }
}
