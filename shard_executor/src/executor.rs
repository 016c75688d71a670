//! `ShardExecutor`: the per-shard entry point (`SingleShardQuery`).
//!
//! Re-validates the request (the remote side must not trust the caller's validation — the
//! dataset version seen by the shard may differ from the one the client's Validator saw),
//! opens a chunk scan against the column store, and folds rows through the aggregator. The
//! scan is pull-based: the executor fetches the next chunk only after folding the previous one,
//! and never materializes more than one chunk per partition at a time.
use crate::column_store::ColumnStore;
use data_types::ColumnId;
use futures::StreamExt;
use observability_deps::tracing::debug;
use query_planner::{
    AggregateValue, ChunkScanMethod, ColumnValue, FunctionRegistry, LocalPlanTemplate,
    PartitionScanMethod, QueryError,
};
use tokio_util::sync::CancellationToken;

/// What one shard produces for one dispatch. Distinct from `query_engine::ShardOutcome`: the
/// two crates are peers coordinated by the (not yet networked) router, not directly coupled, so
/// each defines the result shape it actually needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardResult {
    Rows(Vec<Vec<ColumnValue>>),
    /// The shard's single raw (possibly unfinished, e.g. `avg`'s pair) aggregate fold over all
    /// of its assigned partitions. Finishing — and any cross-shard combine — happens upstream.
    Aggregate(AggregateValue),
}

/// Folds one shard's slice of a physical plan against its `ColumnStore`.
#[derive(Debug)]
pub struct ShardExecutor<S> {
    store: S,
    registry: FunctionRegistry,
}

impl<S: ColumnStore> ShardExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: FunctionRegistry,
        }
    }

    /// Runs `template` against `part_methods` (already pinned to this shard), stopping at
    /// `item_limit` rows or the aggregator's own `is_done` signal, whichever comes first.
    /// Returns `QueryError::Timeout` and discards any partial work if `cancellation` fires first.
    pub async fn execute(
        &self,
        part_methods: &[PartitionScanMethod],
        template: &LocalPlanTemplate,
        item_limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ShardResult, QueryError> {
        match template {
            LocalPlanTemplate::StreamLastTuple { columns } => {
                self.stream_last_tuple(part_methods, columns, item_limit, cancellation)
                    .await
            }
            LocalPlanTemplate::LocalVectorReader {
                columns,
                chunk_scan,
            } => {
                self.local_vector_read(part_methods, columns, chunk_scan, item_limit, cancellation)
                    .await
            }
            LocalPlanTemplate::ShardAggregate {
                column,
                chunk_scan,
                aggregator,
                cross_partition: _,
                ..
            } => {
                self.shard_aggregate(part_methods, *column, chunk_scan, aggregator, cancellation)
                    .await
            }
        }
    }

    async fn stream_last_tuple(
        &self,
        part_methods: &[PartitionScanMethod],
        columns: &[ColumnId],
        item_limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ShardResult, QueryError> {
        let mut rows = Vec::new();
        for part_method in part_methods {
            if cancellation.is_cancelled() {
                return Err(QueryError::Timeout);
            }
            let mut stream = self
                .store
                .scan_chunks(part_method, &ChunkScanMethod::MostRecent, columns)
                .await?;
            let mut last = None;
            while let Some(chunk) = stream.next().await {
                if cancellation.is_cancelled() {
                    return Err(QueryError::Timeout);
                }
                last = Some(chunk?.values);
            }
            if let Some(values) = last {
                rows.push(values);
            }
            if rows.len() >= item_limit {
                break;
            }
        }
        rows.truncate(item_limit);
        Ok(ShardResult::Rows(rows))
    }

    async fn local_vector_read(
        &self,
        part_methods: &[PartitionScanMethod],
        columns: &[ColumnId],
        chunk_scan: &ChunkScanMethod,
        item_limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ShardResult, QueryError> {
        let mut rows = Vec::new();
        for part_method in part_methods {
            if rows.len() >= item_limit {
                break;
            }
            if cancellation.is_cancelled() {
                return Err(QueryError::Timeout);
            }
            let mut stream = self.store.scan_chunks(part_method, chunk_scan, columns).await?;
            while let Some(chunk) = stream.next().await {
                if cancellation.is_cancelled() {
                    return Err(QueryError::Timeout);
                }
                rows.push(chunk?.values);
                if rows.len() >= item_limit {
                    break;
                }
            }
        }
        rows.truncate(item_limit);
        Ok(ShardResult::Rows(rows))
    }

    /// Folds every partition this shard owns through one shared aggregator state: aggregator
    /// state is scoped per (query, shard), not per partition, so a shard with ten partitions
    /// still produces a single partial, not ten. Prefers the store's own aggregate pushdown;
    /// falls back to a row-by-row fold via `scan_chunks` when the store has no pushdown for this
    /// aggregator/column.
    async fn shard_aggregate(
        &self,
        part_methods: &[PartitionScanMethod],
        column: ColumnId,
        chunk_scan: &ChunkScanMethod,
        aggregator: &query_planner::AggregatorSpec,
        cancellation: &CancellationToken,
    ) -> Result<ShardResult, QueryError> {
        let resolved = self.registry.resolve(
            &aggregator.name,
            &aggregator.args,
            data_types::ColumnType::Double,
        )?;
        let mut state = resolved.aggregator.new_state();
        let mut partials: Vec<AggregateValue> = Vec::new();

        for part_method in part_methods {
            if cancellation.is_cancelled() {
                return Err(QueryError::Timeout);
            }
            if let Some(partial) = self
                .store
                .aggregate(part_method, chunk_scan, column)
                .await?
            {
                debug!(?part_method, "using column store aggregate pushdown");
                partials.push(partial);
                continue;
            }

            let mut stream = self
                .store
                .scan_chunks(part_method, chunk_scan, std::slice::from_ref(&column))
                .await?;
            while let Some(chunk) = stream.next().await {
                if cancellation.is_cancelled() {
                    return Err(QueryError::Timeout);
                }
                state.fold_chunk(&chunk?.values);
                if state.is_done() {
                    break;
                }
            }
            if state.is_done() {
                break;
            }
        }

        let local = state.finalize();
        let combined = partials
            .into_iter()
            .fold(local, |acc, next| resolved.combiner.combine(acc, next));
        Ok(ShardResult::Aggregate(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_store::ChunkSet;
    use async_trait::async_trait;
    use data_types::ShardId;
    use futures::stream::{self, BoxStream};
    use query_planner::AggregatorSpec;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct FakeStore {
        chunks: HashMap<String, Vec<ChunkSet>>,
    }

    #[async_trait]
    impl ColumnStore for FakeStore {
        async fn scan_chunks(
            &self,
            part_method: &PartitionScanMethod,
            _chunk_scan: &ChunkScanMethod,
            _columns: &[ColumnId],
        ) -> Result<BoxStream<'static, Result<ChunkSet, QueryError>>, QueryError> {
            let key = match part_method {
                PartitionScanMethod::SinglePartition { key, .. } => key.clone(),
                _ => panic!("fake only supports single-partition scans"),
            };
            let chunks = self.chunks.get(&key).cloned().unwrap_or_default();
            Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
        }

        async fn aggregate(
            &self,
            _part_method: &PartitionScanMethod,
            _chunk_scan: &ChunkScanMethod,
            _column: ColumnId,
        ) -> Result<Option<AggregateValue>, QueryError> {
            Ok(None)
        }

        async fn active_shards(&self) -> Result<Vec<ShardId>, QueryError> {
            Ok(vec![])
        }

        async fn index_names(&self) -> Result<Vec<(String, usize)>, QueryError> {
            Ok(vec![])
        }

        async fn index_values(&self, _shard: ShardId, _index: &str) -> Result<Vec<String>, QueryError> {
            Ok(vec![])
        }
    }

    fn method(key: &str) -> PartitionScanMethod {
        PartitionScanMethod::SinglePartition {
            shard: ShardId(0),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn stream_last_tuple_keeps_the_latest_chunk_per_partition() {
        let mut store = FakeStore::default();
        store.chunks.insert(
            "p0".into(),
            vec![
                ChunkSet {
                    partition_key: "p0".into(),
                    values: vec![ColumnValue::Double(1.0)],
                },
                ChunkSet {
                    partition_key: "p0".into(),
                    values: vec![ColumnValue::Double(2.0)],
                },
            ],
        );
        let executor = ShardExecutor::new(store);
        let result = executor
            .execute(
                &[method("p0")],
                &LocalPlanTemplate::StreamLastTuple {
                    columns: vec![ColumnId(0)],
                },
                100,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            result,
            ShardResult::Rows(vec![vec![ColumnValue::Double(2.0)]])
        );
    }

    #[tokio::test]
    async fn shard_aggregate_folds_every_partition_into_one_state() {
        let mut store = FakeStore::default();
        store.chunks.insert(
            "p0".into(),
            vec![ChunkSet {
                partition_key: "p0".into(),
                values: vec![ColumnValue::Double(1.0), ColumnValue::Double(2.0)],
            }],
        );
        store.chunks.insert(
            "p1".into(),
            vec![ChunkSet {
                partition_key: "p1".into(),
                values: vec![ColumnValue::Double(3.0)],
            }],
        );
        let executor = ShardExecutor::new(store);
        let result = executor
            .execute(
                &[method("p0"), method("p1")],
                &LocalPlanTemplate::ShardAggregate {
                    column: ColumnId(0),
                    chunk_scan: ChunkScanMethod::AllChunks,
                    aggregator: AggregatorSpec {
                        name: "sum".into(),
                        args: vec![],
                        column: ColumnId(0),
                    },
                    combiner: query_planner::CombinerSpec {
                        name: "sum".into(),
                        args: vec![],
                    },
                    cross_partition: false,
                },
                1000,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            result,
            ShardResult::Aggregate(AggregateValue::Scalar(ColumnValue::Double(6.0)))
        );
    }

    #[tokio::test]
    async fn cancellation_before_scan_surfaces_timeout() {
        let store = FakeStore::default();
        let executor = ShardExecutor::new(store);
        let token = CancellationToken::new();
        token.cancel();
        let err = executor
            .execute(
                &[method("p0")],
                &LocalPlanTemplate::LocalVectorReader {
                    columns: vec![ColumnId(0)],
                    chunk_scan: ChunkScanMethod::AllChunks,
                },
                100,
                &token,
            )
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::Timeout);
    }
}
