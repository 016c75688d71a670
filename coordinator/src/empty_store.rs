//! A `ColumnStore` with no data of its own.
//!
//! The column store is an external collaborator this workspace only consumes through the
//! `ColumnStore` trait; no concrete storage engine ships here. `EmptyColumnStore` lets the
//! coordinator binary boot and answer queries (with empty results) absent a real one, the same
//! role `ioxd_test`'s placeholder server type plays for IOx's other service binaries.
use async_trait::async_trait;
use data_types::{ColumnId, ShardId};
use futures::stream::{self, BoxStream};
use query_planner::{AggregateValue, ChunkScanMethod, PartitionScanMethod, QueryError};
use shard_executor::{ChunkSet, ColumnStore};

#[derive(Debug, Default)]
pub struct EmptyColumnStore;

#[async_trait]
impl ColumnStore for EmptyColumnStore {
    async fn scan_chunks(
        &self,
        _part_method: &PartitionScanMethod,
        _chunk_scan: &ChunkScanMethod,
        _columns: &[ColumnId],
    ) -> Result<BoxStream<'static, Result<ChunkSet, QueryError>>, QueryError> {
        Ok(stream::empty().boxed())
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
        Ok(Vec::new())
    }

    async fn index_names(&self) -> Result<Vec<(String, usize)>, QueryError> {
        Ok(Vec::new())
    }

    async fn index_values(&self, _shard: ShardId, _index: &str) -> Result<Vec<String>, QueryError> {
        Ok(Vec::new())
    }
}
