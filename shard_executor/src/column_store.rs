//! The shard executor's collaborator seam into the column store (consumed interface).
//!
//! Modeled as one async trait, analogous to the `IngesterPartitionInfo`/
//! `ParquetFileInfo` mockable-interface pattern in
//! `querier::table::state_reconciler::interface`: production code depends only on this trait,
//! tests supply an in-memory fake.
use async_trait::async_trait;
use data_types::{ColumnId, ShardId};
use futures::stream::BoxStream;
use query_planner::{AggregateValue, ChunkScanMethod, ColumnValue, PartitionScanMethod, QueryError};

/// One chunk's worth of column values for a single partition, as pulled off a scan.
///
/// A real column store yields reference-counted buffers shared with its own cache; this
/// workspace only needs the owned values the executor folds through an aggregator, so the
/// chunk is flattened to a plain vector rather than modeling the store's internal layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSet {
    pub partition_key: String,
    pub values: Vec<ColumnValue>,
}

/// The shard executor's view of the column store: a pull-based chunk scan, a server-side
/// aggregate pushdown, and the metadata calls backing `GetIndexNames`/`GetIndexValues`.
#[async_trait]
pub trait ColumnStore: std::fmt::Debug + Send + Sync {
    /// Opens a pull-based stream of chunks for `part_method`, restricted to `chunk_scan`'s row
    /// range and `columns`. The executor fetches the next chunk only after folding the
    /// previous one, giving the store natural backpressure.
    async fn scan_chunks(
        &self,
        part_method: &PartitionScanMethod,
        chunk_scan: &ChunkScanMethod,
        columns: &[ColumnId],
    ) -> Result<BoxStream<'static, Result<ChunkSet, QueryError>>, QueryError>;

    /// Store-side aggregate pushdown, when the store can compute the fold itself instead of
    /// streaming raw chunks. The executor falls back to `scan_chunks` when this returns `Ok(None)`.
    async fn aggregate(
        &self,
        part_method: &PartitionScanMethod,
        chunk_scan: &ChunkScanMethod,
        column: ColumnId,
    ) -> Result<Option<AggregateValue>, QueryError>;

    /// The shards this store currently hosts data for.
    async fn active_shards(&self) -> Result<Vec<ShardId>, QueryError>;

    /// The index (tag-like) columns available, with their cardinality.
    async fn index_names(&self) -> Result<Vec<(String, usize)>, QueryError>;

    /// The distinct values of `index` observed on `shard`.
    async fn index_values(&self, shard: ShardId, index: &str) -> Result<Vec<String>, QueryError>;
}

/// Lets an `Arc<S>` stand in for `S` itself, the way
/// `impl<T: IngesterPartitionInfo> IngesterPartitionInfo for Arc<T>` lets a reconciler hold a
/// shared handle to the same store the shard executor and the router both need.
#[async_trait]
impl<T: ColumnStore> ColumnStore for std::sync::Arc<T> {
    async fn scan_chunks(
        &self,
        part_method: &PartitionScanMethod,
        chunk_scan: &ChunkScanMethod,
        columns: &[ColumnId],
    ) -> Result<BoxStream<'static, Result<ChunkSet, QueryError>>, QueryError> {
        self.as_ref().scan_chunks(part_method, chunk_scan, columns).await
    }

    async fn aggregate(
        &self,
        part_method: &PartitionScanMethod,
        chunk_scan: &ChunkScanMethod,
        column: ColumnId,
    ) -> Result<Option<AggregateValue>, QueryError> {
        self.as_ref().aggregate(part_method, chunk_scan, column).await
    }

    async fn active_shards(&self) -> Result<Vec<ShardId>, QueryError> {
        self.as_ref().active_shards().await
    }

    async fn index_names(&self) -> Result<Vec<(String, usize)>, QueryError> {
        self.as_ref().index_names().await
    }

    async fn index_values(&self, shard: ShardId, index: &str) -> Result<Vec<String>, QueryError> {
        self.as_ref().index_values(shard, index).await
    }
}
