//! Logical/physical plan types and the shapes the Validator resolves them against.
use crate::aggregate::Arg;
use data_types::{ColumnId, ShardId};

/// The user-supplied selector over partitions, before the Validator pins it to shards.
#[derive(Debug, Clone, PartialEq)]
pub enum PartQuery {
    AllPartitions,
    Keys(Vec<String>),
}

/// The user-supplied selector over a chunk's row range, before validation resolves it to a
/// concrete [`ChunkScanMethod`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataQuery {
    AllChunks,
    MostRecent,
    TimeRange { start_ms: i64, end_ms: i64 },
    RowKeyRange { start: String, end: String },
}

/// The logical, pre-planning request shape a client submits.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    PartitionsInstant {
        part_query: PartQuery,
        columns: Vec<String>,
    },
    PartitionsRange {
        part_query: PartQuery,
        data_query: DataQuery,
        columns: Vec<String>,
    },
    ReduceEach {
        agg_func: String,
        agg_args: Vec<Arg>,
        child: Box<LogicalPlan>,
    },
    ReducePartitions {
        comb_func: String,
        comb_args: Vec<Arg>,
        child: Box<LogicalPlan>,
    },
}

/// A partition scan pinned to exactly one shard: the scatter step has already resolved
/// ownership, so nothing downstream needs to consult the `ShardMap` again.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionScanMethod {
    SinglePartition { shard: ShardId, key: String },
    MultiPartition { shard: ShardId, keys: Vec<String> },
    FilteredPartition {
        shard: ShardId,
        predicate: String,
    },
}

impl PartitionScanMethod {
    pub fn shard(&self) -> ShardId {
        match self {
            Self::SinglePartition { shard, .. }
            | Self::MultiPartition { shard, .. }
            | Self::FilteredPartition { shard, .. } => *shard,
        }
    }
}

/// A validated, concrete row-range selector. Range bounds are inclusive;
/// an empty range yields zero rows rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkScanMethod {
    AllChunks,
    MostRecent,
    TimeRange { start_ms: i64, end_ms: i64 },
    RowKeyRange { start: String, end: String },
}

/// A fully resolved aggregator invocation, ready to be embedded in a plan or shipped to a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSpec {
    pub name: String,
    pub args: Vec<Arg>,
    pub column: ColumnId,
}

/// A fully resolved combiner invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinerSpec {
    pub name: String,
    pub args: Vec<Arg>,
}

/// The per-shard local work a `DistributeConcat` scatter node instantiates once per shard.
///
/// This is the planner's answer to "what does each shard actually run": a plain vector read for
/// rules 1/2, or an aggregator fold for rules 3/4. Keeping it as one additive variant set rather
/// than overloading `LocalVectorReader` lets the Engine dispatch on it directly instead of
/// re-deriving which path a `DistributeConcat` node means.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalPlanTemplate {
    /// Rule 1: `PartitionsInstant` → read the last tuple per partition.
    StreamLastTuple { columns: Vec<ColumnId> },
    /// Rule 2: `PartitionsRange` → read the full vector for the range.
    LocalVectorReader {
        columns: Vec<ColumnId>,
        chunk_scan: ChunkScanMethod,
    },
    /// Rules 3/4: each shard folds all of its assigned partitions' rows into one raw partial
    /// aggregate, not per partition).
    /// `combiner` is always resolved (every aggregator has a registered combiner pairing)
    /// and is used to `finish()` that raw partial (e.g. turning `avg`'s (sum, count)
    /// pair into a scalar) regardless of which rule applies. `cross_partition` distinguishes
    /// the two rules: rule 3 (`ReduceEach` alone) returns one finished value per shard; rule 4
    /// (`ReducePartitions` wrapping it) folds those finished values into a single cluster-wide
    /// result.
    ShardAggregate {
        column: ColumnId,
        chunk_scan: ChunkScanMethod,
        aggregator: AggregatorSpec,
        combiner: CombinerSpec,
        cross_partition: bool,
    },
}

/// The compiled, executable plan. `DistributeConcat` is the sole scatter
/// node; its `template` says what each shard instantiates locally.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalPlan {
    pub part_methods: Vec<PartitionScanMethod>,
    pub parallelism: usize,
    pub item_limit: usize,
    pub template: LocalPlanTemplate,
}

impl PhysicalPlan {
    /// The distinct shards this plan must scatter to, in ascending order.
    pub fn shards(&self) -> Vec<ShardId> {
        let mut shards: Vec<ShardId> = self.part_methods.iter().map(|m| m.shard()).collect();
        shards.sort_unstable();
        shards.dedup();
        shards
    }
}
