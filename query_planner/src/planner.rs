//! The Planner: deterministic, rule-based compilation from [`LogicalPlan`] to
//! [`PhysicalPlan`]. No cost model — each logical shape maps to exactly one physical shape.
use crate::{
    error::QueryError,
    plan::{AggregatorSpec, CombinerSpec, LocalPlanTemplate, LogicalPlan, PartitionScanMethod, PhysicalPlan},
};
use data_types::ColumnId;

/// Compiles a validated [`LogicalPlan`] into a [`PhysicalPlan`], given the already-resolved
/// partition scan methods and column ids (the Validator has run first; the Planner only shapes
/// the scatter node, it does not re-resolve names).
#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Rule 1: `PartitionsInstant` → `DistributeConcat` reading the last tuple per partition.
    pub fn plan_partitions_instant(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        columns: Vec<ColumnId>,
        parallelism: usize,
        item_limit: usize,
    ) -> PhysicalPlan {
        PhysicalPlan {
            part_methods,
            parallelism,
            item_limit,
            template: LocalPlanTemplate::StreamLastTuple { columns },
        }
    }

    /// Rule 2: `PartitionsRange` → `DistributeConcat` reading the full vector for the range.
    pub fn plan_partitions_range(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        columns: Vec<ColumnId>,
        chunk_scan: crate::plan::ChunkScanMethod,
        parallelism: usize,
        item_limit: usize,
    ) -> PhysicalPlan {
        PhysicalPlan {
            part_methods,
            parallelism,
            item_limit,
            template: LocalPlanTemplate::LocalVectorReader {
                columns,
                chunk_scan,
            },
        }
    }

    /// Rule 3: `ReduceEach(aggF, aggArgs, PartitionsRange(...))` → a per-shard aggregate fold,
    /// one finished value per shard (no cross-shard combine). `combiner` is the aggregator's
    /// own registered pairing, used only to `finish()` each shard's raw fold. Fails with
    /// `BadArgument` unless exactly one column is named.
    pub fn plan_reduce_each(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        columns: Vec<ColumnId>,
        chunk_scan: crate::plan::ChunkScanMethod,
        aggregator: AggregatorSpec,
        combiner: CombinerSpec,
        parallelism: usize,
        item_limit: usize,
    ) -> Result<PhysicalPlan, QueryError> {
        self.plan_shard_aggregate(
            part_methods,
            columns,
            chunk_scan,
            aggregator,
            combiner,
            false,
            parallelism,
            item_limit,
        )
    }

    /// Rule 4: `ReducePartitions(combF, combArgs, ReduceEach(...))` → the same per-shard
    /// aggregate fold as rule 3, but the Engine additionally folds every shard's finished value
    /// into one cluster-wide result using `combiner`.
    pub fn plan_reduce_partitions(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        columns: Vec<ColumnId>,
        chunk_scan: crate::plan::ChunkScanMethod,
        aggregator: AggregatorSpec,
        combiner: CombinerSpec,
        parallelism: usize,
        item_limit: usize,
    ) -> Result<PhysicalPlan, QueryError> {
        self.plan_shard_aggregate(
            part_methods,
            columns,
            chunk_scan,
            aggregator,
            combiner,
            true,
            parallelism,
            item_limit,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_shard_aggregate(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        columns: Vec<ColumnId>,
        chunk_scan: crate::plan::ChunkScanMethod,
        aggregator: AggregatorSpec,
        combiner: CombinerSpec,
        cross_partition: bool,
        parallelism: usize,
        item_limit: usize,
    ) -> Result<PhysicalPlan, QueryError> {
        if columns.len() != 1 {
            return Err(QueryError::BadArgument(format!(
                "Only one column should be specified, but got {}",
                columns.len()
            )));
        }
        Ok(PhysicalPlan {
            part_methods,
            parallelism,
            item_limit,
            template: LocalPlanTemplate::ShardAggregate {
                column: columns[0],
                chunk_scan,
                aggregator,
                combiner,
                cross_partition,
            },
        })
    }

    /// Rule 5: anything not matching rules 1-4 is unsupported.
    pub fn reject_unsupported(&self, plan: &LogicalPlan) -> QueryError {
        QueryError::UnsupportedPlan(format!("{plan:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ChunkScanMethod;
    use data_types::ShardId;

    fn method(shard: u32) -> PartitionScanMethod {
        PartitionScanMethod::SinglePartition {
            shard: ShardId(shard),
            key: format!("p{shard}"),
        }
    }

    #[test]
    fn plan_partitions_instant_builds_stream_last_tuple() {
        let planner = Planner::new();
        let plan = planner.plan_partitions_instant(vec![method(0)], vec![ColumnId(1)], 16, 1000);
        assert!(matches!(
            plan.template,
            LocalPlanTemplate::StreamLastTuple { .. }
        ));
    }

    fn sum_combiner() -> CombinerSpec {
        CombinerSpec {
            name: "sum".into(),
            args: vec![],
        }
    }

    #[test]
    fn plan_reduce_each_rejects_multiple_columns() {
        let planner = Planner::new();
        let err = planner
            .plan_reduce_each(
                vec![method(0)],
                vec![ColumnId(0), ColumnId(1)],
                ChunkScanMethod::AllChunks,
                AggregatorSpec {
                    name: "sum".into(),
                    args: vec![],
                    column: ColumnId(0),
                },
                sum_combiner(),
                16,
                1000,
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::BadArgument(_)));
    }

    #[test]
    fn plan_reduce_each_builds_per_partition_shard_aggregate() {
        let planner = Planner::new();
        let plan = planner
            .plan_reduce_each(
                vec![method(0), method(1)],
                vec![ColumnId(1)],
                ChunkScanMethod::AllChunks,
                AggregatorSpec {
                    name: "sum".into(),
                    args: vec![],
                    column: ColumnId(1),
                },
                sum_combiner(),
                16,
                1000,
            )
            .unwrap();
        assert_eq!(plan.shards(), vec![ShardId(0), ShardId(1)]);
        match plan.template {
            LocalPlanTemplate::ShardAggregate { cross_partition, .. } => {
                assert!(!cross_partition)
            }
            _ => panic!("expected ShardAggregate"),
        }
    }

    #[test]
    fn plan_reduce_partitions_combines_across_partitions() {
        let planner = Planner::new();
        let plan = planner
            .plan_reduce_partitions(
                vec![method(0), method(1)],
                vec![ColumnId(1)],
                ChunkScanMethod::AllChunks,
                AggregatorSpec {
                    name: "sum".into(),
                    args: vec![],
                    column: ColumnId(1),
                },
                sum_combiner(),
                16,
                1000,
            )
            .unwrap();
        match plan.template {
            LocalPlanTemplate::ShardAggregate { cross_partition, .. } => {
                assert!(cross_partition)
            }
            _ => panic!("expected ShardAggregate"),
        }
    }
}
