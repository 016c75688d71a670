//! The Validator: pure, synchronous resolution from user-facing names to resolved plan
//! pieces. Never panics; every failure is a categorized [`QueryError`].
use crate::{
    aggregate::Arg,
    error::QueryError,
    plan::{ChunkScanMethod, DataQuery, PartQuery, PartitionScanMethod},
    registry::{FunctionRegistry, ResolvedFunction},
};
use data_types::{ColumnId, Dataset, ShardMap, ShardStatus};
use sharder::Sharder;

/// Options that affect partition-to-shard resolution (a narrow slice of
/// `query_router::RouterConfig`, threaded in separately so this crate does not depend on
/// the router crate).
#[derive(Debug, Clone, Copy, Default)]
pub struct PartQueryOptions {
    pub require_all_shards: bool,
}

/// Stateless resolver from the client-facing plan vocabulary to validated, concrete pieces.
#[derive(Debug, Default)]
pub struct Validator {
    registry: FunctionRegistry,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves column names to ids, failing on the first unknown name.
    pub fn resolve_columns(
        &self,
        dataset: &Dataset,
        names: &[String],
    ) -> Result<Vec<ColumnId>, QueryError> {
        names
            .iter()
            .map(|name| {
                dataset
                    .column_id(name)
                    .ok_or_else(|| QueryError::UnknownColumn(name.clone()))
            })
            .collect()
    }

    /// Resolves an aggregator function name plus its arguments against one column.
    ///
    /// `last` additionally requires the dataset to declare a timestamp column; every other
    /// built-in is agnostic to it.
    pub fn resolve_aggregator(
        &self,
        dataset: &Dataset,
        name: &str,
        column: ColumnId,
        args: &[Arg],
    ) -> Result<ResolvedFunction, QueryError> {
        if name.eq_ignore_ascii_case("last") && dataset.timestamp_column().is_none() {
            return Err(QueryError::NoTimestampColumn);
        }
        let column_type = dataset
            .column(column)
            .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?
            .column_type;
        self.registry.resolve(name, args, column_type)
    }

    /// Resolves a combiner name plus its arguments. The combiner must be compatible with the
    /// aggregator it pairs with; callers obtain both from [`Self::resolve_aggregator`] and this
    /// method for the matched built-in set, so a mismatch can only arise from a client naming an
    /// aggregator/combiner pair that was never registered together.
    pub fn resolve_combiner(
        &self,
        dataset: &Dataset,
        name: &str,
        column: ColumnId,
        args: &[Arg],
    ) -> Result<ResolvedFunction, QueryError> {
        // Combiners share the aggregator registry: each aggregator name also names its paired
        // combiner, so resolving "sum" as a combiner yields the same pairing as
        // resolving "sum" as an aggregator.
        self.resolve_aggregator(dataset, name, column, args)
    }

    /// Resolves a [`DataQuery`] into a concrete [`ChunkScanMethod`]; time-based scans require a
    /// timestamp column.
    pub fn validate_data_query(
        &self,
        dataset: &Dataset,
        data_query: &DataQuery,
    ) -> Result<ChunkScanMethod, QueryError> {
        match data_query {
            DataQuery::AllChunks => Ok(ChunkScanMethod::AllChunks),
            DataQuery::MostRecent => {
                if dataset.timestamp_column().is_none() {
                    return Err(QueryError::NoTimestampColumn);
                }
                Ok(ChunkScanMethod::MostRecent)
            }
            DataQuery::TimeRange { start_ms, end_ms } => {
                if dataset.timestamp_column().is_none() {
                    return Err(QueryError::NoTimestampColumn);
                }
                if start_ms > end_ms {
                    return Err(QueryError::BadArgument(format!(
                        "time range start {start_ms} is after end {end_ms}"
                    )));
                }
                Ok(ChunkScanMethod::TimeRange {
                    start_ms: *start_ms,
                    end_ms: *end_ms,
                })
            }
            DataQuery::RowKeyRange { start, end } => {
                if start > end {
                    return Err(QueryError::BadArgument(format!(
                        "row key range start {start:?} is after end {end:?}"
                    )));
                }
                Ok(ChunkScanMethod::RowKeyRange {
                    start: start.clone(),
                    end: end.clone(),
                })
            }
        }
    }

    /// Resolves a [`PartQuery`] into the set of shard-pinned scan methods covering it.
    ///
    /// A partition key whose owning shard is not `Active` is silently omitted unless
    /// `options.require_all_shards`, in which case the whole call fails.
    pub fn validate_part_query(
        &self,
        shard_map: &ShardMap,
        sharder: &dyn Sharder,
        part_query: &PartQuery,
        keys: &[String],
        options: PartQueryOptions,
    ) -> Result<Vec<PartitionScanMethod>, QueryError> {
        match part_query {
            PartQuery::AllPartitions => {
                let mut methods = Vec::with_capacity(keys.len());
                for key in keys {
                    if let Some(m) = self.resolve_one_key(shard_map, sharder, key, options)? {
                        methods.push(m);
                    }
                }
                Ok(methods)
            }
            PartQuery::Keys(selected) => {
                let mut methods = Vec::with_capacity(selected.len());
                for key in selected {
                    if let Some(m) = self.resolve_one_key(shard_map, sharder, key, options)? {
                        methods.push(m);
                    }
                }
                Ok(methods)
            }
        }
    }

    fn resolve_one_key(
        &self,
        shard_map: &ShardMap,
        sharder: &dyn Sharder,
        key: &str,
        options: PartQueryOptions,
    ) -> Result<Option<PartitionScanMethod>, QueryError> {
        let shard = sharder.shard_for(key);
        if shard_map.is_active(shard) {
            Ok(Some(PartitionScanMethod::SinglePartition {
                shard,
                key: key.to_string(),
            }))
        } else if options.require_all_shards {
            let status = shard_map.status(shard).unwrap_or(ShardStatus::Unassigned);
            Err(QueryError::ShardNotActive { shard, status })
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::{Column, ColumnType, DatasetRef, NodeAddress, ShardEvent, ShardId};
    use sharder::JumpHashSharder;

    fn dataset() -> Dataset {
        Dataset::new(
            DatasetRef::new("metrics"),
            vec![
                Column {
                    name: "t".into(),
                    column_type: ColumnType::Timestamp,
                    id: ColumnId(0),
                },
                Column {
                    name: "value".into(),
                    column_type: ColumnType::Double,
                    id: ColumnId(1),
                },
            ],
            "partKey",
            "t",
            Some("t"),
        )
        .unwrap()
    }

    #[test]
    fn resolve_columns_rejects_unknown_name() {
        let v = Validator::new();
        let err = v
            .resolve_columns(&dataset(), &["nope".to_string()])
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownColumn("nope".to_string()));
    }

    #[test]
    fn resolve_aggregator_requires_timestamp_for_last() {
        let no_ts = Dataset::new(
            DatasetRef::new("no_ts"),
            vec![Column {
                name: "value".into(),
                column_type: ColumnType::Double,
                id: ColumnId(0),
            }],
            "p",
            "r",
            None,
        )
        .unwrap();
        let v = Validator::new();
        let err = v
            .resolve_aggregator(&no_ts, "last", ColumnId(0), &[])
            .unwrap_err();
        assert_eq!(err, QueryError::NoTimestampColumn);
    }

    #[test]
    fn validate_data_query_rejects_inverted_time_range() {
        let v = Validator::new();
        let err = v
            .validate_data_query(
                &dataset(),
                &DataQuery::TimeRange {
                    start_ms: 200,
                    end_ms: 100,
                },
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::BadArgument(_)));
    }

    #[test]
    fn validate_part_query_omits_inactive_shards_by_default() {
        let map = ShardMap::new();
        let sharder = JumpHashSharder::new(4);
        let v = Validator::new();
        let methods = v
            .validate_part_query(
                &map,
                &sharder,
                &PartQuery::AllPartitions,
                &["host=a".to_string()],
                PartQueryOptions::default(),
            )
            .unwrap();
        assert!(methods.is_empty());
    }

    #[test]
    fn validate_part_query_fails_when_require_all_shards() {
        let map = ShardMap::new();
        let sharder = JumpHashSharder::new(1);
        let v = Validator::new();
        let err = v
            .validate_part_query(
                &map,
                &sharder,
                &PartQuery::AllPartitions,
                &["host=a".to_string()],
                PartQueryOptions {
                    require_all_shards: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::ShardNotActive { .. }));
    }

    #[test]
    fn validate_part_query_includes_active_shards() {
        let mut map = ShardMap::new();
        let sharder = JumpHashSharder::new(1);
        let shard = sharder.shard_for("host=a");
        map.apply_event(ShardEvent::Assigned {
            shard,
            node: NodeAddress("10.0.0.1:9000".into()),
        });
        map.apply_event(ShardEvent::Activated { shard });

        let v = Validator::new();
        let methods = v
            .validate_part_query(
                &map,
                &sharder,
                &PartQuery::AllPartitions,
                &["host=a".to_string()],
                PartQueryOptions::default(),
            )
            .unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].shard(), ShardId(0));
    }
}
