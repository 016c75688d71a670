//! The Engine: scatter/gather execution of one `PhysicalPlan`.
use crate::dispatch::{ShardDispatcher, ShardOutcome};
use backoff::{Backoff, BackoffConfig};
use data_types::ShardId;
use observability_deps::tracing::{error, warn};
use query_planner::{
    AggregateValue, ColumnValue, CombineMode, FunctionRegistry, LocalPlanTemplate,
    PartitionScanMethod, PhysicalPlan, QueryError,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracker::ConcurrencyLimiter;

/// The maximum number of attempts (initial + retries) the Engine makes against one shard before
/// giving up.
const MAX_ATTEMPTS: u32 = 3;

/// What `Engine::execute` produces, before `ResultCodec` packs it into the client-facing wire
/// shape.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    /// Rules 1, 2, and rule 3 (`ReduceEach` with no wrapping `ReducePartitions`): one row per
    /// partition, in (shard asc, within-shard submission) order.
    Rows(Vec<Vec<ColumnValue>>),
    /// Rule 4 (`ReducePartitions`): every partition's value folded into one.
    Aggregate(AggregateValue),
}

/// Drives scatter/gather over a compiled [`PhysicalPlan`] against a [`ShardDispatcher`].
#[derive(Debug)]
pub struct Engine<D> {
    dispatcher: Arc<D>,
    registry: FunctionRegistry,
}

impl<D: ShardDispatcher + 'static> Engine<D> {
    pub fn new(dispatcher: Arc<D>) -> Self {
        Self {
            dispatcher,
            registry: FunctionRegistry,
        }
    }

    /// Executes `plan`, racing it against `deadline` and honoring `cancellation`. On
    /// timeout, cancels every in-flight shard request and returns `QueryError::Timeout`.
    pub async fn execute(
        &self,
        plan: PhysicalPlan,
        deadline: std::time::Duration,
        cancellation: CancellationToken,
    ) -> Result<EngineOutput, QueryError> {
        match tokio::time::timeout(deadline, self.execute_inner(plan, cancellation.clone())).await
        {
            Ok(result) => result,
            Err(_) => {
                cancellation.cancel();
                Err(QueryError::Timeout)
            }
        }
    }

    async fn execute_inner(
        &self,
        plan: PhysicalPlan,
        cancellation: CancellationToken,
    ) -> Result<EngineOutput, QueryError> {
        let shards = plan.shards();
        let limiter = ConcurrencyLimiter::new(plan.parallelism.max(1));
        let mut tasks = Vec::with_capacity(shards.len());

        for shard in shards {
            let part_methods: Vec<PartitionScanMethod> = plan
                .part_methods
                .iter()
                .filter(|m| m.shard() == shard)
                .cloned()
                .collect();
            let template = plan.template.clone();
            let dispatcher = Arc::clone(&self.dispatcher);
            let limiter = limiter.clone();
            let token = cancellation.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                dispatch_with_retry(dispatcher.as_ref(), shard, part_methods, template, token)
                    .await
                    .map(|outcome| (shard, outcome))
            }));
        }

        let mut by_shard: Vec<(ShardId, ShardOutcome)> = Vec::with_capacity(tasks.len());
        for task in tasks {
            let joined = task
                .await
                .map_err(|e| QueryError::InternalError(format!("shard task panicked: {e}")))?;
            match joined {
                Ok(pair) => by_shard.push(pair),
                Err(e) => {
                    // Propagate the first error seen and cancel the rest.
                    cancellation.cancel();
                    return Err(e);
                }
            }
        }
        by_shard.sort_by_key(|(shard, _)| *shard);

        self.assemble(&plan, by_shard)
    }

    fn assemble(
        &self,
        plan: &PhysicalPlan,
        by_shard: Vec<(ShardId, ShardOutcome)>,
    ) -> Result<EngineOutput, QueryError> {
        match &plan.template {
            LocalPlanTemplate::StreamLastTuple { .. } | LocalPlanTemplate::LocalVectorReader { .. } => {
                let mut rows = Vec::new();
                for (_, outcome) in by_shard {
                    match outcome {
                        ShardOutcome::Rows(r) => rows.extend(r),
                        ShardOutcome::Aggregate(_) => {
                            return Err(QueryError::InternalError(
                                "shard returned an aggregate for a row-shaped plan".into(),
                            ))
                        }
                    }
                }
                rows.truncate(plan.item_limit);
                Ok(EngineOutput::Rows(rows))
            }
            LocalPlanTemplate::ShardAggregate {
                combiner,
                cross_partition,
                ..
            } => {
                // Every shard, whether rule 3 or rule 4, folds its own partitions down to one
                // raw (possibly unfinished, e.g. `avg`'s pair) partial aggregate. The
                // combiner resolved here both `finish()`es those partials and, for rule 4,
                // folds them together across shards.
                let resolved = self.registry.resolve(
                    &combiner.name,
                    &combiner.args,
                    data_types::ColumnType::Double,
                )?;
                let mut values = Vec::with_capacity(by_shard.len());
                for (shard, outcome) in by_shard {
                    match outcome {
                        ShardOutcome::Aggregate(v) => values.push((shard, v)),
                        ShardOutcome::Rows(_) => {
                            return Err(QueryError::InternalError(
                                "shard returned rows for an aggregate plan".into(),
                            ))
                        }
                    }
                }

                if *cross_partition {
                    let combined = fold_values(resolved.combiner.as_ref(), values)?;
                    Ok(EngineOutput::Aggregate(resolved.combiner.finish(combined)))
                } else {
                    // Rule 3: no cross-shard fold, just one finished value per shard.
                    let mut finished = Vec::with_capacity(values.len());
                    for (_, v) in values {
                        match resolved.combiner.finish(v) {
                            AggregateValue::Scalar(c) => finished.push(c),
                            other => {
                                return Err(QueryError::InternalError(format!(
                                    "ReduceEach without ReducePartitions only supports \
                                     scalar-producing aggregators, got {other:?}"
                                )))
                            }
                        }
                    }
                    finished.truncate(plan.item_limit);
                    Ok(EngineOutput::Aggregate(AggregateValue::Vector(finished)))
                }
            }
        }
    }
}

/// Folds the per-shard aggregates, seeded with the combiner's identity, using the combiner's
/// declared mode: associative+commutative combiners fold in any order (shard-ascending here is
/// incidental); [`CombineMode::Ordered`] combiners require shard order, which `execute_inner`'s
/// sort by shard id guarantees and is asserted below rather than merely assumed.
fn fold_values(
    combiner: &dyn query_planner::Combiner,
    values: Vec<(ShardId, AggregateValue)>,
) -> Result<AggregateValue, QueryError> {
    if values.is_empty() {
        return Err(QueryError::InternalError(
            "no shard produced a value to combine".into(),
        ));
    }
    if combiner.mode() == CombineMode::Ordered {
        debug_assert!(
            values.windows(2).all(|w| w[0].0 < w[1].0),
            "an Ordered combiner requires shard-ascending input, got {:?}",
            values.iter().map(|(shard, _)| *shard).collect::<Vec<_>>()
        );
    }
    let mut acc = combiner.zero();
    for (_, next) in values {
        acc = combiner.combine(acc, next);
    }
    Ok(acc)
}

/// Dispatches to `shard`, retrying transient failures with an exponential-backoff helper.
/// `backoff::Backoff::retry_with_backoff` loops until the closure returns
/// `ControlFlow::Break`; the closure itself enforces the `MAX_ATTEMPTS` bound so a persistently
/// unavailable shard still gives up rather than retrying forever.
async fn dispatch_with_retry<D: ShardDispatcher + ?Sized>(
    dispatcher: &D,
    shard: ShardId,
    part_methods: Vec<PartitionScanMethod>,
    template: LocalPlanTemplate,
    cancellation: CancellationToken,
) -> Result<ShardOutcome, QueryError> {
    let mut backoff = Backoff::new(&BackoffConfig::default());
    let mut attempt = 0u32;
    let task_name = format!("shard-dispatch-{shard}");

    let outcome = backoff
        .retry_with_backoff(&task_name, || {
            attempt += 1;
            let part_methods = part_methods.clone();
            let template = template.clone();
            let cancellation = cancellation.clone();
            async move {
                if cancellation.is_cancelled() {
                    return ControlFlow::Break(Err(QueryError::Timeout));
                }
                match dispatcher
                    .dispatch(shard, part_methods, template, cancellation)
                    .await
                {
                    Ok(outcome) => ControlFlow::Break(Ok(outcome)),
                    Err(e) if e.is_retriable() && attempt < MAX_ATTEMPTS => {
                        warn!(%shard, %e, attempt, "shard request failed, retrying");
                        ControlFlow::Continue(e)
                    }
                    Err(e) => {
                        if e.is_retriable() {
                            error!(%shard, %e, attempt, "shard request exhausted retries");
                        }
                        ControlFlow::Break(Err(e))
                    }
                }
            }
        })
        .await
        .expect("retry_with_backoff never gives up on its own");

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use query_planner::{AggregatorSpec, ChunkScanMethod, CombinerSpec};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Keyed by shard rather than call order: shards dispatch concurrently, so a FIFO queue
    /// would make which shard gets which canned response nondeterministic.
    #[derive(Debug)]
    struct FakeDispatcher {
        calls: AtomicUsize,
        responses: Mutex<HashMap<ShardId, Result<ShardOutcome, QueryError>>>,
    }

    impl FakeDispatcher {
        fn new(responses: Vec<(ShardId, Result<ShardOutcome, QueryError>)>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl ShardDispatcher for FakeDispatcher {
        async fn dispatch(
            &self,
            shard: ShardId,
            _part_methods: Vec<PartitionScanMethod>,
            _template: LocalPlanTemplate,
            _cancellation: CancellationToken,
        ) -> Result<ShardOutcome, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .remove(&shard)
                .expect("no canned response for shard")
        }
    }

    fn method(shard: u32) -> PartitionScanMethod {
        PartitionScanMethod::SinglePartition {
            shard: ShardId(shard),
            key: format!("p{shard}"),
        }
    }

    #[tokio::test]
    async fn gathers_rows_in_shard_order() {
        let dispatcher = Arc::new(FakeDispatcher::new(vec![
            (
                ShardId(1),
                Ok(ShardOutcome::Rows(vec![vec![ColumnValue::Double(2.0)]])),
            ),
            (
                ShardId(0),
                Ok(ShardOutcome::Rows(vec![vec![ColumnValue::Double(1.0)]])),
            ),
        ]));
        let engine = Engine::new(dispatcher);
        let plan = PhysicalPlan {
            part_methods: vec![method(1), method(0)],
            parallelism: 4,
            item_limit: 100,
            template: LocalPlanTemplate::LocalVectorReader {
                columns: vec![data_types::ColumnId(0)],
                chunk_scan: ChunkScanMethod::AllChunks,
            },
        };
        let out = engine
            .execute(
                plan,
                std::time::Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        match out {
            EngineOutput::Rows(rows) => assert_eq!(rows.len(), 2),
            _ => panic!("expected rows"),
        }
    }

    #[tokio::test]
    async fn combines_aggregates_across_shards() {
        let dispatcher = Arc::new(FakeDispatcher::new(vec![
            (
                ShardId(0),
                Ok(ShardOutcome::Aggregate(AggregateValue::Scalar(
                    ColumnValue::Double(1.0),
                ))),
            ),
            (
                ShardId(1),
                Ok(ShardOutcome::Aggregate(AggregateValue::Scalar(
                    ColumnValue::Double(2.0),
                ))),
            ),
        ]));
        let engine = Engine::new(dispatcher);
        let plan = PhysicalPlan {
            part_methods: vec![method(0), method(1)],
            parallelism: 4,
            item_limit: 100,
            template: LocalPlanTemplate::ShardAggregate {
                column: data_types::ColumnId(0),
                chunk_scan: ChunkScanMethod::AllChunks,
                aggregator: AggregatorSpec {
                    name: "sum".into(),
                    args: vec![],
                    column: data_types::ColumnId(0),
                },
                combiner: CombinerSpec {
                    name: "sum".into(),
                    args: vec![],
                },
                cross_partition: true,
            },
        };
        let out = engine
            .execute(
                plan,
                std::time::Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            EngineOutput::Aggregate(AggregateValue::Scalar(ColumnValue::Double(3.0)))
        );
    }

    #[tokio::test]
    async fn reduce_each_without_reduce_partitions_keeps_one_value_per_shard() {
        let dispatcher = Arc::new(FakeDispatcher::new(vec![
            (
                ShardId(0),
                Ok(ShardOutcome::Aggregate(AggregateValue::Pair(10.0, 2.0))),
            ),
            (
                ShardId(1),
                Ok(ShardOutcome::Aggregate(AggregateValue::Pair(9.0, 3.0))),
            ),
        ]));
        let engine = Engine::new(dispatcher);
        let plan = PhysicalPlan {
            part_methods: vec![method(0), method(1)],
            parallelism: 4,
            item_limit: 100,
            template: LocalPlanTemplate::ShardAggregate {
                column: data_types::ColumnId(0),
                chunk_scan: ChunkScanMethod::AllChunks,
                aggregator: AggregatorSpec {
                    name: "avg".into(),
                    args: vec![],
                    column: data_types::ColumnId(0),
                },
                combiner: CombinerSpec {
                    name: "avg".into(),
                    args: vec![],
                },
                cross_partition: false,
            },
        };
        let out = engine
            .execute(
                plan,
                std::time::Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            EngineOutput::Aggregate(AggregateValue::Vector(vec![
                ColumnValue::Double(5.0),
                ColumnValue::Double(3.0),
            ]))
        );
    }

    #[tokio::test]
    async fn timeout_cancels_and_surfaces_timeout_error() {
        #[derive(Debug)]
        struct HangingDispatcher;

        #[async_trait]
        impl ShardDispatcher for HangingDispatcher {
            async fn dispatch(
                &self,
                _shard: ShardId,
                _part_methods: Vec<PartitionScanMethod>,
                _template: LocalPlanTemplate,
                cancellation: CancellationToken,
            ) -> Result<ShardOutcome, QueryError> {
                cancellation.cancelled().await;
                Err(QueryError::Timeout)
            }
        }

        let engine = Engine::new(Arc::new(HangingDispatcher));
        let plan = PhysicalPlan {
            part_methods: vec![method(0)],
            parallelism: 4,
            item_limit: 100,
            template: LocalPlanTemplate::LocalVectorReader {
                columns: vec![data_types::ColumnId(0)],
                chunk_scan: ChunkScanMethod::AllChunks,
            },
        };
        let err = engine
            .execute(
                plan,
                std::time::Duration::from_millis(20),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::Timeout);
    }
}
