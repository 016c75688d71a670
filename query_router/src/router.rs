//! The `QueryRouter` actor: a single serial message handler per dataset.
//!
//! The router's own loop never suspends on query execution — it enqueues the validate/plan/
//! execute pipeline onto the shared async runtime (the "execution pool") and moves on to the
//! next mailbox message, replying through that message's own channel once the spawned work
//! completes. Only `ShardMap` mutation (`CurrentShardSnapshot`, `ShardEvent`) runs inline, since
//! it is synchronous and must observe/advance revision order exactly as messages arrive.
//!
//! Compiling a `LogicalPlan` is usually cheap enough to run inline too, but `PartQuery::
//! AllPartitions` needs a store round trip to enumerate the key universe (`resolve_part_query`
//! below), so the whole Validator → Planner pipeline moves into the same spawned task as the
//! Engine run rather than splitting "cheap" and "I/O-bound" compilation across two places.
use crate::{
    config::RouterConfig,
    dispatcher::LocalDispatcher,
    messages::{QueryReply, RouterMessage},
};
use data_types::{Dataset, QueryId, QueryIdGenerator, ShardId, ShardMap};
use observability_deps::tracing::info;
use query_engine::{Engine, EngineOutput, QueryOptions, ResultCodec};
use query_planner::{
    AggregatorSpec, Cardinality, ChunkScanMethod, CombinerSpec, DataQuery, LogicalPlan, PartQuery,
    PartQueryOptions, PartitionScanMethod, Planner, PhysicalPlan, QueryError, ResultClass,
    Validator,
};
use sharder::Sharder;
use shard_executor::ColumnStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use trace::Trace;
use tracker::QueryCancellation;

/// Lifecycle state of one dataset's router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// No `ShardMap` yet; queries fail with `ClusterNotReady`.
    Initializing,
    Ready,
    /// Accepts no new queries; in-flight work is allowed to complete.
    Draining,
    Stopped,
}

/// What a compiled query needs beyond the `PhysicalPlan` itself to encode its result.
enum Compiled {
    Rows {
        column_names: Vec<String>,
        physical: PhysicalPlan,
    },
    Aggregate {
        result_class: ResultClass,
        cardinality: Cardinality,
        physical: PhysicalPlan,
    },
}

/// A single serial message handler for one dataset.
pub struct QueryRouter<S> {
    dataset: Arc<Dataset>,
    sharder: Arc<dyn Sharder>,
    shard_map: ShardMap,
    config: RouterConfig,
    engine: Arc<Engine<LocalDispatcher<Arc<S>>>>,
    store: Arc<S>,
    ids: QueryIdGenerator,
    state: RouterState,
    shutdown: CancellationToken,
}

impl<S: ColumnStore + 'static> QueryRouter<S> {
    pub fn new(dataset: Dataset, sharder: Box<dyn Sharder>, config: RouterConfig, store: S) -> Self {
        let store = Arc::new(store);
        let dispatcher = Arc::new(LocalDispatcher::new(Arc::clone(&store)));
        Self {
            dataset: Arc::new(dataset),
            sharder: Arc::from(sharder),
            shard_map: ShardMap::new(),
            config,
            engine: Arc::new(Engine::new(dispatcher)),
            store,
            ids: QueryIdGenerator::new(),
            state: RouterState::Initializing,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Requests the router stop accepting new queries once in-flight work drains. The mailbox
    /// loop still processes `ShardMap` mutations while draining.
    pub fn begin_draining(&mut self) {
        if self.state == RouterState::Ready {
            self.state = RouterState::Draining;
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Drives the mailbox until `shutdown` fires or the channel closes.
    pub async fn run(mut self, mut mailbox: mpsc::Receiver<RouterMessage>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.state = RouterState::Stopped;
                    info!("router shutting down");
                    return;
                }
                message = mailbox.recv() => {
                    match message {
                        Some(message) => self.handle(message),
                        None => {
                            self.state = RouterState::Stopped;
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle(&mut self, message: RouterMessage) {
        match message {
            RouterMessage::LogicalPlanQuery { plan, options, reply } => {
                self.spawn_logical_plan_query(plan, options, reply)
            }
            RouterMessage::ExecPlanQuery {
                physical_plan,
                options,
                reply,
            } => self.spawn_exec_plan_query(physical_plan, options, reply),
            RouterMessage::SingleShardQuery {
                shard: _,
                part_methods,
                template,
                reply,
            } => self.spawn_single_shard_query(part_methods, template, reply),
            RouterMessage::GetIndexNames { limit, reply } => self.spawn_get_index_names(limit, reply),
            RouterMessage::GetIndexValues {
                shard,
                index,
                limit,
                reply,
            } => self.spawn_get_index_values(shard, index, limit, reply),
            RouterMessage::CurrentShardSnapshot { map } => {
                let replaced = self.shard_map.replace_if_newer(map);
                if replaced && self.state == RouterState::Initializing {
                    self.state = RouterState::Ready;
                    info!(revision = self.shard_map.revision(), "router ready");
                }
            }
            RouterMessage::ShardEvent { event } => {
                self.shard_map.apply_event(event);
            }
        }
    }

    fn spawn_logical_plan_query(
        &self,
        plan: LogicalPlan,
        options: Option<QueryOptions>,
        reply: oneshot::Sender<QueryReply>,
    ) {
        let id = self.ids.next();
        if self.state == RouterState::Initializing {
            let _ = reply.send(Err((id, QueryError::ClusterNotReady)));
            return;
        }
        let options = options.unwrap_or_else(|| self.config.default_query_options());
        let dataset = Arc::clone(&self.dataset);
        let sharder = Arc::clone(&self.sharder);
        let shard_map = self.shard_map.clone();
        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);
        let cancellation = QueryCancellation::child_of(&self.shutdown);
        let trace = Trace::start("LogicalPlanQuery");

        tokio::spawn(async move {
            let outcome = async {
                let compiled =
                    compile(&dataset, sharder.as_ref(), &shard_map, store.as_ref(), &plan, &options)
                        .await?;
                run_compiled(&engine, compiled, &options, cancellation.token()).await
            }
            .await;
            cancellation.close_trace(trace, outcome.is_ok());
            let _ = reply.send(match outcome {
                Ok(result) => Ok((id, result)),
                Err(e) => Err((id, e)),
            });
        });
    }

    fn spawn_exec_plan_query(
        &self,
        physical_plan: PhysicalPlan,
        options: Option<QueryOptions>,
        reply: oneshot::Sender<QueryReply>,
    ) {
        let id = self.ids.next();
        if self.state == RouterState::Initializing {
            let _ = reply.send(Err((id, QueryError::ClusterNotReady)));
            return;
        }
        let options = options.unwrap_or_else(|| self.config.default_query_options());
        let engine = Arc::clone(&self.engine);
        let cancellation = QueryCancellation::child_of(&self.shutdown);
        let trace = Trace::start("ExecPlanQuery");
        tokio::spawn(async move {
            // `ExecPlanQuery` skips validation, so there is no column-name/result-class metadata
            // to encode with; an unlabeled vector is the best this entry point can do.
            let compiled = Compiled::Rows {
                column_names: Vec::new(),
                physical: physical_plan,
            };
            let outcome = run_compiled(&engine, compiled, &options, cancellation.token()).await;
            cancellation.close_trace(trace, outcome.is_ok());
            let _ = reply.send(match outcome {
                Ok(result) => Ok((id, result)),
                Err(e) => Err((id, e)),
            });
        });
    }

    fn spawn_single_shard_query(
        &self,
        part_methods: Vec<PartitionScanMethod>,
        template: query_planner::LocalPlanTemplate,
        reply: oneshot::Sender<Result<query_planner::AggregateValue, QueryError>>,
    ) {
        let store = Arc::clone(&self.store);
        let cancellation = QueryCancellation::child_of(&self.shutdown);
        tokio::spawn(async move {
            let executor = shard_executor::ShardExecutor::new(store);
            let token = cancellation.token();
            let result = executor
                .execute(&part_methods, &template, usize::MAX, &token)
                .await
                .and_then(|r| match r {
                    shard_executor::ShardResult::Aggregate(v) => Ok(v),
                    shard_executor::ShardResult::Rows(_) => Err(QueryError::InternalError(
                        "SingleShardQuery against a row-shaped template".into(),
                    )),
                });
            let _ = reply.send(result);
        });
    }

    fn spawn_get_index_names(
        &self,
        limit: usize,
        reply: oneshot::Sender<Result<Vec<(String, usize)>, QueryError>>,
    ) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let result = store.index_names().await.map(|mut names| {
                names.truncate(limit);
                names
            });
            let _ = reply.send(result);
        });
    }

    fn spawn_get_index_values(
        &self,
        shard: ShardId,
        index: String,
        limit: usize,
        reply: oneshot::Sender<Result<Vec<String>, QueryError>>,
    ) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let result = store.index_values(shard, &index).await.map(|mut values| {
                values.truncate(limit);
                values
            });
            let _ = reply.send(result);
        });
    }
}

/// Runs an already-compiled plan through the Engine and packs its output with a fresh
/// [`ResultCodec`].
async fn run_compiled<S: ColumnStore + 'static>(
    engine: &Engine<LocalDispatcher<Arc<S>>>,
    compiled: Compiled,
    options: &QueryOptions,
    cancellation: CancellationToken,
) -> Result<query_engine::QueryResult, QueryError> {
    let codec = ResultCodec::new();
    let deadline = options.timeout();
    let result = match compiled {
        Compiled::Rows { column_names, physical } => {
            let output = engine.execute(physical, deadline, cancellation).await?;
            match output {
                EngineOutput::Rows(rows) => codec.encode_rows(&column_names, rows),
                EngineOutput::Aggregate(_) => {
                    return Err(QueryError::InternalError(
                        "row-shaped plan produced an aggregate".into(),
                    ))
                }
            }
        }
        Compiled::Aggregate {
            result_class,
            cardinality,
            physical,
        } => {
            let output = engine.execute(physical, deadline, cancellation).await?;
            match output {
                EngineOutput::Aggregate(value) => codec.encode_aggregate(result_class, cardinality, value),
                EngineOutput::Rows(_) => {
                    return Err(QueryError::InternalError("aggregate plan produced rows".into()))
                }
            }
        }
    };
    codec.maybe_self_check(options.test_query_serialization, &result);
    Ok(result)
}

/// Validator → Planner, run off the mailbox thread because `PartQuery::
/// AllPartitions` may need a store round trip (see module docs).
async fn compile<S: ColumnStore>(
    dataset: &Dataset,
    sharder: &dyn Sharder,
    shard_map: &ShardMap,
    store: &S,
    plan: &LogicalPlan,
    options: &QueryOptions,
) -> Result<Compiled, QueryError> {
    let validator = Validator::new();
    let planner = Planner::new();
    let part_query_options = PartQueryOptions {
        require_all_shards: options.require_all_shards,
    };

    match plan {
        LogicalPlan::PartitionsInstant { part_query, columns } => {
            let column_ids = validator.resolve_columns(dataset, columns)?;
            let part_methods = resolve_part_query(
                dataset, sharder, shard_map, store, &validator, part_query, part_query_options,
            )
            .await?;
            let physical =
                planner.plan_partitions_instant(part_methods, column_ids, options.parallelism, options.item_limit);
            Ok(Compiled::Rows {
                column_names: columns.clone(),
                physical,
            })
        }
        LogicalPlan::PartitionsRange {
            part_query,
            data_query,
            columns,
        } => {
            let column_ids = validator.resolve_columns(dataset, columns)?;
            let chunk_scan = validator.validate_data_query(dataset, data_query)?;
            let part_methods = resolve_part_query(
                dataset, sharder, shard_map, store, &validator, part_query, part_query_options,
            )
            .await?;
            let physical = planner.plan_partitions_range(
                part_methods,
                column_ids,
                chunk_scan,
                options.parallelism,
                options.item_limit,
            );
            Ok(Compiled::Rows {
                column_names: columns.clone(),
                physical,
            })
        }
        LogicalPlan::ReduceEach { agg_func, agg_args, child } => match child.as_ref() {
            LogicalPlan::PartitionsRange {
                part_query,
                data_query,
                columns,
            } => {
                let (physical, aggregator) = compile_shard_aggregate(
                    dataset, sharder, shard_map, store, &validator, &planner, part_query, data_query,
                    columns, agg_func, agg_args, agg_func, agg_args, part_query_options, options, false,
                )
                .await?;
                let shards = physical.shards().len().max(1);
                Ok(Compiled::Aggregate {
                    result_class: aggregator.aggregator.result_class(),
                    cardinality: Cardinality::N(shards),
                    physical,
                })
            }
            _ => Err(planner.reject_unsupported(plan)),
        },
        LogicalPlan::ReducePartitions {
            comb_func,
            comb_args,
            child,
        } => match child.as_ref() {
            LogicalPlan::ReduceEach { agg_func, agg_args, child: inner } => match inner.as_ref() {
                LogicalPlan::PartitionsRange {
                    part_query,
                    data_query,
                    columns,
                } => {
                    let (physical, aggregator) = compile_shard_aggregate(
                        dataset, sharder, shard_map, store, &validator, &planner, part_query,
                        data_query, columns, agg_func, agg_args, comb_func, comb_args,
                        part_query_options, options, true,
                    )
                    .await?;
                    Ok(Compiled::Aggregate {
                        result_class: aggregator.aggregator.result_class(),
                        cardinality: aggregator.aggregator.cardinality(),
                        physical,
                    })
                }
                _ => Err(planner.reject_unsupported(plan)),
            },
            _ => Err(planner.reject_unsupported(plan)),
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn compile_shard_aggregate<S: ColumnStore>(
    dataset: &Dataset,
    sharder: &dyn Sharder,
    shard_map: &ShardMap,
    store: &S,
    validator: &Validator,
    planner: &Planner,
    part_query: &PartQuery,
    data_query: &DataQuery,
    columns: &[String],
    agg_func: &str,
    agg_args: &[query_planner::Arg],
    comb_func: &str,
    comb_args: &[query_planner::Arg],
    part_query_options: PartQueryOptions,
    options: &QueryOptions,
    cross_partition: bool,
) -> Result<(PhysicalPlan, query_planner::ResolvedFunction), QueryError> {
    if columns.len() != 1 {
        return Err(QueryError::BadArgument(format!(
            "Only one column should be specified, but got {}",
            columns.len()
        )));
    }
    let column_id = validator.resolve_columns(dataset, columns)?[0];
    let chunk_scan: ChunkScanMethod = validator.validate_data_query(dataset, data_query)?;
    let part_methods =
        resolve_part_query(dataset, sharder, shard_map, store, validator, part_query, part_query_options).await?;
    let aggregator = validator.resolve_aggregator(dataset, agg_func, column_id, agg_args)?;
    if cross_partition {
        // Rule 4 names its combiner separately from its aggregator; validate it resolves to a
        // real registered function before it ever reaches the Engine's assembly stage.
        validator.resolve_combiner(dataset, comb_func, column_id, comb_args)?;
    }

    let physical = if cross_partition {
        planner.plan_reduce_partitions(
            part_methods,
            vec![column_id],
            chunk_scan,
            AggregatorSpec {
                name: agg_func.to_string(),
                args: agg_args.to_vec(),
                column: column_id,
            },
            CombinerSpec {
                name: comb_func.to_string(),
                args: comb_args.to_vec(),
            },
            options.parallelism,
            options.item_limit,
        )?
    } else {
        planner.plan_reduce_each(
            part_methods,
            vec![column_id],
            chunk_scan,
            AggregatorSpec {
                name: agg_func.to_string(),
                args: agg_args.to_vec(),
                column: column_id,
            },
            CombinerSpec {
                name: agg_func.to_string(),
                args: agg_args.to_vec(),
            },
            options.parallelism,
            options.item_limit,
        )?
    };
    Ok((physical, aggregator))
}

/// Resolves a [`PartQuery`] into shard-pinned scan methods. `Keys` carries its own key list;
/// `AllPartitions` carries none, so the full key universe is fetched from the store first by
/// enumerating the dataset's partition-key index across every currently active shard.
async fn resolve_part_query<S: ColumnStore>(
    dataset: &Dataset,
    sharder: &dyn Sharder,
    shard_map: &ShardMap,
    store: &S,
    validator: &Validator,
    part_query: &PartQuery,
    options: PartQueryOptions,
) -> Result<Vec<PartitionScanMethod>, QueryError> {
    match part_query {
        PartQuery::Keys(selected) => {
            validator.validate_part_query(shard_map, sharder, part_query, selected, options)
        }
        PartQuery::AllPartitions => {
            let keys = all_partition_keys(dataset, shard_map, store).await?;
            validator.validate_part_query(shard_map, sharder, part_query, &keys, options)
        }
    }
}

/// The dataset's full partition-key universe, merged across every active shard's index.
async fn all_partition_keys<S: ColumnStore>(
    dataset: &Dataset,
    shard_map: &ShardMap,
    store: &S,
) -> Result<Vec<String>, QueryError> {
    let mut keys = HashSet::new();
    for shard in shard_map.active_shards() {
        for key in store.index_values(shard, dataset.partition_key()).await? {
            keys.insert(key);
        }
    }
    Ok(keys.into_iter().collect())
}
