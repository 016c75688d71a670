//! Process skeleton for one dataset's query coordinator: config loading, logging
//! initialization, and `QueryRouter` startup, the way `influxdb_iox`/`ioxd_querier` wire up
//! IOx's services. No network transport is implemented; [`bootstrap`] and [`CoordinatorHandle`]
//! are driven directly by in-process callers and tests.
#![warn(missing_debug_implementations)]

pub mod config;
pub mod empty_store;
pub mod logging;

use data_types::{Dataset, ShardEvent, ShardMap};
use query_engine::{QueryOptions, QueryResult};
use query_planner::{LogicalPlan, PhysicalPlan, QueryError};
use query_router::{QueryRouter, RouterConfig, RouterMessage, ShardSource, ShardSourceError};
use sharder::{JumpHashSharder, Sharder};
use shard_executor::ColumnStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Errors that can prevent a `QueryRouter` from ever reaching `Ready`.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cluster membership source error: {0}")]
    ShardSource(#[from] ShardSourceError),
    #[error("no seeds observed within the cluster membership timeout")]
    BootstrapTimeout,
}

/// Width of the router's mailbox channel. Matches the default scatter parallelism: a coordinator
/// that isn't keeping up with its own queue depth needs more parallelism or shards, not a bigger
/// buffer.
const MAILBOX_CAPACITY: usize = 256;

/// A running `QueryRouter`'s externally-visible handle: the mailbox sender client code submits
/// queries through, plus the shutdown token that tears the whole thing down.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<RouterMessage>,
    shutdown: CancellationToken,
}

impl CoordinatorHandle {
    /// Runs `plan` through the full Validator -> Planner -> Engine pipeline.
    pub async fn query_logical_plan(
        &self,
        plan: LogicalPlan,
        options: Option<QueryOptions>,
    ) -> Result<QueryResult, QueryError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterMessage::LogicalPlanQuery { plan, options, reply })
            .await?;
        match rx.await {
            Ok(Ok((_, result))) => Ok(result),
            Ok(Err((_, err))) => Err(err),
            Err(_) => Err(QueryError::InternalError("router dropped the reply channel".into())),
        }
    }

    /// Runs an already-compiled `physical_plan`, skipping validation.
    pub async fn query_physical_plan(
        &self,
        physical_plan: PhysicalPlan,
        options: Option<QueryOptions>,
    ) -> Result<QueryResult, QueryError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterMessage::ExecPlanQuery { physical_plan, options, reply })
            .await?;
        match rx.await {
            Ok(Ok((_, result))) => Ok(result),
            Ok(Err((_, err))) => Err(err),
            Err(_) => Err(QueryError::InternalError("router dropped the reply channel".into())),
        }
    }

    /// The index (tag-like) columns available, most-cardinality calls can still pass a `limit`.
    pub async fn get_index_names(&self, limit: usize) -> Result<Vec<(String, usize)>, QueryError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterMessage::GetIndexNames { limit, reply }).await?;
        rx.await.map_err(|_| QueryError::InternalError("router dropped the reply channel".into()))?
    }

    /// Requests router shutdown: the mailbox loop exits once the shutdown token fires, allowing
    /// in-flight spawned query work to keep running to completion.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, message: RouterMessage) -> Result<(), QueryError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| QueryError::InternalError("router mailbox closed".into()))
    }
}

/// Builds an initial [`ShardMap`] out of a cluster-membership seed list.
///
/// Turning seed addresses into shard assignments is properly cluster membership's job, which is
/// out of scope here; this assigns seeds to shards `0..seeds.len()` in order, good enough to
/// bring a freshly bootstrapped router out of `Initializing`. A real deployment's membership
/// service would instead push a `CurrentShardSnapshot` reflecting its own placement decisions.
fn initial_shard_map(seeds: &[data_types::NodeAddress]) -> ShardMap {
    let mut map = ShardMap::new();
    for (i, node) in seeds.iter().enumerate() {
        let shard = data_types::ShardId(i as u32);
        map.apply_event(ShardEvent::Assigned { shard, node: node.clone() });
        map.apply_event(ShardEvent::Activated { shard });
    }
    map
}

/// Bootstraps one dataset's `QueryRouter`: waits for cluster membership seeds (bounded by
/// `config.cluster_membership_timeout_secs`), primes the router's `ShardMap`, spawns the
/// mailbox loop and a background task forwarding subsequent `ShardEvent`s, and returns a handle
/// to submit queries through.
pub async fn bootstrap<S: ColumnStore + 'static>(
    dataset: Dataset,
    config: RouterConfig,
    num_shards: u32,
    store: S,
    shard_source: Arc<dyn ShardSource>,
) -> Result<CoordinatorHandle, BootstrapError> {
    let seeds = tokio::time::timeout(
        Duration::from_secs(config.cluster_membership_timeout_secs),
        shard_source.seeds(),
    )
    .await
    .map_err(|_| BootstrapError::BootstrapTimeout)??;

    let sharder: Box<dyn Sharder> = Box::new(JumpHashSharder::new(num_shards.max(1)));
    let router = QueryRouter::new(dataset, sharder, config, store);
    let shutdown = router.shutdown_token();

    let (sender, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
    sender
        .send(RouterMessage::CurrentShardSnapshot { map: initial_shard_map(&seeds) })
        .await
        .expect("mailbox just created, receiver not yet dropped");

    tokio::spawn(router.run(mailbox));
    tokio::spawn(forward_membership_events(
        Arc::clone(&shard_source),
        sender.clone(),
        shutdown.clone(),
    ));

    Ok(CoordinatorHandle { sender, shutdown })
}

/// Relays the membership source's live `ShardEvent` stream into the router mailbox until
/// shutdown fires or the stream ends.
async fn forward_membership_events(
    shard_source: Arc<dyn ShardSource>,
    sender: mpsc::Sender<RouterMessage>,
    shutdown: CancellationToken,
) {
    use futures::StreamExt;

    let mut events = match shard_source.subscribe().await {
        Ok(events) => events,
        Err(error) => {
            observability_deps::tracing::error!(%error, "cluster membership subscription failed");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = events.next() => {
                match event {
                    Some(event) => {
                        if sender.send(RouterMessage::ShardEvent { event }).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}
