//! The router's collaborator seam into cluster membership (consumed interface).
use async_trait::async_trait;
use data_types::{NodeAddress, ShardEvent};
use futures::stream::BoxStream;
use observability_deps::tracing::info;

/// Errors reaching or parsing the cluster-membership service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShardSourceError {
    #[error("no seeds responded within the bootstrap timeout")]
    BootstrapTimeout,
    #[error("membership source error: {0}")]
    Other(String),
}

/// Seeds the router's initial `ShardMap` and streams subsequent `ShardEvent`s.
#[async_trait]
pub trait ShardSource: std::fmt::Debug + Send + Sync {
    /// The cluster's current member addresses, sorted lexicographically. Empty if no cluster
    /// has formed yet.
    async fn seeds(&self) -> Result<Vec<NodeAddress>, ShardSourceError>;

    /// A live stream of `ShardEvent`s and periodic full-snapshot refreshes.
    async fn subscribe(&self) -> Result<BoxStream<'static, ShardEvent>, ShardSourceError>;
}

/// A fixed, in-memory `ShardSource` for tests: `seeds()` returns a canned list, `subscribe()`
/// replays a canned event sequence once and then stays open with no further events.
#[derive(Debug, Clone)]
pub struct StaticShardSource {
    seeds: Vec<NodeAddress>,
    events: Vec<ShardEvent>,
}

impl StaticShardSource {
    pub fn new(seeds: Vec<NodeAddress>, events: Vec<ShardEvent>) -> Self {
        Self { seeds, events }
    }
}

#[async_trait]
impl ShardSource for StaticShardSource {
    async fn seeds(&self) -> Result<Vec<NodeAddress>, ShardSourceError> {
        info!(count = self.seeds.len(), "static shard source returning seeds");
        Ok(self.seeds.clone())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, ShardEvent>, ShardSourceError> {
        use futures::StreamExt;
        Ok(futures::stream::iter(self.events.clone()).boxed())
    }
}
