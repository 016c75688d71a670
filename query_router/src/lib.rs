//! The `QueryRouter` actor, its message protocol, and its cluster-membership collaborator seam.
//!
//! This crate is the dataset-level front door: it owns one [`data_types::ShardMap`], compiles
//! client requests through `query_planner` and runs them through `query_engine`, and dispatches
//! shard-local work to `shard_executor` over an in-process [`dispatcher::LocalDispatcher`].
#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatcher;
pub mod messages;
pub mod router;
pub mod shard_source;

pub use config::RouterConfig;
pub use dispatcher::LocalDispatcher;
pub use messages::{QueryReply, RouterMessage};
pub use router::{QueryRouter, RouterState};
pub use shard_source::{ShardSource, ShardSourceError, StaticShardSource};
