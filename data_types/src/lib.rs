//! Shared data types for the distributed query coordinator.
#![warn(missing_debug_implementations, clippy::explicit_iter_loop, clippy::use_self)]

mod dataset;
mod query_id;
mod shard;

pub use dataset::*;
pub use query_id::*;
pub use shard::*;
