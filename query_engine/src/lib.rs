//! The scatter/gather execution engine and result codec of the query coordinator.
#![warn(missing_debug_implementations)]

pub mod dispatch;
pub mod engine;
pub mod options;
pub mod result_codec;

pub use dispatch::{ShardDispatcher, ShardOutcome};
pub use engine::{Engine, EngineOutput};
pub use options::QueryOptions;
pub use result_codec::{FieldSchema, QueryResult, ResultCodec};
