//! Validator, Planner, and the aggregator/combiner registry of the query coordinator.
//!
//! Logical plans arrive already structured (no SQL parsing here); this crate resolves them
//! against one [`data_types::Dataset`] and [`data_types::ShardMap`] and compiles a
//! [`plan::PhysicalPlan`] the engine can execute.
#![warn(missing_debug_implementations)]

pub mod aggregate;
pub mod combine;
pub mod error;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod validator;
pub mod value;

pub use aggregate::{Aggregator, AggregatorState, Arg};
pub use combine::{CombineMode, Combiner};
pub use error::QueryError;
pub use plan::{
    AggregatorSpec, ChunkScanMethod, CombinerSpec, DataQuery, LocalPlanTemplate, LogicalPlan,
    PartQuery, PartitionScanMethod, PhysicalPlan,
};
pub use planner::Planner;
pub use registry::{FunctionRegistry, ResolvedFunction};
pub use validator::{PartQueryOptions, Validator};
pub use value::{AggregateValue, Cardinality, ColumnValue, ResultClass};
