//! A crate to ensure consistent usage of tracing macros across the query coordinator workspace.
pub use tracing;
