//! Per-query options, threaded through the Validator, Planner, Engine, and `ResultCodec`.
use std::time::Duration;

/// The options a client attaches to a `LogicalPlanQuery`/`ExecPlanQuery`, with defaults matching
/// the router's own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Global deadline for the whole query, `Engine::execute` through.
    pub query_timeout_secs: u64,
    /// Max concurrent shard requests in one scatter/gather.
    pub parallelism: usize,
    /// Max result items (rows or vector elements) across all shards.
    pub item_limit: usize,
    /// Fail the whole query if any owning shard is not `Active`, instead of silently omitting
    /// its partitions.
    pub require_all_shards: bool,
    /// After producing a `Result`, attempt to encode it and log (not surface) failures.
    pub test_query_serialization: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            parallelism: 16,
            item_limit: 1000,
            require_all_shards: false,
            test_query_serialization: false,
        }
    }
}

impl QueryOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented() {
        let opts = QueryOptions::default();
        assert_eq!(opts.query_timeout_secs, 30);
        assert_eq!(opts.parallelism, 16);
        assert_eq!(opts.item_limit, 1000);
        assert!(!opts.require_all_shards);
        assert!(!opts.test_query_serialization);
    }
}
