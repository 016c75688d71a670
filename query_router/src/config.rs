//! `QueryRouter` configuration, loaded the way `clap_blocks` loads IOx service config: a plain
//! struct with `Default` matching the documented defaults, and a `clap`-derived CLI surface on
//! the `coordinator` binary.
use query_engine::QueryOptions;

/// The router-wide defaults a client's [`QueryOptions`] fall back to, plus the cluster-bootstrap
/// timeout that has no per-query equivalent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterConfig {
    pub query_timeout_secs: u64,
    pub parallelism: usize,
    pub item_limit: usize,
    pub require_all_shards: bool,
    pub test_query_serialization: bool,
    /// How long cluster bootstrap waits for `ShardSource::seeds()` before failing with
    /// `ClusterNotReady`.
    pub cluster_membership_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            parallelism: 16,
            item_limit: 1000,
            require_all_shards: false,
            test_query_serialization: false,
            cluster_membership_timeout_secs: 30,
        }
    }
}

impl RouterConfig {
    /// The [`QueryOptions`] a query uses when the client submits none of its own.
    pub fn default_query_options(&self) -> QueryOptions {
        QueryOptions {
            query_timeout_secs: self.query_timeout_secs,
            parallelism: self.parallelism,
            item_limit: self.item_limit,
            require_all_shards: self.require_all_shards,
            test_query_serialization: self.test_query_serialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented() {
        let config = RouterConfig::default();
        assert_eq!(config.query_timeout_secs, 30);
        assert_eq!(config.parallelism, 16);
        assert_eq!(config.item_limit, 1000);
        assert!(!config.require_all_shards);
        assert!(!config.test_query_serialization);
    }

    #[test]
    fn default_query_options_mirrors_config() {
        let config = RouterConfig {
            parallelism: 8,
            ..RouterConfig::default()
        };
        assert_eq!(config.default_query_options().parallelism, 8);
    }
}
