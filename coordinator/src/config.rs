//! CLI surface for the coordinator binary: one `clap`-derived struct, env var fallback on every
//! flag, mirroring `clap_blocks`' derive+env pattern.
use query_router::RouterConfig;
use std::net::SocketAddr;

/// Command-line configuration for a single coordinator process.
///
/// Every flag has a `QUERY_COORD_*` environment variable fallback, so a deployment can be driven
/// entirely by env vars with no command line at all.
#[derive(Debug, Clone, clap::Parser)]
#[clap(
    name = "coordinator",
    about = "Distributed query coordinator for a sharded, column-oriented time-series store"
)]
pub struct Config {
    #[clap(flatten)]
    pub logging: LoggingConfig,

    /// Global deadline for a single query, start to finish.
    #[clap(long = "query-timeout-secs", env = "QUERY_COORD_QUERY_TIMEOUT_SECS", default_value_t = 30)]
    pub query_timeout_secs: u64,

    /// Max concurrent shard requests in one scatter/gather.
    #[clap(long = "parallelism", env = "QUERY_COORD_PARALLELISM", default_value_t = 16)]
    pub parallelism: usize,

    /// Max result items (rows or vector elements) across all shards.
    #[clap(long = "item-limit", env = "QUERY_COORD_ITEM_LIMIT", default_value_t = 1000)]
    pub item_limit: usize,

    /// Fail the whole query if any owning shard is not Active.
    #[clap(long = "require-all-shards", env = "QUERY_COORD_REQUIRE_ALL_SHARDS")]
    pub require_all_shards: bool,

    /// After producing a result, attempt to encode it and log (not surface) failures.
    #[clap(long = "test-query-serialization", env = "QUERY_COORD_TEST_QUERY_SERIALIZATION")]
    pub test_query_serialization: bool,

    /// How long cluster bootstrap waits for `ShardSource::seeds()` before failing with
    /// `ClusterNotReady`.
    #[clap(
        long = "cluster-membership-timeout-secs",
        env = "QUERY_COORD_CLUSTER_MEMBERSHIP_TIMEOUT_SECS",
        default_value_t = 30
    )]
    pub cluster_membership_timeout_secs: u64,

    /// Fixed shard count of the dataset this process serves. The partitioning scheme itself is
    /// jump consistent hashing; this is the `num_shards` it hashes over.
    #[clap(long = "num-shards", env = "QUERY_COORD_NUM_SHARDS", default_value_t = 1)]
    pub num_shards: u32,

    /// Static seed addresses for cluster membership bootstrap, in `host:port` form. Repeat the
    /// flag or set a comma-separated env var to pass more than one.
    #[clap(long = "seed", env = "QUERY_COORD_SEEDS", value_delimiter = ',')]
    pub seeds: Vec<SocketAddr>,
}

impl Config {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            query_timeout_secs: self.query_timeout_secs,
            parallelism: self.parallelism,
            item_limit: self.item_limit,
            require_all_shards: self.require_all_shards,
            test_query_serialization: self.test_query_serialization,
            cluster_membership_timeout_secs: self.cluster_membership_timeout_secs,
        }
    }
}

/// The logging half of [`Config`], kept as its own `clap::Args` block the way `trogging::cli::
/// LoggingConfig` is flattened into each IOx service's run config.
#[derive(Debug, Clone, clap::Args)]
pub struct LoggingConfig {
    /// The `tracing-subscriber` `EnvFilter` directive string, e.g. `info` or
    /// `coordinator=debug,query_router=trace`.
    #[clap(long = "log-filter", env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_router_config_defaults() {
        let config = Config::parse_from(["coordinator"]);
        let router_config = config.router_config();
        assert_eq!(router_config, RouterConfig::default());
    }

    #[test]
    fn parses_comma_separated_seeds() {
        let config = Config::parse_from(["coordinator", "--seed", "10.0.0.1:8080,10.0.0.2:8080"]);
        assert_eq!(config.seeds.len(), 2);
    }

    #[test]
    fn num_shards_defaults_to_one() {
        let config = Config::parse_from(["coordinator"]);
        assert_eq!(config.num_shards, 1);
    }
}
