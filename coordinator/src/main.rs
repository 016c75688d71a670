//! Entry point: parses [`config::Config`], initializes logging, then bootstraps one dataset's
//! `QueryRouter` and waits for a shutdown signal. No network transport is implemented, so this
//! process currently has no way to receive client queries from outside the binary; it exists to
//! exercise the config/logging/startup wiring end to end.
use clap::Parser;
use coordinator::config::Config;
use coordinator::empty_store::EmptyColumnStore;
use data_types::{Column, ColumnId, ColumnType, Dataset, DatasetRef};
use observability_deps::tracing::info;
use query_router::StaticShardSource;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    coordinator::logging::init(&config.logging);

    info!(
        query_timeout_secs = config.query_timeout_secs,
        parallelism = config.parallelism,
        num_shards = config.num_shards,
        "starting coordinator"
    );

    // The dataset definition and the cluster-membership source are both external collaborators
    // (the metastore and membership subsystem, respectively) that this workspace does not
    // implement; a placeholder dataset and a static, never-changing membership source stand in
    // for them so the binary has something concrete to boot.
    let dataset = placeholder_dataset();
    let shard_source = Arc::new(StaticShardSource::new(
        config.seeds.iter().map(|addr| data_types::NodeAddress(addr.to_string())).collect(),
        vec![],
    ));

    let handle = coordinator::bootstrap(
        dataset,
        config.router_config(),
        config.num_shards,
        EmptyColumnStore,
        shard_source,
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.shutdown();
    Ok(())
}

fn placeholder_dataset() -> Dataset {
    Dataset::new(
        DatasetRef::new("metrics"),
        vec![
            Column { name: "time".into(), column_type: ColumnType::Timestamp, id: ColumnId(0) },
            Column { name: "value".into(), column_type: ColumnType::Double, id: ColumnId(1) },
        ],
        "partitionKey",
        "time",
        Some("time"),
    )
    .expect("placeholder dataset columns are well-formed")
}
