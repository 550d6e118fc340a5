//! `ibcdecode run`: the polling daemon.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use ibcdecode_core::config::DecoderConfig;
use ibcdecode_core::counter::DecodeCounter;
use ibcdecode_core::decoder::DecoderSlot;
use ibcdecode_pipeline::PipelineBuilder;
use ibcdecode_proto::RegistryLoader;
use ibcdecode_storage::{PostgresOptions, PostgresTransactionStore};

pub async fn run(config: DecoderConfig) -> Result<()> {
    info!(
        decoder_version = %config.decoder_version,
        target = %config.target_tag,
        dry_run = config.dry_run,
        artifact = %config.artifact_path,
        "IBC decoder configuration"
    );

    let mut slot = DecoderSlot::new();
    let decoder = slot
        .get_or_load(&RegistryLoader::new(&config.artifact_path))
        .context("failed to load decoder artifact")?;

    let options = PostgresOptions {
        max_connections: config.max_connections,
        ..PostgresOptions::default()
    };
    let store = PostgresTransactionStore::connect_with_options(&config.database_url, options)
        .await
        .context("failed to connect to the transactions database")?;
    let store = Arc::new(store);

    let mut pipeline = PipelineBuilder::from_config(config).build(Arc::clone(&store), decoder);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current row");
            on_signal.cancel();
        }
    });

    let result = pipeline.run(cancel).await;
    print_tally(pipeline.counter());
    store.close().await;

    result.context("decoder stopped")
}

/// Final tally and error log, printed on the way out.
fn print_tally(counter: &DecodeCounter) {
    let snapshot = counter.snapshot();
    println!("{}", snapshot.summary());
    for (ibc_type, count) in &snapshot.ibc_types {
        println!("  {ibc_type}: {count}");
    }
    if !snapshot.type_urls.is_empty() {
        println!("type URLs: {}", snapshot.type_urls.join(", "));
    }
    if !counter.errors().is_empty() {
        println!("errors:");
        for (label, error) in counter.errors() {
            println!("  {label}: {error}");
        }
    }
}
