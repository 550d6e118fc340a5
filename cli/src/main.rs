//! ibcdecode: decodes the IBC payloads of the transactions ledger in place.
//!
//! # Commands
//! ```text
//! ibcdecode [run] [--write]     poll the ledger and stamp decode results
//! ibcdecode decode <HEX>        decode one payload and print it
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

use ibcdecode_core::config::DecoderConfig;
use ibcdecode_core::types::IBC_TX_TAG;
use ibcdecode_pipeline::PipelineBuilder;

mod cmd_decode;
mod cmd_run;
mod logging;

use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "ibcdecode",
    about = "IBC payload decoder for the transactions ledger",
    long_about = "
Scans the transactions table for IBC payloads not yet decoded by this decoder
version, decodes them and writes {decoderVersion, decoded|error} back into the
matching content entry. Read-only unless --write is given.

ENVIRONMENT VARIABLES:
  IBC_DECODER_DB         PostgreSQL connection URL
  IBC_DECODER_VERSION    Version stamp written next to every result
  IBC_DECODER_POLL_MS    Pause between passes in milliseconds
  IBC_DECODER_TARGET     Code section tag / content type to decode
  IBC_DECODER_ARTIFACT   Path of the type-registry artifact
  IBC_DECODER_DRY_RUN    Compute results without writing (true|false)
  IBC_DECODER_LOG        Log filter (e.g. info,ibcdecode_storage=debug)
  IBC_DECODER_LOG_JSON   Emit JSON logs
",
    version
)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "IBC_DECODER_DB", default_value = "postgres://localhost:5432", global = true)]
    database_url: String,

    /// Version stamped next to every result
    #[arg(long, env = "IBC_DECODER_VERSION", default_value = "0", global = true)]
    decoder_version: String,

    /// Pause between polling passes (ms)
    #[arg(long, env = "IBC_DECODER_POLL_MS", default_value_t = 5000, global = true)]
    poll_interval_ms: u64,

    /// Code section tag and content type to decode
    #[arg(long, env = "IBC_DECODER_TARGET", default_value = IBC_TX_TAG, global = true)]
    target: String,

    /// Path of the type-registry artifact
    #[arg(long, env = "IBC_DECODER_ARTIFACT", default_value = "./pkg/ibc-types.yaml", global = true)]
    artifact: String,

    /// Compute results without writing them
    #[arg(
        long,
        env = "IBC_DECODER_DRY_RUN",
        default_value_t = true,
        action = clap::ArgAction::Set,
        global = true
    )]
    dry_run: bool,

    /// Write results (same as --dry-run false)
    #[arg(long, global = true)]
    write: bool,

    /// Store connection pool size
    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,

    /// Log decoded payloads in full
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log filter directive
    #[arg(long, env = "IBC_DECODER_LOG", default_value = "info", global = true)]
    log: String,

    /// Emit JSON structured logs
    #[arg(long, env = "IBC_DECODER_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Poll the ledger and decode until interrupted (default)
    Run,

    /// Decode one hex payload with the loaded artifact and print the result
    Decode {
        /// Payload bytes as hex (0x prefix optional)
        hex: String,
    },
}

impl Cli {
    fn decoder_config(&self) -> DecoderConfig {
        PipelineBuilder::new()
            .database_url(&self.database_url)
            .decoder_version(&self.decoder_version)
            .poll_interval_ms(self.poll_interval_ms)
            .target_tag(&self.target)
            .artifact_path(&self.artifact)
            .dry_run(self.dry_run && !self.write)
            .verbose(self.verbose)
            .max_connections(self.max_connections)
            .build_config()
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            filter: self.log.clone(),
            json: self.log_json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config());

    let config = cli.decoder_config();
    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => cmd_run::run(config).await,
        Commands::Decode { hex } => cmd_decode::run(&config, &hex),
    }
}
