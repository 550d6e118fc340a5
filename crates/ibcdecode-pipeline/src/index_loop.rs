//! The ingestion loop: streams undecoded rows, decodes, writes back.
//!
//! # One pass
//! Query every row with a target content entry not yet stamped by this
//! decoder version, highest block first. For each row:
//!   - Scan its sections for target payloads
//!   - Decode each payload (DecodeEngine)
//!   - Report the outcome (OutcomeHandler)
//!   - Write the outcome back into its content slot (WriteBack)
//!
//! # Polling
//! `run` repeats passes, sleeping `poll_interval_ms` in between, until the
//! cancellation token fires. A row that cannot be read, or whose sections
//! and content disagree, is logged and skipped; any other error stops the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ibcdecode_core::config::{DecoderConfig, LoopState};
use ibcdecode_core::counter::DecodeCounter;
use ibcdecode_core::decoder::PayloadDecoder;
use ibcdecode_core::engine::DecodeEngine;
use ibcdecode_core::error::PipelineError;
use ibcdecode_core::handler::OutcomeHandler;
use ibcdecode_core::scanner::SectionScanner;
use ibcdecode_core::store::TransactionStore;
use ibcdecode_core::types::{PayloadMeta, TransactionRow};

use crate::writer::WriteBack;

/// Totals for one pass over the candidate rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassStats {
    pub started_at: DateTime<Utc>,
    /// Rows pulled from the candidate stream.
    pub rows: u64,
    /// Payloads handed to the engine, decoded or not.
    pub payloads: u64,
    /// Outcomes written (or previewed, in a dry run).
    pub written: u64,
    /// Rows abandoned as unreadable or on a correlation error.
    pub skipped_rows: u64,
    /// The pass stopped early on cancellation.
    pub cancelled: bool,
}

impl PassStats {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            rows: 0,
            payloads: 0,
            written: 0,
            skipped_rows: 0,
            cancelled: false,
        }
    }
}

/// The ingestion loop over one store.
pub struct IngestLoop<S: TransactionStore> {
    config: DecoderConfig,
    store: Arc<S>,
    engine: DecodeEngine,
    writer: WriteBack<S>,
    handler: Arc<dyn OutcomeHandler>,
    state: LoopState,
}

impl<S: TransactionStore> IngestLoop<S> {
    pub fn new(
        config: DecoderConfig,
        store: Arc<S>,
        decoder: Arc<dyn PayloadDecoder>,
        handler: Arc<dyn OutcomeHandler>,
    ) -> Self {
        let writer = WriteBack::new(
            Arc::clone(&store),
            config.target_tag.clone(),
            config.decoder_version.clone(),
            config.dry_run,
        );
        Self {
            engine: DecodeEngine::new(decoder),
            writer,
            handler,
            store,
            state: LoopState::Idle,
            config,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Running tally across every pass so far.
    pub fn counter(&self) -> &DecodeCounter {
        self.engine.counter()
    }

    /// Run a single pass to the end of the candidate stream.
    pub async fn run_once(&mut self) -> Result<PassStats, PipelineError> {
        self.pass(None).await
    }

    /// Poll until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), PipelineError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        info!(
            decoder_version = %self.config.decoder_version,
            target = %self.config.target_tag,
            dry_run = self.config.dry_run,
            poll_interval_ms = self.config.poll_interval_ms,
            "starting IBC decoder"
        );

        while !cancel.is_cancelled() {
            match self.pass(Some(&cancel)).await {
                Ok(stats) => {
                    info!(
                        rows = stats.rows,
                        payloads = stats.payloads,
                        written = stats.written,
                        skipped_rows = stats.skipped_rows,
                        "pass complete: {}",
                        self.counter().snapshot().summary()
                    );
                }
                Err(e) => {
                    self.state = LoopState::Stopped;
                    error!(error = %e, "decoder stopped on error");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.state = LoopState::Stopped;
        info!("decoder shutting down: {}", self.counter().snapshot().summary());
        Ok(())
    }

    async fn pass(&mut self, cancel: Option<&CancellationToken>) -> Result<PassStats, PipelineError> {
        let mut stats = PassStats::start();
        let query = self.config.candidate_query();
        let store = Arc::clone(&self.store);

        self.state = LoopState::Streaming;
        let mut rows = store.stream_candidates(&query);

        while let Some(row) = rows.next().await {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                stats.cancelled = true;
                break;
            }
            stats.rows += 1;
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_row_level() => {
                    stats.skipped_rows += 1;
                    warn!(error = %e, "skipping unreadable row");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.process_row(&row, &mut stats).await {
                Ok(()) => {}
                Err(e) if e.is_row_level() => {
                    stats.skipped_rows += 1;
                    warn!(
                        block_height = row.block_height,
                        tx_hash = %row.tx_hash,
                        error = %e,
                        "skipping row"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.state = LoopState::Idle;
        Ok(stats)
    }

    /// Decode and write every target payload of `row`. Stops at the first
    /// write-back error; payloads already written stay written.
    async fn process_row(
        &mut self,
        row: &TransactionRow,
        stats: &mut PassStats,
    ) -> Result<(), PipelineError> {
        debug!(
            block_height = row.block_height,
            tx_hash = %row.tx_hash,
            sections = row.sections.len(),
            "processing row"
        );

        for scanned in SectionScanner::new(&row.sections, &self.config.target_tag) {
            let report = match scanned {
                Ok(payload) => {
                    let meta = self.meta(row, payload.section_index);
                    self.engine.attempt(meta, payload.bytes)
                }
                Err(e) => {
                    let meta = self.meta(row, e.section_index());
                    self.engine.reject(meta, e.to_string())
                }
            };
            stats.payloads += 1;

            self.handler.dispatch(&report);
            self.writer.write(&report.outcome).await?;
            stats.written += 1;
        }
        Ok(())
    }

    fn meta(&self, row: &TransactionRow, section_index: usize) -> PayloadMeta {
        PayloadMeta {
            block_height: row.block_height,
            tx_hash: row.tx_hash.clone(),
            section_index,
        }
    }
}
