//! Outcome handlers: consumers of decode reports.
//!
//! The ingestion loop hands every [`DecodeReport`] to its handler before
//! write-back: `on_success` or `on_failure` first, then `on_progress`.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::counter::CounterSnapshot;
use crate::engine::{pretty_json, DecodeFailure, DecodeOutcome, DecodeReport, DecodeSuccess};

/// Trait for decode report consumers.
pub trait OutcomeHandler: Send + Sync {
    fn on_progress(&self, progress: &CounterSnapshot);

    fn on_success(&self, success: &DecodeSuccess);

    fn on_failure(&self, failure: &DecodeFailure);

    /// Dispatch a report in order: the outcome, then progress.
    fn dispatch(&self, report: &DecodeReport) {
        match &report.outcome {
            DecodeOutcome::Success(s) => self.on_success(s),
            DecodeOutcome::Failure(f) => self.on_failure(f),
        }
        self.on_progress(&report.progress);
    }
}

// ─── TracingReporter ──────────────────────────────────────────────────────────

/// Renders reports as log lines. `verbose` adds the decoded JSON and the full
/// type lists.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter {
    verbose: bool,
}

impl TracingReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl OutcomeHandler for TracingReporter {
    fn on_progress(&self, progress: &CounterSnapshot) {
        if self.verbose {
            let types: Vec<&str> = progress.ibc_types.keys().map(String::as_str).collect();
            info!(
                decoded = progress.decoded,
                total = progress.total,
                failed = progress.failed,
                ibc_types = %types.join(", "),
                type_urls = %progress.type_urls.join(", "),
                "progress"
            );
        } else {
            info!("{}", progress.summary());
        }
    }

    fn on_success(&self, s: &DecodeSuccess) {
        info!(
            ordinal = s.ordinal,
            ibc_type = s.decoded.type_name(),
            block_height = s.meta.block_height,
            tx_hash = %s.meta.tx_hash,
            section_index = s.meta.section_index,
            bytes = s.binary.len(),
            "decoded IBC payload"
        );
        if self.verbose {
            info!("decoded data:\n{}", pretty_json(s.decoded.as_json()));
        }
    }

    fn on_failure(&self, f: &DecodeFailure) {
        warn!(
            ordinal = f.ordinal,
            block_height = f.meta.block_height,
            tx_hash = %f.meta.tx_hash,
            section_index = f.meta.section_index,
            bytes = f.binary.len(),
            error = %f.error,
            "failed to decode IBC payload"
        );
    }
}

// ─── RecordingHandler ─────────────────────────────────────────────────────────

/// Keeps every outcome it sees. Useful in tests and for embedding.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    outcomes: Arc<Mutex<Vec<DecodeOutcome>>>,
    progress: Arc<Mutex<Vec<CounterSnapshot>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<DecodeOutcome> {
        self.outcomes.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn progress(&self) -> Vec<CounterSnapshot> {
        self.progress.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl OutcomeHandler for RecordingHandler {
    fn on_progress(&self, progress: &CounterSnapshot) {
        if let Ok(mut p) = self.progress.lock() {
            p.push(progress.clone());
        }
    }

    fn on_success(&self, success: &DecodeSuccess) {
        if let Ok(mut o) = self.outcomes.lock() {
            o.push(DecodeOutcome::Success(success.clone()));
        }
    }

    fn on_failure(&self, failure: &DecodeFailure) {
        if let Ok(mut o) = self.outcomes.lock() {
            o.push(DecodeOutcome::Failure(failure.clone()));
        }
    }
}
