//! In-memory transaction store.
//!
//! Mirrors the Postgres backend's query and merge semantics over a `Vec`.
//! Also counts statements by kind so tests can check what was issued.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use ibcdecode_core::error::PipelineError;
use ibcdecode_core::store::{CandidateQuery, RowStream, TransactionStore};
use ibcdecode_core::types::TransactionRow;

/// Statements issued against the store, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementCounts {
    pub streams: u64,
    pub reads: u64,
    pub previews: u64,
    pub merges: u64,
}

/// In-memory transaction ledger.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: Mutex<Vec<TransactionRow>>,
    counts: Mutex<StatementCounts>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = TransactionRow>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert(row);
        }
        store
    }

    pub fn insert(&self, row: TransactionRow) {
        self.rows().push(row);
    }

    /// Current state of the first row with this hash.
    pub fn get(&self, tx_hash: &str) -> Option<TransactionRow> {
        self.rows().iter().find(|r| r.tx_hash == tx_hash).cloned()
    }

    pub fn counts(&self) -> StatementCounts {
        *self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rows(&self) -> MutexGuard<'_, Vec<TransactionRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut StatementCounts)) {
        f(&mut self.counts.lock().unwrap_or_else(|e| e.into_inner()));
    }

    /// Index of the single row with this hash.
    fn position(rows: &[TransactionRow], tx_hash: &str) -> Result<usize, PipelineError> {
        let mut hits = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.tx_hash == tx_hash)
            .map(|(i, _)| i);
        let first = hits.next().ok_or_else(|| PipelineError::RowNotFound {
            tx_hash: tx_hash.to_string(),
        })?;
        let extra = hits.count() as u64;
        if extra > 0 {
            return Err(PipelineError::AmbiguousRow {
                tx_hash: tx_hash.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    fn merged_slot(row: &TransactionRow, index: usize, patch: &Value) -> Result<Value, PipelineError> {
        let entry = row.content.get(index).ok_or_else(|| {
            PipelineError::Storage(format!(
                "tx {}: content index {index} out of range ({} entries)",
                row.tx_hash,
                row.content.len()
            ))
        })?;
        Ok(merge_result(&entry.data, patch))
    }
}

/// Merge a result patch into an existing content `data` value: stale
/// `decoded`/`error` keys are dropped, patch keys win, other keys survive.
pub fn merge_result(existing: &Value, patch: &Value) -> Value {
    let mut merged = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    merged.remove("decoded");
    merged.remove("error");
    if let Value::Object(patch) = patch {
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    fn stream_candidates<'a>(&'a self, query: &'a CandidateQuery) -> RowStream<'a> {
        self.count(|c| c.streams += 1);
        let mut candidates: Vec<TransactionRow> = self
            .rows()
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.block_height.cmp(&a.block_height));
        debug!(rows = candidates.len(), "in-memory candidate stream");
        futures::stream::iter(candidates.into_iter().map(Ok)).boxed()
    }

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<TransactionRow, PipelineError> {
        self.count(|c| c.reads += 1);
        let rows = self.rows();
        let at = Self::position(&rows, tx_hash)?;
        Ok(rows[at].clone())
    }

    async fn preview_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<Value, PipelineError> {
        self.count(|c| c.previews += 1);
        let rows = self.rows();
        let at = Self::position(&rows, tx_hash)?;
        Self::merged_slot(&rows[at], index, patch)
    }

    async fn merge_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<(), PipelineError> {
        self.count(|c| c.merges += 1);
        let mut rows = self.rows();
        let at = Self::position(&rows, tx_hash)?;
        let merged = Self::merged_slot(&rows[at], index, patch)?;
        rows[at].content[index].data = merged;
        Ok(())
    }
}
