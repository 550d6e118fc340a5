//! Store boundary: where transaction rows come from and where results go.
//!
//! Implementations: `InMemoryTransactionStore` (tests, embedding) and
//! `PostgresTransactionStore` (production), both in `ibcdecode-storage`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::types::TransactionRow;

/// A stream of candidate rows.
pub type RowStream<'a> = BoxStream<'a, Result<TransactionRow, PipelineError>>;

/// Which rows the ingestion loop wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    /// Content entry type to look for (e.g. `"tx_ibc.wasm"`).
    pub content_type: String,
    /// Rows whose matching entries are all stamped with this version are skipped.
    pub decoder_version: String,
}

impl CandidateQuery {
    pub fn new(content_type: impl Into<String>, decoder_version: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            decoder_version: decoder_version.into(),
        }
    }

    /// Returns `true` if `row` has at least one entry of the content type
    /// that this decoder version has not stamped yet.
    pub fn matches(&self, row: &TransactionRow) -> bool {
        row.content
            .iter()
            .any(|entry| entry.needs_decoding(&self.content_type, &self.decoder_version))
    }
}

/// Transaction ledger access used by the ingestion loop and write-back.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Stream every row matching `query`, highest block first. Each
    /// transaction appears at most once per stream.
    fn stream_candidates<'a>(&'a self, query: &'a CandidateQuery) -> RowStream<'a>;

    /// Read a row by hash. Exactly one row must match.
    async fn fetch_transaction(&self, tx_hash: &str) -> Result<TransactionRow, PipelineError>;

    /// What `content[index].data` would become after merging `patch`,
    /// computed without writing anything.
    async fn preview_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<Value, PipelineError>;

    /// Merge `patch` into `content[index].data` of the row with this hash.
    /// Exactly one row must be affected.
    async fn merge_content_data(
        &self,
        tx_hash: &str,
        index: usize,
        patch: &Value,
    ) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentEntry, Section, IBC_TX_TAG};
    use serde_json::json;

    fn row_with(data: Value) -> TransactionRow {
        TransactionRow {
            block_height: 10,
            tx_hash: "0xabc".into(),
            sections: vec![Section::code(IBC_TX_TAG), Section::data(b"x")],
            content: vec![
                ContentEntry::new("tx_transfer.wasm"),
                ContentEntry {
                    kind: IBC_TX_TAG.into(),
                    data,
                },
            ],
        }
    }

    #[test]
    fn missing_stamp_is_a_candidate() {
        let query = CandidateQuery::new(IBC_TX_TAG, "3");
        assert!(query.matches(&row_with(json!({}))));
        assert!(query.matches(&row_with(Value::Null)));
    }

    #[test]
    fn stale_stamp_is_a_candidate() {
        let query = CandidateQuery::new(IBC_TX_TAG, "3");
        assert!(query.matches(&row_with(json!({ "decoderVersion": "2", "decoded": {} }))));
    }

    #[test]
    fn current_stamp_is_not() {
        let query = CandidateQuery::new(IBC_TX_TAG, "3");
        assert!(!query.matches(&row_with(json!({ "decoderVersion": "3", "error": "x" }))));
    }
}
