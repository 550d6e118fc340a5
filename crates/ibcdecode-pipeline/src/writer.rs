//! Write-back: persists one decode outcome into its content slot.
//!
//! ```text
//! outcome ─► fetch row by hash ─► correlate ─► {decoderVersion, decoded|error}
//!                                                 │
//!                                  dry run ───────┼──► preview (no write)
//!                                  otherwise ─────┴──► merge
//! ```
//!
//! Both paths compute the same patch; dry run only skips the merge.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use ibcdecode_core::correlator::ContentCorrelator;
use ibcdecode_core::engine::DecodeOutcome;
use ibcdecode_core::error::PipelineError;
use ibcdecode_core::store::TransactionStore;

/// What a write-back did, or would have done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReceipt {
    pub tx_hash: String,
    pub content_index: usize,
    /// `{decoderVersion, decoded}` or `{decoderVersion, error}`.
    pub patch: Value,
    pub dry_run: bool,
    /// The slot contents after merging. In a dry run this is the
    /// store's preview; after a real write it is `None`.
    pub preview: Option<Value>,
}

pub struct WriteBack<S: TransactionStore> {
    store: Arc<S>,
    correlator: ContentCorrelator,
    decoder_version: String,
    dry_run: bool,
}

impl<S: TransactionStore> WriteBack<S> {
    pub fn new(
        store: Arc<S>,
        target: impl Into<String>,
        decoder_version: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            correlator: ContentCorrelator::new(target),
            decoder_version: decoder_version.into(),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Persist `outcome`. Fails with [`PipelineError::Correlation`] when the
    /// row's sections and content disagree; nothing is written then.
    pub async fn write(&self, outcome: &DecodeOutcome) -> Result<WriteReceipt, PipelineError> {
        let meta = outcome.meta();
        let row = self.store.fetch_transaction(&meta.tx_hash).await?;

        // Rejected payloads carry no bytes to match, only their position.
        // Repeated bytes within a row resolve to the scanned section.
        let located = if outcome.binary().is_empty() {
            self.correlator.correlate_section(&row, meta.section_index)
        } else {
            self.correlator
                .correlate_at(&row, outcome.binary(), meta.section_index)
        };
        let content_index =
            located.map_err(|e| PipelineError::correlation(meta.tx_hash.clone(), e))?;

        let patch = outcome.to_patch(&self.decoder_version).to_json()?;
        debug!(
            tx_hash = %meta.tx_hash,
            content_index,
            "content slot resolved"
        );

        let preview = if self.dry_run {
            let preview = self
                .store
                .preview_content_data(&meta.tx_hash, content_index, &patch)
                .await?;
            info!(
                tx_hash = %meta.tx_hash,
                content_index,
                data = %preview,
                "dry run: would write"
            );
            Some(preview)
        } else {
            self.store
                .merge_content_data(&meta.tx_hash, content_index, &patch)
                .await?;
            info!(
                tx_hash = %meta.tx_hash,
                content_index,
                decoder_version = %self.decoder_version,
                failed = !outcome.is_success(),
                "wrote decode result"
            );
            None
        };

        Ok(WriteReceipt {
            tx_hash: meta.tx_hash.clone(),
            content_index,
            patch,
            dry_run: self.dry_run,
            preview,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibcdecode_core::decoder::DecodedPayload;
    use ibcdecode_core::engine::{DecodeFailure, DecodeSuccess};
    use ibcdecode_core::error::CorrelationError;
    use ibcdecode_core::types::{ContentEntry, PayloadMeta, Section, TransactionRow, IBC_TX_TAG};
    use ibcdecode_storage::InMemoryTransactionStore;
    use serde_json::json;

    fn store() -> Arc<InMemoryTransactionStore> {
        Arc::new(InMemoryTransactionStore::with_rows([TransactionRow {
            block_height: 3,
            tx_hash: "0xabc".into(),
            sections: vec![
                Section::code("tx_transfer.wasm"),
                Section::data(&[0x01]),
                Section::code(IBC_TX_TAG),
                Section::data(&[0xbe, 0xef]),
            ],
            content: vec![ContentEntry::new("tx_transfer.wasm"), ContentEntry::new(IBC_TX_TAG)],
        }]))
    }

    fn meta(section_index: usize) -> PayloadMeta {
        PayloadMeta {
            block_height: 3,
            tx_hash: "0xabc".into(),
            section_index,
        }
    }

    fn success(binary: Vec<u8>) -> DecodeOutcome {
        DecodeOutcome::Success(DecodeSuccess {
            ordinal: 0,
            meta: meta(3),
            binary,
            decoded: DecodedPayload::new(json!({ "type": "MsgRecvPacket" })),
        })
    }

    #[tokio::test]
    async fn real_write_merges_patch() {
        let store = store();
        let writer = WriteBack::new(store.clone(), IBC_TX_TAG, "7", false);

        let receipt = writer.write(&success(vec![0xbe, 0xef])).await.unwrap();
        assert_eq!(receipt.content_index, 1);
        assert_eq!(receipt.preview, None);
        assert_eq!(
            store.get("0xabc").unwrap().content[1].data,
            json!({ "decoderVersion": "7", "decoded": { "type": "MsgRecvPacket" } })
        );
    }

    #[tokio::test]
    async fn dry_run_previews_same_patch() {
        let store = store();
        let writer = WriteBack::new(store.clone(), IBC_TX_TAG, "7", true);

        let receipt = writer.write(&success(vec![0xbe, 0xef])).await.unwrap();
        assert_eq!(receipt.preview.as_ref(), Some(&receipt.patch));
        assert_eq!(store.counts().merges, 0);
        assert_eq!(store.get("0xabc").unwrap().content[1].data, json!({}));
    }

    #[tokio::test]
    async fn rejected_payload_located_by_position() {
        let store = store();
        let writer = WriteBack::new(store.clone(), IBC_TX_TAG, "7", false);
        let failure = DecodeOutcome::Failure(DecodeFailure {
            ordinal: 0,
            meta: meta(3),
            binary: Vec::new(),
            error: "not hex".into(),
        });

        let receipt = writer.write(&failure).await.unwrap();
        assert_eq!(receipt.content_index, 1);
        assert_eq!(receipt.patch, json!({ "decoderVersion": "7", "error": "not hex" }));
    }

    #[tokio::test]
    async fn unmatched_bytes_write_nothing() {
        let store = store();
        let writer = WriteBack::new(store.clone(), IBC_TX_TAG, "7", false);

        let err = writer.write(&success(vec![0x99])).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Correlation {
                source: CorrelationError::NoMatch { bytes: 1 },
                ..
            }
        ));
        assert_eq!(store.counts().merges, 0);
    }
}
