//! Shared types for the decode pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

/// Tag carried by the Code section (and `type` of the content entry) of an IBC sub-transaction.
pub const IBC_TX_TAG: &str = "tx_ibc.wasm";

// ─── Section ──────────────────────────────────────────────────────────────────

/// One entry of a transaction's low-level section list.
///
/// Only `Code` and `Data` sections matter here; every other kind
/// (signatures, memos, ...) deserializes to [`Section::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Section {
    Code {
        #[serde(default, deserialize_with = "lenient_string")]
        tag: Option<String>,
    },
    Data {
        /// Hex-encoded payload bytes.
        #[serde(default, deserialize_with = "lenient_string")]
        data: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl Section {
    pub fn code(tag: impl Into<String>) -> Self {
        Self::Code {
            tag: Some(tag.into()),
        }
    }

    pub fn data(bytes: &[u8]) -> Self {
        Self::Data {
            data: Some(hex::encode(bytes)),
        }
    }

    /// Returns `true` for a Code section whose tag equals `target`.
    pub fn is_code_tagged(&self, target: &str) -> bool {
        matches!(self, Self::Code { tag: Some(tag) } if tag == target)
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code { .. })
    }

    /// Hex payload of a Data section, without any `0x` prefix.
    pub fn data_hex(&self) -> Option<&str> {
        match self {
            Self::Data { data: Some(data) } => {
                Some(data.strip_prefix("0x").unwrap_or(data.as_str()))
            }
            _ => None,
        }
    }
}

/// Accept any JSON value; keep it only if it is a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        _ => None,
    }))
}

// ─── ContentEntry ─────────────────────────────────────────────────────────────

/// One logical sub-message of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ContentEntry {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Value::Object(Default::default()),
        }
    }

    /// The decoder version that last stamped this entry, if any.
    pub fn decoder_version(&self) -> Option<&str> {
        self.data.get("decoderVersion").and_then(Value::as_str)
    }

    /// Returns `true` if this entry is of `kind` and was not stamped by `version`.
    pub fn needs_decoding(&self, kind: &str, version: &str) -> bool {
        self.kind == kind && self.decoder_version() != Some(version)
    }
}

// ─── TransactionRow ───────────────────────────────────────────────────────────

/// A ledger transaction with both views of its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub block_height: u64,
    pub tx_hash: String,
    pub sections: Vec<Section>,
    pub content: Vec<ContentEntry>,
}

impl TransactionRow {
    /// Build a row from the raw `sections` / `content` JSON of a ledger
    /// record. `null` or absent arrays read as empty; anything that does not
    /// deserialize is [`PipelineError::MalformedRow`].
    pub fn from_json_parts(
        block_height: u64,
        tx_hash: impl Into<String>,
        sections: Option<Value>,
        content: Option<Value>,
    ) -> Result<Self, PipelineError> {
        let tx_hash = tx_hash.into();
        let malformed = |what: &str, e: serde_json::Error| PipelineError::MalformedRow {
            tx_hash: tx_hash.clone(),
            reason: format!("{what}: {e}"),
        };

        let sections: Vec<Section> = match sections {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v).map_err(|e| malformed("sections", e))?
            }
            _ => Vec::new(),
        };
        let content: Vec<ContentEntry> = match content {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v).map_err(|e| malformed("content", e))?
            }
            _ => Vec::new(),
        };

        Ok(Self {
            block_height,
            tx_hash,
            sections,
            content,
        })
    }
}

// ─── PayloadMeta ──────────────────────────────────────────────────────────────

/// Where a payload came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub block_height: u64,
    pub tx_hash: String,
    pub section_index: usize,
}

// ─── DecodePatch ──────────────────────────────────────────────────────────────

/// Result half of a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchResult {
    Decoded(Value),
    Error(String),
}

/// Value merged into `content[i].data` on write-back:
/// `{decoderVersion, decoded}` or `{decoderVersion, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodePatch {
    pub decoder_version: String,
    #[serde(flatten)]
    pub result: PatchResult,
}

impl DecodePatch {
    pub fn decoded(version: impl Into<String>, value: Value) -> Self {
        Self {
            decoder_version: version.into(),
            result: PatchResult::Decoded(value),
        }
    }

    pub fn error(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            decoder_version: version.into(),
            result: PatchResult::Error(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.result, PatchResult::Error(_))
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
