//! Decoder configuration and loop state types.

use serde::{Deserialize, Serialize};

use crate::store::CandidateQuery;
use crate::types::IBC_TX_TAG;

/// Configuration for a decoder instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Version stamp written next to every result. Rows already stamped with
    /// it are not selected again.
    pub decoder_version: String,
    /// Pause between polling passes (milliseconds).
    pub poll_interval_ms: u64,
    /// Code section tag and content type of the target payloads.
    pub target_tag: String,
    /// Compute patches without writing them.
    pub dry_run: bool,
    /// Log decoded payloads in full.
    pub verbose: bool,
    /// Path of the decoder's type-registry artifact.
    pub artifact_path: String,
    /// Store connection pool size.
    pub max_connections: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost:5432".into(),
            decoder_version: "0".into(),
            poll_interval_ms: 5000,
            target_tag: IBC_TX_TAG.into(),
            dry_run: true,
            verbose: false,
            artifact_path: "./pkg/ibc-types.yaml".into(),
            max_connections: 5,
        }
    }
}

impl DecoderConfig {
    /// The selection query for this configuration.
    pub fn candidate_query(&self) -> CandidateQuery {
        CandidateQuery::new(&self.target_tag, &self.decoder_version)
    }
}

/// Runtime state of the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Between passes.
    Idle,
    /// Consuming candidate rows.
    Streaming,
    /// Cancelled or failed; will not poll again.
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
