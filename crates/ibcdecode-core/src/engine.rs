//! Decode engine: one decoder call per payload, tallied and turned into an outcome.
//!
//! Decode errors never escape: every attempt yields a [`DecodeReport`] that the
//! caller hands to reporting and write-back in turn.

use std::sync::Arc;

use serde_json::Value;

use crate::counter::{CounterSnapshot, DecodeCounter};
use crate::decoder::{DecodedPayload, PayloadDecoder};
use crate::types::{DecodePatch, PayloadMeta};

/// A payload that decoded.
#[derive(Debug, Clone)]
pub struct DecodeSuccess {
    /// Ordinal of the attempt within this process.
    pub ordinal: u64,
    pub meta: PayloadMeta,
    pub binary: Vec<u8>,
    pub decoded: DecodedPayload,
}

/// A payload that did not.
#[derive(Debug, Clone)]
pub struct DecodeFailure {
    pub ordinal: u64,
    pub meta: PayloadMeta,
    pub binary: Vec<u8>,
    pub error: String,
}

#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    Success(DecodeSuccess),
    Failure(DecodeFailure),
}

impl DecodeOutcome {
    pub fn ordinal(&self) -> u64 {
        match self {
            Self::Success(s) => s.ordinal,
            Self::Failure(f) => f.ordinal,
        }
    }

    pub fn meta(&self) -> &PayloadMeta {
        match self {
            Self::Success(s) => &s.meta,
            Self::Failure(f) => &f.meta,
        }
    }

    pub fn binary(&self) -> &[u8] {
        match self {
            Self::Success(s) => &s.binary,
            Self::Failure(f) => &f.binary,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The value to stamp into the content slot.
    pub fn to_patch(&self, decoder_version: &str) -> DecodePatch {
        match self {
            Self::Success(s) => DecodePatch::decoded(decoder_version, s.decoded.as_json().clone()),
            Self::Failure(f) => DecodePatch::error(decoder_version, f.error.clone()),
        }
    }
}

/// Outcome of one attempt plus the counter right after it.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub outcome: DecodeOutcome,
    pub progress: CounterSnapshot,
}

/// Wraps the decoder handle and owns the counter.
pub struct DecodeEngine {
    decoder: Arc<dyn PayloadDecoder>,
    counter: DecodeCounter,
}

impl DecodeEngine {
    pub fn new(decoder: Arc<dyn PayloadDecoder>) -> Self {
        Self {
            decoder,
            counter: DecodeCounter::new(),
        }
    }

    /// Decode one payload. Calls the decoder exactly once.
    pub fn attempt(&mut self, meta: PayloadMeta, binary: Vec<u8>) -> DecodeReport {
        let ordinal = self.counter.begin();
        let result = self.decoder.decode(&binary);
        let outcome = match result {
            Ok(decoded) => {
                self.counter
                    .success(decoded.type_name(), decoded.client_type_url());
                DecodeOutcome::Success(DecodeSuccess {
                    ordinal,
                    meta,
                    binary,
                    decoded,
                })
            }
            Err(err) => self.fail(ordinal, meta, binary, err.message),
        };
        DecodeReport {
            outcome,
            progress: self.counter.snapshot(),
        }
    }

    /// Count a payload that could not even be handed to the decoder
    /// (e.g. its section is not valid hex).
    pub fn reject(&mut self, meta: PayloadMeta, error: impl Into<String>) -> DecodeReport {
        let ordinal = self.counter.begin();
        let outcome = self.fail(ordinal, meta, Vec::new(), error.into());
        DecodeReport {
            outcome,
            progress: self.counter.snapshot(),
        }
    }

    pub fn counter(&self) -> &DecodeCounter {
        &self.counter
    }

    fn fail(&mut self, ordinal: u64, meta: PayloadMeta, binary: Vec<u8>, error: String) -> DecodeOutcome {
        let label = format!(
            "IBC#{ordinal}: TX: {} Section: {}: {}b",
            meta.tx_hash,
            meta.section_index,
            binary.len()
        );
        self.counter.failure(label, error.clone());
        DecodeOutcome::Failure(DecodeFailure {
            ordinal,
            meta,
            binary,
            error,
        })
    }
}

/// JSON rendering of a decoded payload, for verbose logs.
pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
