//! ibcdecode-core: the decode-correlate-persist pipeline for IBC payloads.
//!
//! # Architecture
//!
//! ```text
//! IngestLoop (ibcdecode-pipeline)
//!     ├── TransactionStore   (candidate stream, reads, merge writes)
//!     ├── SectionScanner     (Code[tx_ibc.wasm] → Data pairs)
//!     ├── DecodeEngine       (PayloadDecoder + DecodeCounter)
//!     ├── OutcomeHandler     (progress / success / failure reporting)
//!     └── WriteBack          (ContentCorrelator → versioned patch)
//! ```

pub mod config;
pub mod correlator;
pub mod counter;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod handler;
pub mod scanner;
pub mod store;
pub mod types;

pub use config::{DecoderConfig, LoopState};
pub use correlator::ContentCorrelator;
pub use counter::{CounterSnapshot, DecodeCounter};
pub use decoder::{DecodedPayload, DecoderLoader, DecoderSlot, PayloadDecoder};
pub use engine::{DecodeEngine, DecodeFailure, DecodeOutcome, DecodeReport, DecodeSuccess};
pub use error::{CorrelationError, DecodeError, LoadError, PipelineError};
pub use handler::{OutcomeHandler, RecordingHandler, TracingReporter};
pub use scanner::{ScanError, ScannedPayload, SectionScanner};
pub use store::{CandidateQuery, RowStream, TransactionStore};
pub use types::{ContentEntry, DecodePatch, PatchResult, PayloadMeta, Section, TransactionRow, IBC_TX_TAG};
