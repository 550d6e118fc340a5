//! ibcdecode-pipeline: ingestion loop, write-back and builder API.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ibcdecode_core::decoder::{DecoderLoader, DecoderSlot};
//! use ibcdecode_pipeline::PipelineBuilder;
//! use ibcdecode_proto::RegistryLoader;
//! use ibcdecode_storage::InMemoryTransactionStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut slot = DecoderSlot::new();
//! let decoder = slot.get_or_load(&RegistryLoader::new("./pkg/ibc-types.yaml"))?;
//! let store = Arc::new(InMemoryTransactionStore::new());
//!
//! let mut pipeline = PipelineBuilder::new()
//!     .decoder_version("1")
//!     .build(store, decoder);
//! pipeline.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod index_loop;
pub mod writer;

pub use builder::PipelineBuilder;
pub use index_loop::{IngestLoop, PassStats};
pub use writer::{WriteBack, WriteReceipt};
