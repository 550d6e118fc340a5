//! Fluent builder API for creating decoder pipelines.
//!
//! # Example
//!
//! ```rust,no_run
//! use ibcdecode_pipeline::PipelineBuilder;
//!
//! let config = PipelineBuilder::new()
//!     .decoder_version("2024.11.1")
//!     .poll_interval_ms(10_000)
//!     .dry_run(false)
//!     .build_config();
//! ```

use std::sync::Arc;

use ibcdecode_core::config::DecoderConfig;
use ibcdecode_core::decoder::PayloadDecoder;
use ibcdecode_core::handler::{OutcomeHandler, TracingReporter};
use ibcdecode_core::store::TransactionStore;

use crate::index_loop::IngestLoop;

/// Fluent builder for `DecoderConfig` and `IngestLoop`.
#[derive(Default)]
pub struct PipelineBuilder {
    config: DecoderConfig,
    handler: Option<Arc<dyn OutcomeHandler>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: DecoderConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    /// Set the version stamped next to every result.
    pub fn decoder_version(mut self, version: impl Into<String>) -> Self {
        self.config.decoder_version = version.into();
        self
    }

    /// Set the pause between passes in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the Code section tag / content type to decode.
    pub fn target_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.target_tag = tag.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn artifact_path(mut self, path: impl Into<String>) -> Self {
        self.config.artifact_path = path.into();
        self
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    /// Replace the default `TracingReporter`.
    pub fn handler(mut self, handler: Arc<dyn OutcomeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the `DecoderConfig`.
    pub fn build_config(self) -> DecoderConfig {
        self.config
    }

    /// Build the loop over `store` with an already-loaded decoder.
    pub fn build<S: TransactionStore>(
        self,
        store: Arc<S>,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> IngestLoop<S> {
        let verbose = self.config.verbose;
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(TracingReporter::new(verbose)));
        IngestLoop::new(self.config, store, decoder, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = PipelineBuilder::new().build_config();
        assert_eq!(cfg.decoder_version, "0");
        assert_eq!(cfg.poll_interval_ms, 5000);
        assert_eq!(cfg.target_tag, "tx_ibc.wasm");
        assert!(cfg.dry_run);
    }

    #[test]
    fn builder_custom() {
        let cfg = PipelineBuilder::new()
            .decoder_version("2024.11.1")
            .poll_interval_ms(250)
            .dry_run(false)
            .verbose(true)
            .artifact_path("/etc/ibc-types.yaml")
            .build_config();

        assert_eq!(cfg.decoder_version, "2024.11.1");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert!(!cfg.dry_run);
        assert!(cfg.verbose);
        assert_eq!(cfg.artifact_path, "/etc/ibc-types.yaml");
    }
}
