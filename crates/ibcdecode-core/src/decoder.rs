//! The decoder boundary and its load-once lifecycle.
//!
//! The decoder itself is a black box: bytes in, JSON object or error out.
//! Implementations must be `Send + Sync` so one handle can be shared as
//! `Arc<dyn PayloadDecoder>`.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::error::{DecodeError, LoadError};

/// Structured result of a successful decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload(Value);

impl DecodedPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `type` field, or `"unknown"` if the decoder did not set one.
    pub fn type_name(&self) -> &str {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    /// `clientMessage.typeUrl`, present on client update/misbehaviour messages.
    pub fn client_type_url(&self) -> Option<&str> {
        self.0
            .get("clientMessage")
            .and_then(|m| m.get("typeUrl"))
            .and_then(Value::as_str)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

/// Turns raw payload bytes into a structured value.
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPayload, DecodeError>;
}

/// Blanket impl so closures can be used as decoders.
impl<F> PayloadDecoder for F
where
    F: Fn(&[u8]) -> Result<DecodedPayload, DecodeError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
        self(bytes)
    }
}

/// Produces a decoder from its artifact.
pub trait DecoderLoader {
    /// Human-readable artifact location, for logs.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Arc<dyn PayloadDecoder>, LoadError>;
}

/// Owned holder for the process's single decoder handle.
///
/// Created empty at startup; [`get_or_load`](Self::get_or_load) loads on the
/// first call and hands back the same handle on every later call.
#[derive(Default)]
pub struct DecoderSlot {
    handle: Option<Arc<dyn PayloadDecoder>>,
}

impl DecoderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn get_or_load(
        &mut self,
        loader: &dyn DecoderLoader,
    ) -> Result<Arc<dyn PayloadDecoder>, LoadError> {
        if let Some(handle) = &self.handle {
            return Ok(Arc::clone(handle));
        }
        let handle = loader.load()?;
        info!(artifact = %loader.describe(), "decoder loaded");
        self.handle = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingLoader {
        loads: Cell<u32>,
        fail: bool,
    }

    impl DecoderLoader for CountingLoader {
        fn describe(&self) -> String {
            "test".into()
        }

        fn load(&self) -> Result<Arc<dyn PayloadDecoder>, LoadError> {
            self.loads.set(self.loads.get() + 1);
            if self.fail {
                return Err(LoadError::NotFound {
                    path: "./pkg/missing.yaml".into(),
                });
            }
            let decoder =
                |_: &[u8]| Ok::<_, DecodeError>(DecodedPayload::new(json!({ "type": "noop" })));
            Ok(Arc::new(decoder))
        }
    }

    #[test]
    fn loads_once_and_reuses() {
        let loader = CountingLoader {
            loads: Cell::new(0),
            fail: false,
        };
        let mut slot = DecoderSlot::new();
        assert!(!slot.is_loaded());

        let first = slot.get_or_load(&loader).unwrap();
        let second = slot.get_or_load(&loader).unwrap();

        assert_eq!(loader.loads.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.decode(&[]).unwrap().type_name(), "noop");
    }

    #[test]
    fn failed_load_leaves_slot_empty() {
        let loader = CountingLoader {
            loads: Cell::new(0),
            fail: true,
        };
        let mut slot = DecoderSlot::new();
        assert!(matches!(
            slot.get_or_load(&loader),
            Err(LoadError::NotFound { .. })
        ));
        assert!(!slot.is_loaded());
    }

    #[test]
    fn payload_accessors() {
        let decoded = DecodedPayload::new(json!({
            "type": "envelope.client.update",
            "clientMessage": { "typeUrl": "/ibc.lightclients.tendermint.v1.Header" }
        }));
        assert_eq!(decoded.type_name(), "envelope.client.update");
        assert_eq!(
            decoded.client_type_url(),
            Some("/ibc.lightclients.tendermint.v1.Header")
        );

        let bare = DecodedPayload::new(json!({}));
        assert_eq!(bare.type_name(), "unknown");
        assert_eq!(bare.client_type_url(), None);
    }
}
