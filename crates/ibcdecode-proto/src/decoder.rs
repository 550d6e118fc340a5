//! `Any` envelope decoder.
//!
//! Output shape:
//!
//! ```json
//! {
//!   "type": "MsgUpdateClient",
//!   "typeUrl": "/ibc.core.client.v1.MsgUpdateClient",
//!   "fields": { "clientId": "07-tendermint-0", ... },
//!   "clientMessage": { "typeUrl": "/ibc.lightclients.tendermint.v1.Header", ... }
//! }
//! ```

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use prost::Message;
use serde_json::{Map, Value};

use ibcdecode_core::decoder::{DecodedPayload, PayloadDecoder};
use ibcdecode_core::error::DecodeError;

use crate::registry::{FieldKind, FieldSpec, TypeEntry, TypeRegistry};
use crate::wire::{parse_message, zigzag, WireValue};

/// Nested messages deeper than this are left as base64.
const MAX_DEPTH: usize = 16;

/// `google.protobuf.Any`.
#[derive(Clone, PartialEq, Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Decodes `Any`-wrapped messages against a [`TypeRegistry`].
#[derive(Debug, Clone)]
pub struct AnyDecoder {
    registry: Arc<TypeRegistry>,
}

impl AnyDecoder {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn decode_any(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::new("empty payload"));
        }
        let any = Any::decode(bytes).map_err(|e| DecodeError::new(format!("not an Any envelope: {e}")))?;
        if any.type_url.is_empty() {
            return Err(DecodeError::new("Any envelope has no type URL"));
        }
        let entry = self
            .registry
            .get(&any.type_url)
            .ok_or_else(|| DecodeError::new(format!("unknown type URL '{}'", any.type_url)))?;

        let fields = self.render_fields(Some(entry), &any.value, 0)?;
        let mut out = Map::new();
        out.insert("type".into(), Value::String(entry.name.clone()));
        out.insert("typeUrl".into(), Value::String(any.type_url.clone()));
        if let Some(name) = entry
            .client_message
            .and_then(|tag| entry.field(tag))
            .map(|f| f.name.as_str())
        {
            if let Some(client) = fields.get(name) {
                out.insert("clientMessage".into(), client.clone());
            }
        }
        out.insert("fields".into(), Value::Object(fields));
        Ok(Value::Object(out))
    }

    /// Render a message body. Unnamed fields are keyed by tag number;
    /// repeated occurrences collect into an array.
    fn render_fields(
        &self,
        entry: Option<&TypeEntry>,
        bytes: &[u8],
        depth: usize,
    ) -> Result<Map<String, Value>, DecodeError> {
        let wire = parse_message(bytes).map_err(|e| DecodeError::new(e.to_string()))?;
        let mut out = Map::new();

        for field in wire {
            let spec = entry.and_then(|e| e.field(field.tag));
            let name = spec.map_or_else(|| field.tag.to_string(), |s| s.name.clone());
            let value = self.render_value(spec, &name, field.value, depth)?;

            // Rendered values are never arrays, so an array here is a
            // field already collected.
            let repeated = spec.is_some_and(|s| s.repeated);
            match out.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None if repeated => {
                    out.insert(name, Value::Array(vec![value]));
                }
                None => {
                    out.insert(name, value);
                }
            }
        }
        Ok(out)
    }

    fn render_value(
        &self,
        spec: Option<&FieldSpec>,
        name: &str,
        value: WireValue,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        let kind = spec.map_or(FieldKind::Auto, |s| s.kind);
        let mismatch = |value: &WireValue| {
            DecodeError::new(format!(
                "field '{name}': {kind:?} cannot be read from a {} value",
                value.wire_name()
            ))
        };

        match (kind, value) {
            (FieldKind::Sint, WireValue::Varint(v)) => Ok(Value::from(zigzag(v))),
            (FieldKind::Bool, WireValue::Varint(v)) => Ok(Value::Bool(v != 0)),
            (FieldKind::Auto | FieldKind::Uint, WireValue::Varint(v)) => Ok(Value::from(v)),
            (FieldKind::Auto | FieldKind::Uint, WireValue::Fixed64(v)) => Ok(Value::from(v)),
            (FieldKind::Auto | FieldKind::Uint, WireValue::Fixed32(v)) => Ok(Value::from(v)),

            (FieldKind::String, WireValue::Bytes(b)) => String::from_utf8(b)
                .map(Value::String)
                .map_err(|_| DecodeError::new(format!("field '{name}' is not valid UTF-8"))),
            (FieldKind::Bytes, WireValue::Bytes(b)) => Ok(Value::String(BASE64.encode(b))),
            (FieldKind::Message, WireValue::Bytes(b)) => {
                if depth >= MAX_DEPTH {
                    return Ok(Value::String(BASE64.encode(b)));
                }
                self.render_fields(None, &b, depth + 1).map(Value::Object)
            }
            (FieldKind::Any, WireValue::Bytes(b)) => self.render_nested_any(&b, depth + 1),
            (FieldKind::Auto, WireValue::Bytes(b)) => Ok(self.guess(b, depth)),

            (_, other) => Err(mismatch(&other)),
        }
    }

    /// A nested `Any`: registered types are expanded, others keep their
    /// raw value.
    fn render_nested_any(&self, bytes: &[u8], depth: usize) -> Result<Value, DecodeError> {
        let any = Any::decode(bytes)
            .map_err(|e| DecodeError::new(format!("nested Any: {e}")))?;
        let mut out = Map::new();
        out.insert("typeUrl".into(), Value::String(any.type_url.clone()));

        match self.registry.get(&any.type_url) {
            Some(entry) if depth < MAX_DEPTH => {
                out.insert("type".into(), Value::String(entry.name.clone()));
                let fields = self.render_fields(Some(entry), &any.value, depth)?;
                out.insert("fields".into(), Value::Object(fields));
            }
            _ => {
                out.insert("value".into(), Value::String(BASE64.encode(&any.value)));
            }
        }
        Ok(Value::Object(out))
    }

    fn guess(&self, bytes: Vec<u8>, depth: usize) -> Value {
        if let Ok(s) = std::str::from_utf8(&bytes) {
            if !s.chars().any(char::is_control) {
                return Value::String(s.to_string());
            }
        }
        if depth < MAX_DEPTH {
            if let Ok(fields) = self.render_fields(None, &bytes, depth + 1) {
                if !fields.is_empty() {
                    return Value::Object(fields);
                }
            }
        }
        Value::String(BASE64.encode(bytes))
    }
}

impl PayloadDecoder for AnyDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
        self.decode_any(bytes).map(DecodedPayload::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
types:
  - type_url: /ibc.core.client.v1.MsgUpdateClient
    type: MsgUpdateClient
    client_message: 2
    fields:
      1: { name: clientId, kind: string }
      2: { name: clientMessage, kind: any }
      3: { name: signer, kind: string }
  - type_url: /ibc.lightclients.tendermint.v1.Header
    type: Header
    fields:
      4: { name: trustedHeight, kind: message }
  - type_url: /ibc.core.channel.v1.MsgAcknowledgement
    type: MsgAcknowledgement
    fields:
      2: { name: acknowledgement, kind: bytes }
      9: { name: proofHeights, kind: uint, repeated: true }
"#;

    fn decoder() -> AnyDecoder {
        AnyDecoder::new(TypeRegistry::from_yaml(YAML).unwrap())
    }

    fn any(type_url: &str, value: Vec<u8>) -> Vec<u8> {
        Any {
            type_url: type_url.into(),
            value,
        }
        .encode_to_vec()
    }

    fn string_field(tag: u8, s: &str) -> Vec<u8> {
        let mut out = vec![(tag << 3) | 2, s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn bytes_field(tag: u8, b: &[u8]) -> Vec<u8> {
        let mut out = vec![(tag << 3) | 2, b.len() as u8];
        out.extend_from_slice(b);
        out
    }

    #[test]
    fn update_client_exposes_client_message() {
        // Height { revision_height = 5 } at field 4 of the header.
        let header = bytes_field(4, &[0x10, 0x05]);
        let mut body = string_field(1, "07-tendermint-0");
        body.extend(bytes_field(2, &any("/ibc.lightclients.tendermint.v1.Header", header)));
        body.extend(string_field(3, "tnam1q"));

        let decoded = decoder()
            .decode(&any("/ibc.core.client.v1.MsgUpdateClient", body))
            .unwrap();

        assert_eq!(decoded.type_name(), "MsgUpdateClient");
        assert_eq!(
            decoded.client_type_url(),
            Some("/ibc.lightclients.tendermint.v1.Header")
        );
        assert_eq!(
            decoded.as_json()["fields"]["clientId"],
            json!("07-tendermint-0")
        );
        assert_eq!(
            decoded.as_json()["clientMessage"]["fields"]["trustedHeight"],
            json!({ "2": 5 })
        );
    }

    #[test]
    fn bytes_are_base64_and_repeated_fields_collect() {
        let mut body = bytes_field(2, &[0xff, 0x00]);
        body.extend([0x48, 0x01, 0x48, 0x02]);

        let decoded = decoder()
            .decode(&any("/ibc.core.channel.v1.MsgAcknowledgement", body))
            .unwrap();
        let fields = &decoded.as_json()["fields"];
        assert_eq!(fields["acknowledgement"], json!("/wA="));
        assert_eq!(fields["proofHeights"], json!([1, 2]));
    }

    #[test]
    fn unregistered_field_seen_three_times_stays_flat() {
        let body = vec![0x08, 0x01, 0x08, 0x02, 0x08, 0x03];

        let decoded = decoder()
            .decode(&any("/ibc.core.channel.v1.MsgAcknowledgement", body))
            .unwrap();
        assert_eq!(decoded.as_json()["fields"]["1"], json!([1, 2, 3]));
    }

    #[test]
    fn unknown_type_url() {
        let err = decoder().decode(&any("/cosmos.bank.v1beta1.MsgSend", vec![])).unwrap_err();
        assert_eq!(err.message, "unknown type URL '/cosmos.bank.v1beta1.MsgSend'");
    }

    #[test]
    fn empty_and_garbage_input() {
        assert_eq!(decoder().decode(&[]).unwrap_err().message, "empty payload");
        assert!(decoder()
            .decode(&[0x0a, 0x7f, 0x01])
            .unwrap_err()
            .message
            .starts_with("not an Any envelope"));
    }

    #[test]
    fn declared_kind_must_match_wire() {
        let body = vec![0x08, 0x01]; // varint at the string field
        let err = decoder()
            .decode(&any("/ibc.core.client.v1.MsgUpdateClient", body))
            .unwrap_err();
        assert!(err.message.contains("clientId"));
    }
}
