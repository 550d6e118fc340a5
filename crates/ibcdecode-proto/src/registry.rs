//! Type registry: maps `Any` type URLs to message names and field layouts.
//!
//! The registry is a YAML artifact:
//!
//! ```yaml
//! types:
//!   - type_url: /ibc.core.client.v1.MsgUpdateClient
//!     type: MsgUpdateClient
//!     client_message: 2
//!     fields:
//!       1: { name: clientId, kind: string }
//!       2: { name: clientMessage, kind: any }
//!       3: { name: signer, kind: string }
//! ```
//!
//! Fields not listed are still decoded, keyed by their tag number.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid registry YAML: {0}")]
    Parse(String),

    #[error("type URL '{0}' is registered twice")]
    DuplicateTypeUrl(String),

    #[error("entry '{0}' has an empty type URL")]
    EmptyTypeUrl(String),

    #[error("{type_url}: client_message tag {tag} is not an `any` field")]
    ClientMessageNotAny { type_url: String, tag: u32 },
}

/// How a field's payload is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Guess from the wire: printable UTF-8 as a string, then a nested
    /// message, then base64.
    #[default]
    Auto,
    String,
    Bytes,
    Uint,
    /// Zig-zag encoded signed varint.
    Sint,
    Bool,
    Message,
    /// A nested `google.protobuf.Any`.
    Any,
}

/// One named field of a registered message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub repeated: bool,
}

/// One registered message type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeEntry {
    pub type_url: String,
    /// Short name reported as the payload's `type`.
    #[serde(rename = "type")]
    pub name: String,
    /// Tag of the field holding the nested client message, if any.
    #[serde(default)]
    pub client_message: Option<u32>,
    #[serde(default)]
    pub fields: BTreeMap<u32, FieldSpec>,
}

impl TypeEntry {
    pub fn field(&self, tag: u32) -> Option<&FieldSpec> {
        self.fields.get(&tag)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    types: Vec<TypeEntry>,
}

/// Read-only lookup table of known message types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry artifact.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            serde_yaml::from_str(yaml).map_err(|e| RegistryError::Parse(e.to_string()))?;
        let mut registry = Self::new();
        for entry in file.types {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Add one entry. Type URLs are matched with or without the leading `/`.
    pub fn register(&mut self, mut entry: TypeEntry) -> Result<(), RegistryError> {
        let url = normalize(&entry.type_url).to_string();
        if url.is_empty() {
            return Err(RegistryError::EmptyTypeUrl(entry.name));
        }
        if let Some(tag) = entry.client_message {
            let is_any = entry.field(tag).is_some_and(|f| f.kind == FieldKind::Any);
            if !is_any {
                return Err(RegistryError::ClientMessageNotAny {
                    type_url: entry.type_url,
                    tag,
                });
            }
        }
        if self.entries.contains_key(&url) {
            return Err(RegistryError::DuplicateTypeUrl(entry.type_url));
        }
        entry.type_url = url.clone();
        self.entries.insert(url, entry);
        Ok(())
    }

    pub fn get(&self, type_url: &str) -> Option<&TypeEntry> {
        self.entries.get(normalize(type_url))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered type URLs, sorted.
    pub fn type_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }
}

fn normalize(type_url: &str) -> &str {
    type_url.trim().trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
types:
  - type_url: /ibc.core.client.v1.MsgUpdateClient
    type: MsgUpdateClient
    client_message: 2
    fields:
      1: { name: clientId, kind: string }
      2: { name: clientMessage, kind: any }
      3: { name: signer, kind: string }
  - type_url: ibc.applications.transfer.v1.MsgTransfer
    type: MsgTransfer
"#;

    #[test]
    fn parses_entries() {
        let registry = TypeRegistry::from_yaml(YAML).unwrap();
        assert_eq!(registry.len(), 2);

        let update = registry.get("/ibc.core.client.v1.MsgUpdateClient").unwrap();
        assert_eq!(update.name, "MsgUpdateClient");
        assert_eq!(update.client_message, Some(2));
        assert_eq!(update.field(2).unwrap().kind, FieldKind::Any);
        assert_eq!(update.field(1).unwrap().kind, FieldKind::String);
    }

    #[test]
    fn leading_slash_is_optional() {
        let registry = TypeRegistry::from_yaml(YAML).unwrap();
        assert!(registry.get("ibc.core.client.v1.MsgUpdateClient").is_some());
        assert!(registry.get("/ibc.applications.transfer.v1.MsgTransfer").is_some());
        assert_eq!(
            registry.type_urls(),
            vec![
                "ibc.applications.transfer.v1.MsgTransfer",
                "ibc.core.client.v1.MsgUpdateClient"
            ]
        );
    }

    #[test]
    fn duplicate_url_rejected() {
        let yaml = r#"
types:
  - { type_url: /a.B, type: B }
  - { type_url: a.B, type: B2 }
"#;
        assert_eq!(
            TypeRegistry::from_yaml(yaml).unwrap_err(),
            RegistryError::DuplicateTypeUrl("a.B".into())
        );
    }

    #[test]
    fn client_message_must_point_at_any() {
        let yaml = r#"
types:
  - type_url: /a.B
    type: B
    client_message: 1
    fields:
      1: { name: header, kind: bytes }
"#;
        assert!(matches!(
            TypeRegistry::from_yaml(yaml),
            Err(RegistryError::ClientMessageNotAny { tag: 1, .. })
        ));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            TypeRegistry::from_yaml("types: [ {"),
            Err(RegistryError::Parse(_))
        ));
    }
}
