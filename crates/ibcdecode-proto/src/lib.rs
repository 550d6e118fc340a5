//! ibcdecode-proto: protobuf `Any` decoding for IBC payloads.
//!
//! IBC messages travel as `google.protobuf.Any` envelopes. The decoder reads
//! the envelope, resolves its type URL in a [`TypeRegistry`] loaded from a
//! YAML artifact, and renders the message body as JSON.

pub mod decoder;
pub mod loader;
pub mod registry;
pub mod wire;

pub use decoder::{Any, AnyDecoder};
pub use loader::RegistryLoader;
pub use registry::{FieldKind, FieldSpec, RegistryError, TypeEntry, TypeRegistry};
