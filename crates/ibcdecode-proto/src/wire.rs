//! Schema-less protobuf wire walker.
//!
//! Splits a message into `(tag, value)` pairs without knowing its type.
//! Interpretation of each value is left to the caller.

use bytes::Buf;
use prost::encoding::{decode_key, decode_varint, WireType};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed protobuf: {0}")]
    Malformed(String),

    #[error("truncated protobuf: field {tag} needs {needed} bytes, {remaining} left")]
    Truncated {
        tag: u32,
        needed: usize,
        remaining: usize,
    },

    #[error("field {tag} uses deprecated group encoding")]
    Group { tag: u32 },
}

impl From<prost::DecodeError> for WireError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// A raw field value, as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(Vec<u8>),
}

impl WireValue {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Varint(_) => "varint",
            Self::Fixed64(_) => "fixed64",
            Self::Fixed32(_) => "fixed32",
            Self::Bytes(_) => "length-delimited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireField {
    pub tag: u32,
    pub value: WireValue,
}

/// Split `bytes` into its fields, in wire order.
pub fn parse_message(bytes: &[u8]) -> Result<Vec<WireField>, WireError> {
    let mut buf = bytes;
    let mut fields = Vec::new();

    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        let value = match wire_type {
            WireType::Varint => WireValue::Varint(decode_varint(&mut buf)?),
            WireType::SixtyFourBit => {
                need(tag, 8, buf.remaining())?;
                WireValue::Fixed64(buf.get_u64_le())
            }
            WireType::ThirtyTwoBit => {
                need(tag, 4, buf.remaining())?;
                WireValue::Fixed32(buf.get_u32_le())
            }
            WireType::LengthDelimited => {
                let len = usize::try_from(decode_varint(&mut buf)?)
                    .map_err(|_| WireError::Malformed(format!("field {tag}: length overflows")))?;
                need(tag, len, buf.remaining())?;
                let value = buf[..len].to_vec();
                buf.advance(len);
                WireValue::Bytes(value)
            }
            WireType::StartGroup | WireType::EndGroup => return Err(WireError::Group { tag }),
        };
        fields.push(WireField { tag, value });
    }

    Ok(fields)
}

fn need(tag: u32, needed: usize, remaining: usize) -> Result<(), WireError> {
    if remaining < needed {
        return Err(WireError::Truncated {
            tag,
            needed,
            remaining,
        });
    }
    Ok(())
}

/// Zig-zag decode a `sint64` varint.
pub fn zigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
