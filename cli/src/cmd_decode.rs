//! `ibcdecode decode <HEX>`: one-shot decode for debugging payloads.

use anyhow::{anyhow, Context, Result};

use ibcdecode_core::config::DecoderConfig;
use ibcdecode_core::decoder::{DecoderSlot, PayloadDecoder};
use ibcdecode_proto::RegistryLoader;

pub fn run(config: &DecoderConfig, input: &str) -> Result<()> {
    let bytes = parse_hex(input)?;

    let mut slot = DecoderSlot::new();
    let decoder = slot
        .get_or_load(&RegistryLoader::new(&config.artifact_path))
        .context("failed to load decoder artifact")?;

    let decoded = decoder
        .decode(&bytes)
        .map_err(|e| anyhow!("decode failed ({} bytes): {e}", bytes.len()))?;
    println!("{}", serde_json::to_string_pretty(decoded.as_json())?);
    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).with_context(|| format!("invalid hex payload: {input:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_optional() {
        assert_eq!(parse_hex("0x0a01").unwrap(), vec![0x0a, 0x01]);
        assert_eq!(parse_hex(" 0A01 ").unwrap(), vec![0x0a, 0x01]);
        assert!(parse_hex("0xzz").is_err());
    }
}
