//! Section scanner: finds target payloads in a transaction's section list.
//!
//! A payload is a `Data` section that immediately follows a `Code` section
//! tagged with the target marker:
//!
//! ```text
//! Code(tx_ibc.wasm)  Data(..)   ← yielded
//! Code(other)        Data(..)   ← skipped
//! Data(..)                      ← skipped, nothing before it
//! ```
//!
//! Single left-to-right pass, no lookahead. To scan again, build a new
//! scanner from the stored row.

use std::iter::Enumerate;
use std::slice::Iter;

use thiserror::Error;

use crate::types::Section;

/// Raw bytes of one target payload and where they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPayload {
    pub section_index: usize,
    pub bytes: Vec<u8>,
}

/// A Data section in payload position whose contents could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Data section {section_index} carries no data")]
    MissingData { section_index: usize },

    #[error("Data section {section_index} is not valid hex: {reason}")]
    InvalidHex { section_index: usize, reason: String },
}

impl ScanError {
    pub fn section_index(&self) -> usize {
        match self {
            Self::MissingData { section_index } | Self::InvalidHex { section_index, .. } => {
                *section_index
            }
        }
    }
}

/// Lazy iterator over the target payloads of a section list.
pub struct SectionScanner<'a> {
    sections: Enumerate<Iter<'a, Section>>,
    target: &'a str,
    next_is_target: bool,
}

impl<'a> SectionScanner<'a> {
    pub fn new(sections: &'a [Section], target: &'a str) -> Self {
        Self {
            sections: sections.iter().enumerate(),
            target,
            next_is_target: false,
        }
    }
}

impl Iterator for SectionScanner<'_> {
    type Item = Result<ScannedPayload, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (section_index, section) in self.sections.by_ref() {
            let in_payload_position = self.next_is_target;
            self.next_is_target = section.is_code_tagged(self.target);

            if !in_payload_position {
                continue;
            }
            if let Section::Data { .. } = section {
                let Some(data) = section.data_hex() else {
                    return Some(Err(ScanError::MissingData { section_index }));
                };
                return Some(
                    hex::decode(data)
                        .map(|bytes| ScannedPayload {
                            section_index,
                            bytes,
                        })
                        .map_err(|e| ScanError::InvalidHex {
                            section_index,
                            reason: e.to_string(),
                        }),
                );
            }
        }
        None
    }
}
