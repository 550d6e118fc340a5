//! Content-index correlator: maps decoded payload bytes back to a content slot.
//!
//! Sections and content are two encodings of the same batch: every batch
//! entry contributes one `Code` section (followed by its `Data`) and one
//! content entry, in the same order. The content index of a payload is
//! therefore the number of `Code` sections seen before its `Data` section,
//! minus one. Every `Code` section advances the count, whatever its tag:
//!
//! ```text
//! sections: Code(other) Data(A) Code(ibc) Data(B) Code(ibc) Data(C)
//! count:         0                  1                  2
//! content:  [other,               ibc,               ibc]
//! B → 1
//! ```
//!
//! The resolved entry must carry the target type; anything else means the two
//! views disagree and the row must not be written.

use crate::error::CorrelationError;
use crate::types::{ContentEntry, Section, TransactionRow};

/// Resolves content indices for one target protocol.
#[derive(Debug, Clone)]
pub struct ContentCorrelator {
    target: String,
}

impl ContentCorrelator {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Replay the section list and return the content index of the first
    /// `Data` section whose bytes equal `payload`.
    pub fn locate(&self, sections: &[Section], payload: &[u8]) -> Result<usize, CorrelationError> {
        self.locate_matching(sections, payload, None)
    }

    /// Like [`locate`](Self::locate), but when several `Data` sections carry
    /// the same bytes the one at `section_index` wins. Falls back to the first
    /// match if the section at `section_index` holds different bytes.
    pub fn locate_at(
        &self,
        sections: &[Section],
        payload: &[u8],
        section_index: usize,
    ) -> Result<usize, CorrelationError> {
        self.locate_matching(sections, payload, Some(section_index))
    }

    fn locate_matching(
        &self,
        sections: &[Section],
        payload: &[u8],
        preferred: Option<usize>,
    ) -> Result<usize, CorrelationError> {
        let encoded = hex::encode(payload);
        let mut code_count: Option<usize> = None;
        let mut first: Option<Result<usize, CorrelationError>> = None;

        for (section_index, section) in sections.iter().enumerate() {
            if section.is_code() {
                code_count = Some(code_count.map_or(0, |n| n + 1));
                continue;
            }
            let matches = section
                .data_hex()
                .is_some_and(|data| data.eq_ignore_ascii_case(&encoded));
            if !matches {
                continue;
            }
            let resolved = code_count.ok_or(CorrelationError::DataBeforeCode { section_index });
            match preferred {
                None => return resolved,
                Some(wanted) if wanted == section_index => return resolved,
                Some(_) if first.is_none() => first = Some(resolved),
                Some(_) => {}
            }
        }

        first.unwrap_or(Err(CorrelationError::NoMatch {
            bytes: payload.len(),
        }))
    }

    /// Check that `content[index]` exists and is of the target type.
    pub fn verify(&self, content: &[ContentEntry], index: usize) -> Result<(), CorrelationError> {
        let entry = content.get(index).ok_or(CorrelationError::MissingContent {
            index,
            len: content.len(),
        })?;
        if entry.kind != self.target {
            return Err(CorrelationError::TypeMismatch {
                index,
                expected: self.target.clone(),
                found: entry.kind.clone(),
            });
        }
        Ok(())
    }

    /// Content index of the Data section at `section_index`, by position alone.
    /// Used for payloads that never produced bytes to match on.
    pub fn locate_section(
        &self,
        sections: &[Section],
        section_index: usize,
    ) -> Result<usize, CorrelationError> {
        let code_count = sections
            .iter()
            .take(section_index)
            .filter(|s| s.is_code())
            .count();
        code_count
            .checked_sub(1)
            .ok_or(CorrelationError::DataBeforeCode { section_index })
    }

    /// [`locate`](Self::locate) then [`verify`](Self::verify) against a row.
    pub fn correlate(&self, row: &TransactionRow, payload: &[u8]) -> Result<usize, CorrelationError> {
        let index = self.locate(&row.sections, payload)?;
        self.verify(&row.content, index)?;
        Ok(index)
    }

    /// [`locate_at`](Self::locate_at) then [`verify`](Self::verify).
    pub fn correlate_at(
        &self,
        row: &TransactionRow,
        payload: &[u8],
        section_index: usize,
    ) -> Result<usize, CorrelationError> {
        let index = self.locate_at(&row.sections, payload, section_index)?;
        self.verify(&row.content, index)?;
        Ok(index)
    }

    /// [`locate_section`](Self::locate_section) then [`verify`](Self::verify).
    pub fn correlate_section(
        &self,
        row: &TransactionRow,
        section_index: usize,
    ) -> Result<usize, CorrelationError> {
        let index = self.locate_section(&row.sections, section_index)?;
        self.verify(&row.content, index)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IBC_TX_TAG;

    fn row(sections: Vec<Section>, content: &[&str]) -> TransactionRow {
        TransactionRow {
            block_height: 1,
            tx_hash: "0xabc".into(),
            sections,
            content: content.iter().map(|k| ContentEntry::new(*k)).collect(),
        }
    }

    fn mixed_row() -> TransactionRow {
        row(
            vec![
                Section::code("tx_transfer.wasm"),
                Section::data(b"A"),
                Section::code(IBC_TX_TAG),
                Section::data(b"B"),
                Section::code(IBC_TX_TAG),
                Section::data(b"C"),
            ],
            &["tx_transfer.wasm", IBC_TX_TAG, IBC_TX_TAG],
        )
    }

    #[test]
    fn counts_every_code_section() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let row = mixed_row();
        assert_eq!(correlator.correlate(&row, b"B"), Ok(1));
        assert_eq!(correlator.correlate(&row, b"C"), Ok(2));
    }

    #[test]
    fn same_input_same_index() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let row = mixed_row();
        let first = correlator.correlate(&row, b"C");
        let second = correlator.correlate(&row, b"C");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_payload_is_no_match() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        assert_eq!(
            correlator.correlate(&mixed_row(), b"Z"),
            Err(CorrelationError::NoMatch { bytes: 1 })
        );
    }

    #[test]
    fn non_target_slot_is_type_mismatch() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        assert_eq!(
            correlator.correlate(&mixed_row(), b"A"),
            Err(CorrelationError::TypeMismatch {
                index: 0,
                expected: IBC_TX_TAG.into(),
                found: "tx_transfer.wasm".into(),
            })
        );
    }

    #[test]
    fn content_shorter_than_sections() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let short = row(
            vec![
                Section::code(IBC_TX_TAG),
                Section::data(b"A"),
                Section::code(IBC_TX_TAG),
                Section::data(b"B"),
            ],
            &[IBC_TX_TAG],
        );
        assert_eq!(
            correlator.correlate(&short, b"B"),
            Err(CorrelationError::MissingContent { index: 1, len: 1 })
        );
    }

    #[test]
    fn data_ahead_of_any_code() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let sections = vec![Section::data(b"A"), Section::code(IBC_TX_TAG)];
        assert_eq!(
            correlator.locate(&sections, b"A"),
            Err(CorrelationError::DataBeforeCode { section_index: 0 })
        );
    }

    #[test]
    fn hex_comparison_ignores_case_and_prefix() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let sections = vec![
            Section::code(IBC_TX_TAG),
            Section::Data {
                data: Some("0xCAFE".into()),
            },
        ];
        assert_eq!(correlator.locate(&sections, &[0xca, 0xfe]), Ok(0));
    }

    #[test]
    fn position_agrees_with_bytes() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let row = mixed_row();
        assert_eq!(correlator.correlate_section(&row, 3), correlator.correlate(&row, b"B"));
        assert_eq!(correlator.correlate_section(&row, 5), Ok(2));
        assert_eq!(
            correlator.locate_section(&row.sections, 0),
            Err(CorrelationError::DataBeforeCode { section_index: 0 })
        );
    }

    #[test]
    fn repeated_bytes_resolve_by_section() {
        let correlator = ContentCorrelator::new(IBC_TX_TAG);
        let twins = row(
            vec![
                Section::code(IBC_TX_TAG),
                Section::data(&[0x01, 0x58]),
                Section::code(IBC_TX_TAG),
                Section::data(&[0x01, 0x58]),
            ],
            &[IBC_TX_TAG, IBC_TX_TAG],
        );
        assert_eq!(correlator.correlate(&twins, &[0x01, 0x58]), Ok(0));
        assert_eq!(correlator.correlate_at(&twins, &[0x01, 0x58], 1), Ok(0));
        assert_eq!(correlator.correlate_at(&twins, &[0x01, 0x58], 3), Ok(1));
        // section 2 is a Code section, so the first match stands
        assert_eq!(correlator.correlate_at(&twins, &[0x01, 0x58], 2), Ok(0));
        assert_eq!(
            correlator.correlate_at(&twins, &[0x02], 3),
            Err(CorrelationError::NoMatch { bytes: 1 })
        );
    }
}
