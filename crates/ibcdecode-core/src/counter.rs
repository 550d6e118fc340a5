//! Running tally of decode attempts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Process-lifetime accumulator of decode attempts.
///
/// Never reset during a run. Has no failure modes of its own.
#[derive(Debug, Clone, Default)]
pub struct DecodeCounter {
    total: u64,
    decoded: u64,
    failed: u64,
    ibc_types: BTreeMap<String, u64>,
    type_urls: BTreeSet<String>,
    errors: Vec<(String, String)>,
}

impl DecodeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an attempt. Returns the pre-increment total as the attempt's ordinal.
    pub fn begin(&mut self) -> u64 {
        let ordinal = self.total;
        self.total += 1;
        ordinal
    }

    pub fn success(&mut self, type_name: &str, type_url: Option<&str>) {
        *self.ibc_types.entry(type_name.to_string()).or_insert(0) += 1;
        if let Some(url) = type_url {
            self.type_urls.insert(url.to_string());
        }
        self.decoded += 1;
    }

    pub fn failure(&mut self, label: impl Into<String>, error: impl Into<String>) {
        self.errors.push((label.into(), error.into()));
        self.failed += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// `(label, error)` pairs in the order the failures happened.
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total,
            decoded: self.decoded,
            failed: self.failed,
            ibc_types: self.ibc_types.clone(),
            type_urls: self.type_urls.iter().cloned().collect(),
            error_count: self.errors.len(),
        }
    }
}

/// Point-in-time copy of the counter, handed to reporters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub total: u64,
    pub decoded: u64,
    pub failed: u64,
    pub ibc_types: BTreeMap<String, u64>,
    pub type_urls: Vec<String>,
    pub error_count: usize,
}

impl CounterSnapshot {
    /// One-line summary: `decoded 3/4 (1 failed); IBC types: 2; type URLs: 1`.
    pub fn summary(&self) -> String {
        format!(
            "decoded {}/{} ({} failed); IBC types: {}; type URLs: {}",
            self.decoded,
            self.total,
            self.failed,
            self.ibc_types.len(),
            self.type_urls.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_returns_pre_increment_total() {
        let mut counter = DecodeCounter::new();
        assert_eq!(counter.begin(), 0);
        assert_eq!(counter.begin(), 1);
        assert_eq!(counter.total(), 2);
    }

    #[test]
    fn totals_track_outcomes() {
        let mut counter = DecodeCounter::new();
        for i in 0..7 {
            counter.begin();
            if i % 3 == 0 {
                counter.failure(format!("IBC#{i}"), "bad bytes");
            } else {
                counter.success("transfer", None);
            }
        }
        // one attempt started but never resolved
        counter.begin();

        assert_eq!(counter.total(), 8);
        assert_eq!(counter.decoded(), 4);
        assert_eq!(counter.failed(), 3);
        assert_eq!(counter.errors().len(), 3);
        assert_eq!(counter.errors()[0], ("IBC#0".to_string(), "bad bytes".to_string()));
    }

    #[test]
    fn types_and_urls_are_grouped() {
        let mut counter = DecodeCounter::new();
        for (name, url) in [
            ("envelope.client.update", Some("/ibc.lightclients.tendermint.v1.Header")),
            ("envelope.client.update", Some("/ibc.lightclients.tendermint.v1.Header")),
            ("transfer", None),
        ] {
            counter.begin();
            counter.success(name, url);
        }

        let snap = counter.snapshot();
        assert_eq!(snap.ibc_types["envelope.client.update"], 2);
        assert_eq!(snap.ibc_types["transfer"], 1);
        assert_eq!(snap.type_urls, vec!["/ibc.lightclients.tendermint.v1.Header"]);
        assert_eq!(
            snap.summary(),
            "decoded 3/3 (0 failed); IBC types: 2; type URLs: 1"
        );
    }
}
