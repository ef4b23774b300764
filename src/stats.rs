//! Statistics report type returned by handler/flow stats getters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Read-only bag of statistics entries keyed by stat id.
///
/// An empty report means "no metrics available" — stats getters never signal
/// that condition as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport(HashMap<String, serde_json::Value>);

impl StatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: serde_json::Value) {
        self.0.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        let report = StatsReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
    }

    #[test]
    fn insert_and_get() {
        let mut report = StatsReport::new();
        report.insert("outbound-rtp-1", serde_json::json!({ "packetsSent": 42 }));
        assert_eq!(report.len(), 1);
        assert_eq!(
            report.get("outbound-rtp-1").and_then(|v| v["packetsSent"].as_u64()),
            Some(42)
        );
    }
}
