//! Opaque application metadata attached to a flow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Application-defined metadata fixed at construction.
///
/// Read-only for the flow's whole lifetime: no setter exists, so the
/// "reassign after construction" misuse is unrepresentable rather than a
/// runtime error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppData(BTreeMap<String, serde_json::Value>);

impl AppData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for AppData {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
