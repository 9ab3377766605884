//! Insertion-ordered cutflow bookkeeping and per-chunk summaries.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Ordered record of event counts surviving each successive selection.
///
/// Entries keep their registration order as a structural guarantee, so the
/// cutflow serializes reproducibly regardless of the host map type. Values are
/// cumulative: each entry reflects the AND of all selections registered up to
/// that point (raw counts for data, weighted sums for simulation), so the
/// sequence is monotonically non-increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cutflow {
    entries: Vec<(String, f64)>,
}

impl Cutflow {
    /// An empty cutflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a count under `name`. Re-recording an existing name updates it
    /// in place without disturbing the order.
    pub fn record(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Look up a recorded count.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Add another chunk's counts into this one, summing by name. Names unseen
    /// so far are appended in the other cutflow's order.
    pub fn merge_from(&mut self, other: &Cutflow) {
        for (name, value) in other.iter() {
            if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
                entry.1 += value;
            } else {
                self.entries.push((name.to_string(), value));
            }
        }
    }
}

impl Serialize for Cutflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Per-chunk scalar totals (normalization-preserving weight sums and the raw
/// event yield), summed across chunks by the caller.
pub type Totals = BTreeMap<String, f64>;

/// Result of processing one chunk, returned to the caller for cross-chunk
/// aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    /// Data-taking year parsed from the dataset tag.
    pub year: String,
    /// Dataset name (the tag without its year prefix).
    pub dataset: String,
    /// Raw event count (data) or generator-weight sum (simulation).
    pub nevents: f64,
    /// Cumulative selection counts in registration order.
    pub cutflow: Cutflow,
    /// Normalization totals for postprocessing.
    pub totals: Totals,
}

impl ChunkSummary {
    /// The nested `{year: {dataset: {"nevents": .., "cutflow": {..}}}}`
    /// summary record.
    pub fn to_record(&self) -> serde_json::Value {
        let inner = serde_json::json!({
            "nevents": self.nevents,
            "cutflow": &self.cutflow,
        });
        let mut dataset = serde_json::Map::new();
        dataset.insert(self.dataset.clone(), inner);
        let mut year = serde_json::Map::new();
        year.insert(self.year.clone(), serde_json::Value::Object(dataset));
        serde_json::Value::Object(year)
    }
}
