//! Immutable per-chunk event input.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::jagged::JaggedTable;

/// One chunk of events: the unit of work handed to the skimming pipeline.
///
/// A chunk carries the reconstructed jet collections, the trigger decision
/// map, and (for simulation) the generator weights and the gen-particle table
/// used by truth handlers. Chunks are immutable once built; construct them
/// through [`EventChunk::builder`].
#[derive(Debug, Clone)]
pub struct EventChunk {
    dataset_tag: String,
    chunk_id: String,
    n_events: usize,
    jets: JaggedTable,
    fat_jets: JaggedTable,
    gen_particles: Option<JaggedTable>,
    triggers: HashMap<String, Vec<bool>>,
    gen_weight: Option<Vec<f64>>,
}

impl EventChunk {
    /// Start building a chunk with the given dataset tag
    /// (`"<year>_<dataset-name>"`) and event count.
    pub fn builder(dataset_tag: impl Into<String>, n_events: usize) -> ChunkBuilder {
        let dataset_tag = dataset_tag.into();
        ChunkBuilder {
            chunk_id: dataset_tag.clone(),
            dataset_tag,
            n_events,
            jets: None,
            fat_jets: None,
            gen_particles: None,
            triggers: HashMap::new(),
            gen_weight: None,
        }
    }

    /// Dataset tag, `"<year>_<dataset-name>"`.
    pub fn dataset_tag(&self) -> &str {
        &self.dataset_tag
    }

    /// Identifier for this chunk, used to name its output table. Defaults to
    /// the dataset tag.
    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    /// Number of events in the chunk.
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Small-radius jet collection.
    pub fn jets(&self) -> &JaggedTable {
        &self.jets
    }

    /// Raw fat-jet collection (before object definition).
    pub fn fat_jets(&self) -> &JaggedTable {
        &self.fat_jets
    }

    /// Generator-particle table, present for simulation chunks that carry
    /// truth information.
    pub fn gen_particles(&self) -> Option<&JaggedTable> {
        self.gen_particles.as_ref()
    }

    /// Trigger decisions by name. Absent names are tolerated downstream.
    pub fn trigger(&self, name: &str) -> Option<&[bool]> {
        self.triggers.get(name).map(|v| v.as_slice())
    }

    /// Per-event generator weights; present iff this is a simulation chunk.
    pub fn gen_weight(&self) -> Option<&[f64]> {
        self.gen_weight.as_deref()
    }

    /// A chunk is data exactly when it carries no generator-weight field.
    pub fn is_data(&self) -> bool {
        self.gen_weight.is_none()
    }
}

/// Builder for [`EventChunk`]. Setters are infallible; all length validation
/// happens in [`build`](ChunkBuilder::build).
#[derive(Debug)]
pub struct ChunkBuilder {
    dataset_tag: String,
    chunk_id: String,
    n_events: usize,
    jets: Option<JaggedTable>,
    fat_jets: Option<JaggedTable>,
    gen_particles: Option<JaggedTable>,
    triggers: HashMap<String, Vec<bool>>,
    gen_weight: Option<Vec<f64>>,
}

impl ChunkBuilder {
    /// Override the chunk identifier (e.g. the input partition name).
    pub fn chunk_id(mut self, id: impl Into<String>) -> Self {
        self.chunk_id = id.into();
        self
    }

    /// Set the small-radius jet collection.
    pub fn jets(mut self, table: JaggedTable) -> Self {
        self.jets = Some(table);
        self
    }

    /// Set the raw fat-jet collection.
    pub fn fat_jets(mut self, table: JaggedTable) -> Self {
        self.fat_jets = Some(table);
        self
    }

    /// Set the generator-particle table.
    pub fn gen_particles(mut self, table: JaggedTable) -> Self {
        self.gen_particles = Some(table);
        self
    }

    /// Record one trigger's per-event decisions.
    pub fn trigger(mut self, name: impl Into<String>, decisions: Vec<bool>) -> Self {
        self.triggers.insert(name.into(), decisions);
        self
    }

    /// Set the generator weights, marking the chunk as simulation.
    pub fn gen_weight(mut self, weights: Vec<f64>) -> Self {
        self.gen_weight = Some(weights);
        self
    }

    /// Validate all lengths against the event count and freeze the chunk.
    pub fn build(self) -> Result<EventChunk> {
        let n = self.n_events;
        let jets = self.jets.unwrap_or_else(|| JaggedTable::new(n));
        let fat_jets = self.fat_jets.unwrap_or_else(|| JaggedTable::new(n));

        for (label, table) in [("jets", &jets), ("fat_jets", &fat_jets)] {
            if table.n_events() != n {
                return Err(Error::Validation(format!(
                    "{} table covers {} events, chunk has {}",
                    label,
                    table.n_events(),
                    n
                )));
            }
        }
        if let Some(gp) = &self.gen_particles {
            if gp.n_events() != n {
                return Err(Error::Validation(format!(
                    "gen-particle table covers {} events, chunk has {}",
                    gp.n_events(),
                    n
                )));
            }
        }
        for (name, decisions) in &self.triggers {
            if decisions.len() != n {
                return Err(Error::Validation(format!(
                    "trigger '{}' has {} decisions, chunk has {} events",
                    name,
                    decisions.len(),
                    n
                )));
            }
        }
        if let Some(w) = &self.gen_weight {
            if w.len() != n {
                return Err(Error::Validation(format!(
                    "generator weights cover {} events, chunk has {}",
                    w.len(),
                    n
                )));
            }
        }

        Ok(EventChunk {
            dataset_tag: self.dataset_tag,
            chunk_id: self.chunk_id,
            n_events: n,
            jets,
            fat_jets,
            gen_particles: self.gen_particles,
            triggers: self.triggers,
            gen_weight: self.gen_weight,
        })
    }
}
