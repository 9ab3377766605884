//! Cumulative selection bookkeeping with an auditable cutflow.

use fj_core::{Cutflow, Error, Result};

/// Named boolean selection masks in registration order.
///
/// The combined mask is the pointwise AND of every registered mask, which is
/// order-independent; only the intermediate cutflow values depend on the
/// registration order, so callers must register selections in a fixed,
/// deterministic order to keep cutflows reproducible.
#[derive(Debug, Clone)]
pub struct SelectionSet {
    n_events: usize,
    names: Vec<String>,
    masks: Vec<Vec<bool>>,
}

impl SelectionSet {
    /// An empty set sized to the chunk.
    pub fn new(n_events: usize) -> Self {
        Self { n_events, names: Vec::new(), masks: Vec::new() }
    }

    /// Names of registered selections, in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether no selection has been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn add(&mut self, name: &str, mask: Vec<bool>) -> Result<()> {
        if mask.len() != self.n_events {
            return Err(Error::Validation(format!(
                "selection '{}' covers {} events, chunk has {}",
                name,
                mask.len(),
                self.n_events
            )));
        }
        if self.names.iter().any(|n| n == name) {
            return Err(Error::Validation(format!("selection '{}' registered twice", name)));
        }
        self.names.push(name.to_string());
        self.masks.push(mask);
        Ok(())
    }

    /// AND of every registered mask; all-true of chunk size when none is
    /// registered.
    pub fn all(&self) -> Vec<bool> {
        let mut combined = vec![true; self.n_events];
        for mask in &self.masks {
            for (c, &m) in combined.iter_mut().zip(mask) {
                *c &= m;
            }
        }
        combined
    }

    /// AND of the named masks. Unknown names are an error.
    pub fn all_of(&self, names: &[&str]) -> Result<Vec<bool>> {
        let mut combined = vec![true; self.n_events];
        for name in names {
            let idx = self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| Error::Validation(format!("unknown selection '{}'", name)))?;
            for (c, &m) in combined.iter_mut().zip(&self.masks[idx]) {
                *c &= m;
            }
        }
        Ok(combined)
    }
}

/// Shared selection context threaded through the pipeline: the selection set,
/// the chunk's cutflow, and the weighting mode.
///
/// This is the one place selections are registered, so every registration
/// lands in the cutflow with the cumulative count semantics.
#[derive(Debug)]
pub struct SelectionCtx<'a> {
    /// Registered selections.
    pub selections: SelectionSet,
    /// Cumulative counts in registration order.
    pub cutflow: Cutflow,
    is_data: bool,
    gen_weights: Option<&'a [f64]>,
}

impl<'a> SelectionCtx<'a> {
    /// A fresh context for one chunk. `gen_weights` must be present iff the
    /// chunk is simulation.
    pub fn new(n_events: usize, gen_weights: Option<&'a [f64]>) -> Self {
        Self {
            selections: SelectionSet::new(n_events),
            cutflow: Cutflow::new(),
            is_data: gen_weights.is_none(),
            gen_weights,
        }
    }

    /// Whether this chunk is data.
    pub fn is_data(&self) -> bool {
        self.is_data
    }

    /// Register `mask` under `name` and record the cumulative count: the AND
    /// of all selections registered so far, counted raw for data or as the
    /// generator-weight sum for simulation.
    pub fn add_selection(&mut self, name: &str, mask: Vec<bool>) -> Result<()> {
        self.selections.add(name, mask)?;
        let combined = self.selections.all();
        let value = match self.gen_weights {
            None => combined.iter().filter(|&&b| b).count() as f64,
            Some(weights) => combined
                .iter()
                .zip(weights)
                .filter_map(|(&keep, &w)| if keep { Some(w) } else { None })
                .sum(),
        };
        self.cutflow.record(name, value);
        Ok(())
    }
}
