//! Per-event weight computation with normalization-preserving totals.

use fj_core::{Column, Error, Result, Totals};

/// Named per-event weight components with full and partial products.
///
/// Currently seeded with the generator weight only; additional components
/// (pileup, scale factors, ...) multiply into the nominal product as they are
/// added.
#[derive(Debug, Clone)]
pub struct WeightSet {
    n_events: usize,
    components: Vec<(String, Vec<f64>)>,
}

impl WeightSet {
    /// An empty set for `n_events` events.
    pub fn new(n_events: usize) -> Self {
        Self { n_events, components: Vec::new() }
    }

    /// Register a weight component.
    pub fn add(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.n_events {
            return Err(Error::Validation(format!(
                "weight component '{}' covers {} events, expected {}",
                name,
                values.len(),
                self.n_events
            )));
        }
        if self.components.iter().any(|(n, _)| *n == name) {
            return Err(Error::Validation(format!("weight component '{}' added twice", name)));
        }
        self.components.push((name, values));
        Ok(())
    }

    /// Registered component names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(n, _)| n.as_str())
    }

    /// Product of every registered component (all-ones when none).
    pub fn weight(&self) -> Vec<f64> {
        let mut product = vec![1.0; self.n_events];
        for (_, values) in &self.components {
            for (p, &v) in product.iter_mut().zip(values) {
                *p *= v;
            }
        }
        product
    }

    /// Product restricted to the named components. Unknown names are an
    /// error so a misspelled normalization-preserving list cannot silently
    /// drop a component.
    pub fn partial_weight(&self, include: &[String]) -> Result<Vec<f64>> {
        let mut product = vec![1.0; self.n_events];
        for name in include {
            let values = self
                .components
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    Error::Validation(format!("unknown weight component '{}'", name))
                })?;
            for (p, &v) in product.iter_mut().zip(values) {
                *p *= v;
            }
        }
        Ok(product)
    }
}

/// Output of the weight engine: the weight columns to merge into the table
/// and the normalization totals to return to the caller.
#[derive(Debug)]
pub struct WeightOutput {
    /// `weight` (normalized nominal) and `weight_noxsec` (un-normalized
    /// nominal), in that order.
    pub columns: Vec<(String, Column)>,
    /// `np_nominal`: the norm-preserving product summed over the gen-selected
    /// mask, for global renormalization in postprocessing.
    pub totals: Totals,
}

/// Compute the simulation weight columns for one chunk.
///
/// `gen_selected` is the AND of all selections registered before weighting
/// (all-true if none). `norm_factor` is the per-(year, dataset) cross-section
/// normalization; the absolute scale still depends on the summed
/// `np_nominal` totals across all chunks, which is postprocessing's job.
/// The un-normalized nominal is preserved as `weight_noxsec` so
/// postprocessing can verify the factor was applied exactly once.
pub fn compute_weights(
    gen_weights: &[f64],
    gen_selected: &[bool],
    norm_factor: f64,
    norm_preserving: &[String],
) -> Result<WeightOutput> {
    if gen_selected.len() != gen_weights.len() {
        return Err(Error::Validation(format!(
            "gen-selected mask covers {} events, weights cover {}",
            gen_selected.len(),
            gen_weights.len()
        )));
    }

    let mut weights = WeightSet::new(gen_weights.len());
    weights.add("genweight", gen_weights.to_vec())?;

    let nominal = weights.weight();

    let weight_np = weights.partial_weight(norm_preserving)?;
    let np_nominal: f64 = weight_np
        .iter()
        .zip(gen_selected)
        .filter_map(|(&w, &keep)| if keep { Some(w) } else { None })
        .sum();
    let mut totals = Totals::new();
    totals.insert("np_nominal".to_string(), np_nominal);

    let mut variants = vec![("weight".to_string(), nominal.clone())];
    for (_, values) in &mut variants {
        for v in values.iter_mut() {
            *v *= norm_factor;
        }
    }
    // weight_noxsec must not pick up the normalization factor.
    variants.push(("weight_noxsec".to_string(), nominal));

    let columns =
        variants.into_iter().map(|(name, v)| (name, Column::scalar_floats(v))).collect();
    Ok(WeightOutput { columns, totals })
}
