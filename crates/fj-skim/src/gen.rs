//! Category-keyed dispatch of truth-level variable extraction.
//!
//! Datasets are matched against a closed set of process categories by
//! substring; every matching category's handler runs, in declaration order,
//! and later results override earlier ones on a field-name collision. A
//! multi-category match is legal but surfaced with a warning so overlapping
//! dataset names do not silently mix truth definitions.

use tracing::warn;

use fj_core::{Column, Error, EventChunk, JaggedCol, JaggedTable, Result, config};

use crate::processor::JetCollections;
use crate::selection::SelectionCtx;
use crate::variables::pad_val;

/// Padding sentinel for truth variables of events without a matched particle.
const GEN_FILL: f64 = 0.0;

/// Derived truth variables in emission order.
pub type GenVars = Vec<(String, Column)>;

/// A truth-matching handler: receives the chunk, the defined jet collections,
/// the shared selection context, and the 4-vector field-name convention.
pub type GenHandler = fn(
    &EventChunk,
    &JetCollections,
    &mut SelectionCtx<'_>,
    &[(&str, &str)],
) -> Result<GenVars>;

/// Closed enumeration of truth categories.
///
/// Declaration order is the dispatch order and therefore the override order
/// on field-name collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenCategory {
    /// Z boson decaying to quarks.
    ZToQQ,
    /// Z boson decaying to neutrinos.
    ZToNuNu,
    /// Di-Higgs production with both Higgs decaying to b quarks.
    HHTo4B,
    /// Single Higgs decaying to b quarks.
    HTo2B,
}

impl GenCategory {
    /// Every category, in dispatch order.
    pub const ALL: [GenCategory; 4] =
        [GenCategory::ZToQQ, GenCategory::ZToNuNu, GenCategory::HHTo4B, GenCategory::HTo2B];

    /// Substring key matched against the dataset name.
    pub fn key(self) -> &'static str {
        match self {
            GenCategory::ZToQQ => "Zto2Q",
            GenCategory::ZToNuNu => "Zto2Nu",
            GenCategory::HHTo4B => "HHto4B",
            GenCategory::HTo2B => "Hto2B",
        }
    }

    /// Whether this category applies to the dataset.
    pub fn matches(self, dataset: &str) -> bool {
        dataset.contains(self.key())
    }

    fn handler(self) -> GenHandler {
        match self {
            GenCategory::ZToQQ | GenCategory::ZToNuNu => gen_vars_v,
            GenCategory::HHTo4B => gen_vars_hh4b,
            GenCategory::HTo2B => gen_vars_hbb,
        }
    }
}

/// Run every matching category's handler and merge the results.
///
/// No match yields an empty variable set and registers no selections; this is
/// the normal case for background datasets.
pub fn dispatch(
    dataset: &str,
    chunk: &EventChunk,
    jets: &JetCollections,
    ctx: &mut SelectionCtx<'_>,
) -> Result<GenVars> {
    let matched: Vec<GenCategory> =
        GenCategory::ALL.into_iter().filter(|c| c.matches(dataset)).collect();
    if matched.len() > 1 {
        warn!(
            dataset,
            categories = ?matched,
            "dataset matches multiple truth categories; later results override earlier on field collision"
        );
    }

    let mut merged: GenVars = Vec::new();
    for category in matched {
        let vars = (category.handler())(chunk, jets, ctx, &config::P4)?;
        for (name, column) in vars {
            if let Some(slot) = merged.iter_mut().find(|(n, _)| *n == name) {
                slot.1 = column;
            } else {
                merged.push((name, column));
            }
        }
    }
    Ok(merged)
}

fn gen_table(chunk: &EventChunk) -> Result<&JaggedTable> {
    chunk.gen_particles().ok_or_else(|| {
        Error::Validation("truth matching requires a gen-particle table".into())
    })
}

fn pdg_field(parts: &JaggedTable) -> Result<&JaggedCol> {
    parts
        .field("pdgId")
        .ok_or_else(|| Error::Validation("gen-particle table has no 'pdgId' field".into()))
}

fn is_pdg(value: f64, id: u32) -> bool {
    (value.abs() - id as f64).abs() < 0.5
}

/// Per-event indices of particles passing the PDG predicate.
fn selected_indices(pdg: &JaggedCol, pred: impl Fn(f64) -> bool) -> Vec<Vec<usize>> {
    (0..pdg.n_events())
        .map(|ev| {
            pdg.row(ev)
                .iter()
                .enumerate()
                .filter_map(|(i, &v)| if pred(v) { Some(i) } else { None })
                .collect()
        })
        .collect()
}

/// Project the 4-vector of the picked particles, padded to `width`, under
/// `<prefix><P4 suffix>` names.
fn p4_columns(
    parts: &JaggedTable,
    picks: &[Vec<usize>],
    prefix: &str,
    width: usize,
    p4: &[(&str, &str)],
) -> Result<GenVars> {
    let mut vars = Vec::with_capacity(p4.len());
    for &(source, suffix) in p4 {
        let col = parts.field(source).ok_or_else(|| {
            Error::Validation(format!("gen-particle table has no '{}' field", source))
        })?;
        let rows: Vec<Vec<f64>> = picks
            .iter()
            .enumerate()
            .map(|(ev, idxs)| idxs.iter().map(|&i| col.get(ev, i, GEN_FILL)).collect())
            .collect();
        let jagged = JaggedCol::from_rows(&rows);
        let values = pad_val(&jagged, width, GEN_FILL);
        vars.push((format!("{}{}", prefix, suffix), Column::floats(values, width)?));
    }
    Ok(vars)
}

/// Vector-boson truth variables: the Z 4-vector.
fn gen_vars_v(
    chunk: &EventChunk,
    _jets: &JetCollections,
    _ctx: &mut SelectionCtx<'_>,
    p4: &[(&str, &str)],
) -> Result<GenVars> {
    let parts = gen_table(chunk)?;
    let picks = selected_indices(pdg_field(parts)?, |v| is_pdg(v, 23));
    p4_columns(parts, &picks, "GenV", 1, p4)
}

/// Di-Higgs truth variables: both Higgs 4-vectors and the four b quarks.
/// Registers a truth sanity selection requiring two generator Higgs.
fn gen_vars_hh4b(
    chunk: &EventChunk,
    _jets: &JetCollections,
    ctx: &mut SelectionCtx<'_>,
    p4: &[(&str, &str)],
) -> Result<GenVars> {
    let parts = gen_table(chunk)?;
    let pdg = pdg_field(parts)?;

    let higgs = selected_indices(pdg, |v| is_pdg(v, 25));
    let mask = higgs.iter().map(|h| h.len() >= 2).collect();
    ctx.add_selection("gen_two_higgs", mask)?;

    let mut vars = p4_columns(parts, &higgs, "GenHiggs", 2, p4)?;
    let bs = selected_indices(pdg, |v| is_pdg(v, 5));
    vars.extend(p4_columns(parts, &bs, "Genb", 4, p4)?);
    Ok(vars)
}

/// Single-Higgs truth variables: the Higgs 4-vector and its b quarks.
fn gen_vars_hbb(
    chunk: &EventChunk,
    _jets: &JetCollections,
    _ctx: &mut SelectionCtx<'_>,
    p4: &[(&str, &str)],
) -> Result<GenVars> {
    let parts = gen_table(chunk)?;
    let pdg = pdg_field(parts)?;
    let mut vars = p4_columns(parts, &selected_indices(pdg, |v| is_pdg(v, 25)), "GenHiggs", 1, p4)?;
    vars.extend(p4_columns(parts, &selected_indices(pdg, |v| is_pdg(v, 5)), "Genb", 2, p4)?);
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fj_core::JaggedTable;

    fn gen_parts(rows: &[Vec<(f64, f64)>]) -> JaggedTable {
        // (pdgId, pt) pairs; eta/phi/mass derived from pt for brevity.
        let pdg: Vec<Vec<f64>> =
            rows.iter().map(|r| r.iter().map(|&(id, _)| id).collect()).collect();
        let pt: Vec<Vec<f64>> = rows.iter().map(|r| r.iter().map(|&(_, p)| p).collect()).collect();
        let eta: Vec<Vec<f64>> =
            rows.iter().map(|r| r.iter().map(|&(_, p)| p / 100.0).collect()).collect();
        JaggedTable::from_fields(
            rows.len(),
            vec![
                ("pdgId".to_string(), JaggedCol::from_rows(&pdg)),
                ("pt".to_string(), JaggedCol::from_rows(&pt)),
                ("eta".to_string(), JaggedCol::from_rows(&eta)),
                ("phi".to_string(), JaggedCol::from_rows(&eta)),
                ("mass".to_string(), JaggedCol::from_rows(&eta)),
            ],
        )
        .unwrap()
    }

    fn sim_chunk(dataset_tag: &str, rows: &[Vec<(f64, f64)>]) -> EventChunk {
        EventChunk::builder(dataset_tag, rows.len())
            .gen_particles(gen_parts(rows))
            .gen_weight(vec![1.0; rows.len()])
            .build()
            .unwrap()
    }

    fn collections(n: usize) -> JetCollections {
        JetCollections { jets: JaggedTable::new(n), fat_jets: JaggedTable::new(n) }
    }

    #[test]
    fn category_keys_match_substrings() {
        assert!(GenCategory::HHTo4B.matches("GluGlutoHHto4B_kl-1p00"));
        assert!(!GenCategory::HHTo4B.matches("QCD_HT-1000"));
        assert!(GenCategory::ZToQQ.matches("Zto2Q_PT-200"));
    }

    #[test]
    fn no_match_yields_empty_set() {
        let chunk = sim_chunk("2022_QCD_HT-1000", &[vec![(1.0, 10.0)]]);
        let mut ctx = SelectionCtx::new(1, chunk.gen_weight());
        let vars = dispatch("QCD_HT-1000", &chunk, &collections(1), &mut ctx).unwrap();
        assert!(vars.is_empty());
        assert!(ctx.selections.is_empty());
    }

    #[test]
    fn hh4b_handler_runs_alone() {
        // Scenario: dataset matches only the di-Higgs category.
        let rows = vec![
            vec![(25.0, 300.0), (25.0, 250.0), (5.0, 80.0), (-5.0, 70.0), (5.0, 60.0), (-5.0, 50.0)],
            vec![(25.0, 400.0), (5.0, 90.0)],
        ];
        let chunk = sim_chunk("2022_GluGlutoHHto4B", &rows);
        let mut ctx = SelectionCtx::new(2, chunk.gen_weight());
        let vars = dispatch("GluGlutoHHto4B", &chunk, &collections(2), &mut ctx).unwrap();

        let names: Vec<&str> = vars.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "GenHiggsPt", "GenHiggsEta", "GenHiggsPhi", "GenHiggsMass",
                "GenbPt", "GenbEta", "GenbPhi", "GenbMass",
            ]
        );

        let higgs_pt = &vars[0].1;
        assert_eq!(higgs_pt.width(), 2);
        assert_eq!(higgs_pt.float_row(0).unwrap(), &[300.0, 250.0]);
        // Event with one Higgs is padded.
        assert_eq!(higgs_pt.float_row(1).unwrap(), &[400.0, 0.0]);

        // The handler registered its truth sanity selection.
        assert_eq!(ctx.selections.names(), &["gen_two_higgs".to_string()]);
        assert_eq!(ctx.cutflow.get("gen_two_higgs"), Some(1.0));
    }

    #[test]
    fn multi_match_merges_without_duplicates() {
        let rows = vec![vec![(23.0, 500.0)]];
        let chunk = sim_chunk("2022_Zto2Q_Zto2Nu_mix", &rows);
        let mut ctx = SelectionCtx::new(1, chunk.gen_weight());
        let vars = dispatch("Zto2Q_Zto2Nu_mix", &chunk, &collections(1), &mut ctx).unwrap();
        // Both V categories match and emit the same fields; the merge keeps one
        // copy of each.
        let names: Vec<&str> = vars.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["GenVPt", "GenVEta", "GenVPhi", "GenVMass"]);
        assert_eq!(vars[0].1.float_row(0).unwrap(), &[500.0]);
    }

    #[test]
    fn antiparticles_are_picked_up() {
        let rows = vec![vec![(25.0, 300.0), (-5.0, 80.0), (5.0, 70.0)]];
        let chunk = sim_chunk("2022_GluGluHto2B", &rows);
        let mut ctx = SelectionCtx::new(1, chunk.gen_weight());
        let vars = dispatch("GluGluHto2B", &chunk, &collections(1), &mut ctx).unwrap();
        let b_pt = vars.iter().find(|(n, _)| n == "GenbPt").unwrap();
        assert_eq!(b_pt.1.float_row(0).unwrap(), &[80.0, 70.0]);
    }

    #[test]
    fn missing_gen_table_is_fatal_for_matched_category() {
        let chunk = EventChunk::builder("2022_Hto2B", 1).gen_weight(vec![1.0]).build().unwrap();
        let mut ctx = SelectionCtx::new(1, chunk.gen_weight());
        assert!(dispatch("Hto2B", &chunk, &collections(1), &mut ctx).is_err());
    }
}
