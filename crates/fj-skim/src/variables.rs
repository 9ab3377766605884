//! Fixed-width jet projections and trigger-decision extraction.

use fj_core::{Column, Error, EventChunk, JaggedCol, JaggedTable, Result, SkimConfig};

/// Project a jagged column to exactly `width` entries per event, padding with
/// `fill` and truncating past `width`. Entry order is preserved from the
/// upstream collection; no re-sorting happens here.
///
/// Returns row-major values of shape events x `width`.
pub fn pad_val(col: &JaggedCol, width: usize, fill: f64) -> Vec<f64> {
    let n = col.n_events();
    let mut out = Vec::with_capacity(n * width);
    for row in 0..n {
        for index in 0..width {
            out.push(col.get(row, index, fill));
        }
    }
    out
}

/// Fat-jet skim columns: one `ak8FatJet<output>` column of width
/// `num_fatjets` per configured `(source, output)` pair.
pub fn fatjet_columns(
    fat_jets: &JaggedTable,
    config: &SkimConfig,
) -> Result<Vec<(String, Column)>> {
    let mut columns = Vec::with_capacity(config.fatjet_skim_vars.len());
    for (source, output) in &config.fatjet_skim_vars {
        let col = fat_jets.field(source).ok_or_else(|| {
            Error::Validation(format!("fat-jet collection has no field '{}'", source))
        })?;
        let values = pad_val(col, config.num_fatjets, config.pad_value);
        columns.push((format!("ak8FatJet{}", output), Column::floats(values, config.num_fatjets)?));
    }
    Ok(columns)
}

/// Trigger decision columns for the enumerated menu: present triggers cast to
/// 0/1, absent triggers emitted as all-zero so the output schema is stable
/// across eras with different menus.
pub fn trigger_columns(chunk: &EventChunk, triggers: &[String]) -> Vec<(String, Column)> {
    let n = chunk.n_events();
    triggers
        .iter()
        .map(|name| {
            let flags = match chunk.trigger(name) {
                Some(decisions) => decisions.iter().map(|&b| i32::from(b)).collect(),
                None => vec![0; n],
            };
            (name.clone(), Column::flags(flags))
        })
        .collect()
}
