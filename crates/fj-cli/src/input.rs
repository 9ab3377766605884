//! Parquet chunk ingestion.
//!
//! Reads one pre-converted Parquet file into an [`EventChunk`]. Jagged object
//! branches are `List<Float64>` columns named `<Collection>_<field>`
//! (`FatJet_pt`, `Jet_eta`, `GenPart_pdgId`, ...), trigger decisions are
//! boolean `HLT_<name>` columns, and `genWeight` is a per-event scalar present
//! only for simulation.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, ListArray,
};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use fj_core::{Error, EventChunk, JaggedCol, JaggedTable, Result};

/// Read a Parquet file into Arrow RecordBatches.
fn read_parquet_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;
    let batches: std::result::Result<Vec<_>, _> = reader.collect();
    Ok(batches?)
}

/// Read one chunk file under the given dataset tag.
///
/// The chunk identifier is `<dataset_tag>_<file stem>`, so every input
/// partition maps to a distinct output table.
pub fn read_chunk(path: &Path, dataset_tag: &str) -> Result<EventChunk> {
    let batches = read_parquet_batches(path)?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("chunk");
    let chunk_id = format!("{}_{}", dataset_tag, stem);

    if batches.is_empty() {
        return EventChunk::builder(dataset_tag, 0).chunk_id(chunk_id).build();
    }
    let batch = concat_batches(&batches[0].schema(), batches.iter())?;
    let n = batch.num_rows();

    let mut fat_jets: Vec<(String, JaggedCol)> = Vec::new();
    let mut jets: Vec<(String, JaggedCol)> = Vec::new();
    let mut gen_particles: Vec<(String, JaggedCol)> = Vec::new();
    let mut triggers: HashMap<String, Vec<bool>> = HashMap::new();
    let mut gen_weight: Option<Vec<f64>> = None;

    for (i, field) in batch.schema().fields().iter().enumerate() {
        let name = field.name();
        let column = batch.column(i);
        if name == "genWeight" {
            gen_weight = Some(numeric_values(name, column.as_ref())?);
        } else if let Some(trigger) = name.strip_prefix("HLT_") {
            triggers.insert(trigger.to_string(), boolean_values(name, column.as_ref())?);
        } else if let Some(branch) = name.strip_prefix("FatJet_") {
            fat_jets.push((branch.to_string(), list_to_jagged(name, column.as_ref())?));
        } else if let Some(branch) = name.strip_prefix("GenPart_") {
            gen_particles.push((branch.to_string(), list_to_jagged(name, column.as_ref())?));
        } else if let Some(branch) = name.strip_prefix("Jet_") {
            jets.push((branch.to_string(), list_to_jagged(name, column.as_ref())?));
        } else {
            debug!(branch = %name, "ignoring unrecognized branch");
        }
    }

    let mut builder = EventChunk::builder(dataset_tag, n)
        .chunk_id(chunk_id)
        .fat_jets(JaggedTable::from_fields(n, fat_jets)?)
        .jets(JaggedTable::from_fields(n, jets)?);
    if !gen_particles.is_empty() {
        builder = builder.gen_particles(JaggedTable::from_fields(n, gen_particles)?);
    }
    for (name, decisions) in triggers {
        builder = builder.trigger(name, decisions);
    }
    if let Some(weights) = gen_weight {
        builder = builder.gen_weight(weights);
    }
    builder.build()
}

fn list_to_jagged(name: &str, array: &dyn Array) -> Result<JaggedCol> {
    let list = array.as_any().downcast_ref::<ListArray>().ok_or_else(|| {
        Error::Validation(format!(
            "branch '{}' has type {}, expected a list column",
            name,
            array.data_type()
        ))
    })?;
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(list.len());
    for i in 0..list.len() {
        let values = list.value(i);
        rows.push(numeric_values(name, values.as_ref())?);
    }
    Ok(JaggedCol::from_rows(&rows))
}

fn numeric_values(name: &str, array: &dyn Array) -> Result<Vec<f64>> {
    if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
        return Ok(a.values().to_vec());
    }
    if let Some(a) = array.as_any().downcast_ref::<Float32Array>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = array.as_any().downcast_ref::<Int32Array>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    Err(Error::Validation(format!(
        "branch '{}' has unsupported value type {}",
        name,
        array.data_type()
    )))
}

fn boolean_values(name: &str, array: &dyn Array) -> Result<Vec<bool>> {
    let bools = array.as_any().downcast_ref::<BooleanArray>().ok_or_else(|| {
        Error::Validation(format!(
            "trigger branch '{}' has type {}, expected boolean",
            name,
            array.data_type()
        ))
    })?;
    Ok(bools.iter().map(|v| v.unwrap_or(false)).collect())
}
