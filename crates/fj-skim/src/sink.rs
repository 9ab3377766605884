//! Output-table writers.
//!
//! The pipeline hands each finished [`OutputTable`] to a [`TableSink`]; the
//! Parquet implementation converts it to one Arrow `RecordBatch` and writes
//! `<chunk_id>.parquet`. Width-1 float columns become `Float64`, trigger flags
//! become `Int32`, and wider columns become `FixedSizeList<Float64>`.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, FixedSizeListArray, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use fj_core::{ColumnValues, Result};

use crate::table::OutputTable;

/// Collaborator that persists finished tables.
pub trait TableSink {
    /// Write one chunk's table under the given identifier.
    fn write(&self, chunk_id: &str, table: &OutputTable) -> Result<()>;
}

/// Writes one Parquet file per chunk into an output directory.
pub struct ParquetSink {
    out_dir: PathBuf,
}

impl ParquetSink {
    /// A sink writing into `out_dir` (which must already exist).
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }
}

impl TableSink for ParquetSink {
    fn write(&self, chunk_id: &str, table: &OutputTable) -> Result<()> {
        let batch = table_to_record_batch(table)?;
        let fname = format!("{}.parquet", chunk_id.replace('/', "_"));
        let file = File::create(self.out_dir.join(fname))?;
        let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

/// Convert a table to a single Arrow `RecordBatch`.
pub fn table_to_record_batch(table: &OutputTable) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.n_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_columns());

    for (name, column) in table.columns() {
        match column.values() {
            ColumnValues::Int(values) => {
                fields.push(Field::new(name, DataType::Int32, false));
                arrays.push(Arc::new(Int32Array::from(values.clone())));
            }
            ColumnValues::Float(values) if column.width() == 1 => {
                fields.push(Field::new(name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(values.clone())));
            }
            ColumnValues::Float(values) => {
                let item = Arc::new(Field::new("item", DataType::Float64, false));
                let width = column.width() as i32;
                fields.push(Field::new(
                    name,
                    DataType::FixedSizeList(item.clone(), width),
                    false,
                ));
                let inner: ArrayRef = Arc::new(Float64Array::from(values.clone()));
                arrays.push(Arc::new(FixedSizeListArray::try_new(item, width, inner, None)?));
            }
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Test sink capturing tables in memory.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<Vec<(String, OutputTable)>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, in write order.
    pub fn tables(&self) -> Vec<(String, OutputTable)> {
        self.tables.lock().expect("memory sink poisoned").clone()
    }
}

impl TableSink for MemorySink {
    fn write(&self, chunk_id: &str, table: &OutputTable) -> Result<()> {
        self.tables.lock().expect("memory sink poisoned").push((chunk_id.to_string(), table.clone()));
        Ok(())
    }
}
