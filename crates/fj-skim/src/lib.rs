//! # fj-skim
//!
//! Per-chunk event-skimming pipeline: cumulative selection bookkeeping with an
//! auditable cutflow, category-keyed truth-variable dispatch, fixed-width jet
//! projection, trigger extraction, weight computation with cross-section
//! normalization, and final table assembly.
//!
//! The pipeline is a pure function of one [`fj_core::EventChunk`] to one
//! output table plus one [`fj_core::ChunkSummary`]; all state is chunk-local,
//! so chunks can be processed on independent workers with no shared state.
//!
//! ## Example
//!
//! ```no_run
//! use fj_core::{EventChunk, SkimConfig};
//! use fj_skim::{Ak8Objects, ParquetSink, Skimmer};
//!
//! let skimmer = Skimmer::new(SkimConfig::default()).unwrap();
//! let sink = ParquetSink::new("skim_out");
//! let chunk = EventChunk::builder("2022_HHto4B", 0).build().unwrap();
//! let summary = skimmer.process(&chunk, &Ak8Objects, &sink).unwrap();
//! println!("{}", summary.to_record());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gen;
pub mod processor;
pub mod selection;
pub mod sink;
pub mod table;
pub mod variables;
pub mod weights;

pub use gen::GenCategory;
pub use processor::{Ak8Objects, JetCollections, JetObjects, Skimmer};
pub use selection::{SelectionCtx, SelectionSet};
pub use sink::{MemorySink, ParquetSink, TableSink};
pub use table::OutputTable;
pub use variables::pad_val;
pub use weights::{WeightOutput, WeightSet, compute_weights};
