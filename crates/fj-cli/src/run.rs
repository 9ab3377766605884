//! Chunk fan-out, caller-side aggregation, and the cutflow report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use rayon::prelude::*;
use tracing::info;

use fj_core::{ChunkSummary, SkimConfig, config::load_xsecs};
use fj_skim::{Ak8Objects, ParquetSink, Skimmer};

use crate::input;

/// Options of the `skim` subcommand.
pub struct SkimOptions {
    /// Input Parquet files or directories.
    pub inputs: Vec<PathBuf>,
    /// Dataset tag applied to every chunk.
    pub dataset: String,
    /// Output directory.
    pub output_dir: PathBuf,
    /// Optional cross-section table.
    pub xsecs: Option<PathBuf>,
    /// Leading fat jets saved per event.
    pub num_fatjets: usize,
    /// Worker threads (0 = auto).
    pub threads: usize,
}

/// Run the skimmer over every input chunk and write the merged cutflow
/// report.
///
/// Chunks are independent, so they are distributed over a rayon pool with no
/// shared state; the only cross-chunk accumulation is the summary merge done
/// here, after all workers have finished.
pub fn skim(opts: SkimOptions) -> Result<()> {
    let mut config = SkimConfig::default();
    config.num_fatjets = opts.num_fatjets;
    if let Some(path) = &opts.xsecs {
        config.xsecs = load_xsecs(path)
            .with_context(|| format!("loading cross sections from {}", path.display()))?;
    }

    let files = collect_parquet_files(&opts.inputs)?;
    ensure!(!files.is_empty(), "no Parquet inputs found");
    fs::create_dir_all(&opts.output_dir)?;

    let skimmer = Skimmer::new(config)?;
    let sink = ParquetSink::new(&opts.output_dir);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(opts.threads).build()?;
    let summaries: Vec<ChunkSummary> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let chunk = input::read_chunk(path, &opts.dataset)?;
                skimmer.process(&chunk, &Ak8Objects, &sink)
            })
            .collect::<fj_core::Result<Vec<_>>>()
    })?;

    let report = merge_summaries(&summaries);
    let report_path = opts.output_dir.join("cutflows.json");
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!(chunks = summaries.len(), report = %report_path.display(), "skim complete");
    Ok(())
}

/// Expand the inputs into a sorted list of Parquet files, so chunk order (and
/// therefore the merged report) is deterministic.
fn collect_parquet_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in fs::read_dir(input)
                .with_context(|| format!("reading input directory {}", input.display()))?
            {
                let path = entry?.path();
                if is_parquet(&path) {
                    files.push(path);
                }
            }
        } else {
            ensure!(input.is_file(), "input {} does not exist", input.display());
            files.push(input.clone());
        }
    }
    files.sort();
    Ok(files)
}

fn is_parquet(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("parquet")
}

/// Merge per-chunk summaries of one run into the nested
/// `{year: {dataset: {nevents, cutflow, totals}}}` report, summing event
/// yields, cutflow entries, and totals by name.
pub fn merge_summaries(summaries: &[ChunkSummary]) -> serde_json::Value {
    let mut merged: Vec<ChunkSummary> = Vec::new();
    for summary in summaries {
        match merged
            .iter_mut()
            .find(|m| m.year == summary.year && m.dataset == summary.dataset)
        {
            Some(m) => {
                m.nevents += summary.nevents;
                m.cutflow.merge_from(&summary.cutflow);
                for (name, value) in &summary.totals {
                    *m.totals.entry(name.clone()).or_insert(0.0) += value;
                }
            }
            None => merged.push(summary.clone()),
        }
    }

    let mut root = serde_json::Map::new();
    for summary in merged {
        let year = root
            .entry(summary.year)
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let Some(datasets) = year.as_object_mut() {
            datasets.insert(
                summary.dataset,
                serde_json::json!({
                    "nevents": summary.nevents,
                    "cutflow": summary.cutflow,
                    "totals": summary.totals,
                }),
            );
        }
    }
    serde_json::Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fj_core::{Cutflow, Totals};

    fn summary(year: &str, dataset: &str, nevents: f64, all: f64) -> ChunkSummary {
        let mut cutflow = Cutflow::new();
        cutflow.record("all", all);
        let mut totals = Totals::new();
        totals.insert("nevents".to_string(), nevents);
        totals.insert("np_nominal".to_string(), all);
        ChunkSummary { year: year.into(), dataset: dataset.into(), nevents, cutflow, totals }
    }

    #[test]
    fn merge_sums_same_dataset() {
        let report = merge_summaries(&[
            summary("2022", "HHto4B", 6.0, 6.0),
            summary("2022", "HHto4B", 4.0, 3.0),
            summary("2022EE", "HHto4B", 2.0, 2.0),
        ]);
        assert_eq!(report["2022"]["HHto4B"]["nevents"], 10.0);
        assert_eq!(report["2022"]["HHto4B"]["cutflow"]["all"], 9.0);
        assert_eq!(report["2022"]["HHto4B"]["totals"]["np_nominal"], 9.0);
        assert_eq!(report["2022EE"]["HHto4B"]["nevents"], 2.0);
    }

    #[test]
    fn cutflow_order_survives_the_report() {
        let mut cutflow = Cutflow::new();
        cutflow.record("all", 10.0);
        cutflow.record("gen_two_higgs", 7.0);
        let s = ChunkSummary {
            year: "2022".into(),
            dataset: "HHto4B".into(),
            nevents: 10.0,
            cutflow,
            totals: Totals::new(),
        };
        let text = serde_json::to_string(&merge_summaries(&[s])).unwrap();
        let all_pos = text.find("\"all\"").unwrap();
        let gen_pos = text.find("\"gen_two_higgs\"").unwrap();
        assert!(all_pos < gen_pos);
    }

    #[test]
    fn parquet_extension_filter() {
        assert!(is_parquet(Path::new("a/b/part0.parquet")));
        assert!(!is_parquet(Path::new("a/b/part0.json")));
        assert!(!is_parquet(Path::new("a/b/parquet")));
    }
}
