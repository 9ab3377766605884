//! Per-chunk orchestration: object definition, variable derivation, weights,
//! and table assembly.

use tracing::debug;

use fj_core::{
    ChunkSummary, Column, Cutflow, Error, EventChunk, JaggedCol, JaggedTable, Result, SkimConfig,
    Totals,
};

use crate::gen;
use crate::selection::SelectionCtx;
use crate::sink::TableSink;
use crate::table::OutputTable;
use crate::variables;
use crate::weights;

/// The defined jet collections handed to the variable-derivation stages.
#[derive(Debug, Clone)]
pub struct JetCollections {
    /// Small-radius jets.
    pub jets: JaggedTable,
    /// Analysis fat jets, including derived substructure ratios.
    pub fat_jets: JaggedTable,
}

/// Object-definition collaborator: turns the raw chunk collections into the
/// analysis-level ones.
pub trait JetObjects {
    /// Produce the jet collections for one chunk.
    fn collections(&self, chunk: &EventChunk) -> Result<JetCollections>;
}

/// Default object definition for AK8 fat jets: passes the raw fields through
/// and derives the tau21/tau32 substructure ratios when the tau fields are
/// present.
pub struct Ak8Objects;

impl JetObjects for Ak8Objects {
    fn collections(&self, chunk: &EventChunk) -> Result<JetCollections> {
        let raw = chunk.fat_jets();
        let mut fat_jets = JaggedTable::new(raw.n_events());
        let names: Vec<String> = raw.field_names().map(str::to_string).collect();
        for name in &names {
            if let Some(col) = raw.field(name) {
                fat_jets.insert(name.clone(), col.clone())?;
            }
        }
        for (num, den, out) in [("tau2", "tau1", "t21"), ("tau3", "tau2", "t32")] {
            if fat_jets.has_field(out) {
                continue;
            }
            if let (Some(n), Some(d)) = (raw.field(num), raw.field(den)) {
                fat_jets.insert(out, ratio_col(n, d, out)?)?;
            }
        }
        Ok(JetCollections { jets: chunk.jets().clone(), fat_jets })
    }
}

/// Elementwise ratio of two jagged columns sharing one structure. A zero
/// denominator yields 0.0.
fn ratio_col(num: &JaggedCol, den: &JaggedCol, out: &str) -> Result<JaggedCol> {
    if num.offsets != den.offsets {
        return Err(Error::Validation(format!(
            "cannot derive '{}': numerator and denominator have different jet structure",
            out
        )));
    }
    let flat = num
        .flat
        .iter()
        .zip(&den.flat)
        .map(|(&n, &d)| if d != 0.0 { n / d } else { 0.0 })
        .collect();
    Ok(JaggedCol { flat, offsets: num.offsets.clone() })
}

/// Split a `"<year>_<dataset-name>"` tag into its parts.
pub fn split_dataset_tag(tag: &str) -> Result<(String, String)> {
    match tag.split_once('_') {
        Some((year, dataset)) if !year.is_empty() && !dataset.is_empty() => {
            Ok((year.to_string(), dataset.to_string()))
        }
        _ => Err(Error::Validation(format!(
            "malformed dataset tag '{}', expected '<year>_<dataset-name>'",
            tag
        ))),
    }
}

/// The per-chunk skimming pipeline.
///
/// A `Skimmer` holds only static configuration; all per-chunk state (selection
/// set, cutflow, weights) is created inside [`process`](Skimmer::process) and
/// dropped with it, so one `Skimmer` can serve any number of workers.
pub struct Skimmer {
    config: SkimConfig,
}

impl Skimmer {
    /// Create a skimmer after validating the configuration.
    pub fn new(config: SkimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &SkimConfig {
        &self.config
    }

    /// Process one chunk: derive variables, compute weights, assemble and
    /// filter the output table, hand it to `sink`, and return the summary.
    ///
    /// No step suppresses errors; any internal inconsistency aborts this
    /// chunk and propagates to the caller.
    pub fn process(
        &self,
        chunk: &EventChunk,
        objects: &dyn JetObjects,
        sink: &dyn TableSink,
    ) -> Result<ChunkSummary> {
        let (year, dataset) = split_dataset_tag(chunk.dataset_tag())?;
        let gen_weights = chunk.gen_weight();
        let n = chunk.n_events();
        let n_events: f64 = match gen_weights {
            Some(weights) => weights.iter().sum(),
            None => n as f64,
        };

        if n == 0 {
            debug!(chunk = chunk.chunk_id(), "empty chunk, skipping");
            let mut totals = Totals::new();
            totals.insert("nevents".to_string(), 0.0);
            return Ok(ChunkSummary {
                year,
                dataset,
                nevents: 0.0,
                cutflow: Cutflow::new(),
                totals,
            });
        }

        let mut ctx = SelectionCtx::new(n, gen_weights);
        ctx.cutflow.record("all", n_events);

        let jets = objects.collections(chunk)?;

        let mut columns: Vec<(String, Column)> = Vec::new();
        if gen_weights.is_some() {
            columns.extend(gen::dispatch(&dataset, chunk, &jets, &mut ctx)?);
        }
        columns.extend(variables::fatjet_columns(&jets.fat_jets, &self.config)?);
        columns.extend(variables::trigger_columns(chunk, &self.config.triggers));

        let mut totals = Totals::new();
        totals.insert("nevents".to_string(), n_events);

        match gen_weights {
            None => {
                columns.push(("weight".to_string(), Column::scalar_floats(vec![1.0; n])));
            }
            Some(weights) => {
                let gen_selected = ctx.selections.all();
                let norm = self.config.dataset_norm(&year, &dataset);
                let out = weights::compute_weights(
                    weights,
                    &gen_selected,
                    norm,
                    &self.config.norm_preserving,
                )?;
                columns.extend(out.columns);
                totals.extend(out.totals);
            }
        }

        let final_mask = ctx.selections.all();
        let table = OutputTable::assemble(columns, &final_mask)?;
        sink.write(chunk.chunk_id(), &table)?;

        Ok(ChunkSummary { year, dataset, nevents: n_events, cutflow: ctx.cutflow, totals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn fat_jets(rows: &[Vec<f64>]) -> JaggedTable {
        let n = rows.len();
        let mut table = JaggedTable::new(n);
        for field in
            ["pt", "eta", "phi", "mass", "msoftdrop", "Txbb", "Txjj", "Tqcd", "PQCDb", "PQCDbb",
             "PQCDothers", "particleNet_mass", "particleNet_massraw", "rawFactor"]
        {
            table.insert(field, JaggedCol::from_rows(rows)).unwrap();
        }
        table.insert("tau1", JaggedCol::from_rows(rows)).unwrap();
        table.insert("tau2", JaggedCol::from_rows(rows)).unwrap();
        table.insert("tau3", JaggedCol::from_rows(rows)).unwrap();
        table
    }

    #[test]
    fn split_tag() {
        let (year, dataset) = split_dataset_tag("2022EE_GluGlutoHHto4B_kl-1p00").unwrap();
        assert_eq!(year, "2022EE");
        assert_eq!(dataset, "GluGlutoHHto4B_kl-1p00");
        assert!(split_dataset_tag("nodataset").is_err());
        assert!(split_dataset_tag("2022_").is_err());
    }

    #[test]
    fn ak8_objects_derive_substructure_ratios() {
        let chunk = EventChunk::builder("2022_JetMET", 1)
            .fat_jets(
                JaggedTable::from_fields(
                    1,
                    vec![
                        ("tau1".to_string(), JaggedCol::from_rows(&[vec![0.8, 0.0]])),
                        ("tau2".to_string(), JaggedCol::from_rows(&[vec![0.4, 0.2]])),
                        ("tau3".to_string(), JaggedCol::from_rows(&[vec![0.1, 0.1]])),
                    ],
                )
                .unwrap(),
            )
            .build()
            .unwrap();
        let collections = Ak8Objects.collections(&chunk).unwrap();
        let t21 = collections.fat_jets.field("t21").unwrap();
        assert_eq!(t21.row(0), &[0.5, 0.0]);
        let t32 = collections.fat_jets.field("t32").unwrap();
        assert_eq!(t32.row(0), &[0.25, 0.5]);
    }

    /// Scenario A: simulated events, no selections registered.
    #[test]
    fn simulation_chunk_with_no_selections() {
        let rows = vec![vec![300.0, 250.0], vec![400.0], vec![]];
        let chunk = EventChunk::builder("2022_QCD_HT-1000", 3)
            .fat_jets(fat_jets(&rows))
            .gen_weight(vec![1.0, 2.0, 3.0])
            .build()
            .unwrap();

        let skimmer = Skimmer::new(SkimConfig::default()).unwrap();
        let sink = MemorySink::new();
        let summary = skimmer.process(&chunk, &Ak8Objects, &sink).unwrap();

        assert_eq!(summary.nevents, 6.0);
        assert_eq!(summary.cutflow.len(), 1);
        assert_eq!(summary.cutflow.get("all"), Some(6.0));
        assert_eq!(summary.totals.get("np_nominal"), Some(&6.0));

        let tables = sink.tables();
        assert_eq!(tables.len(), 1);
        let table = &tables[0].1;
        // Every event retained.
        assert_eq!(table.n_rows(), 3);
        // Simulation carries the un-normalized copy.
        assert!(table.column("weight_noxsec").is_some());
        assert_eq!(table.column("ak8FatJetPt").unwrap().width(), 2);
    }

    /// Scenario B: data chunk, one present and one absent trigger.
    #[test]
    fn data_chunk_triggers_and_unit_weight() {
        let mut config = SkimConfig::default();
        config.triggers = vec!["T1".to_string(), "T2".to_string()];
        config.fatjet_skim_vars = vec![("pt".to_string(), "Pt".to_string())];

        let rows = vec![vec![500.0]; 5];
        let chunk = EventChunk::builder("2022_JetMET_Run2022D", 5)
            .fat_jets(JaggedTable::from_fields(
                5,
                vec![("pt".to_string(), JaggedCol::from_rows(&rows))],
            ).unwrap())
            .trigger("T1", vec![true, false, true, false, true])
            .build()
            .unwrap();

        let skimmer = Skimmer::new(config).unwrap();
        let sink = MemorySink::new();
        let summary = skimmer.process(&chunk, &Ak8Objects, &sink).unwrap();

        assert_eq!(summary.year, "2022");
        assert_eq!(summary.dataset, "JetMET_Run2022D");
        assert_eq!(summary.nevents, 5.0);

        let tables = sink.tables();
        let table = &tables[0].1;
        assert_eq!(table.column("T1").unwrap().as_ints().unwrap(), &[1, 0, 1, 0, 1]);
        assert_eq!(table.column("T2").unwrap().as_ints().unwrap(), &[0, 0, 0, 0, 0]);
        assert_eq!(
            table.column("weight").unwrap().as_floats().unwrap(),
            &[1.0, 1.0, 1.0, 1.0, 1.0]
        );
        // No normalization fields on the data path.
        assert!(table.column("weight_noxsec").is_none());
        assert!(summary.totals.get("np_nominal").is_none());
    }

    /// Scenario D: an empty chunk short-circuits without error.
    #[test]
    fn empty_chunk_short_circuits() {
        let chunk = EventChunk::builder("2022_JetMET_Run2022D", 0).build().unwrap();
        let skimmer = Skimmer::new(SkimConfig::default()).unwrap();
        let sink = MemorySink::new();
        let summary = skimmer.process(&chunk, &Ak8Objects, &sink).unwrap();
        assert_eq!(summary.nevents, 0.0);
        assert!(summary.cutflow.is_empty());
        assert!(sink.tables().is_empty());
    }

    #[test]
    fn weight_normalization_round_trips() {
        let mut config = SkimConfig::default();
        config.fatjet_skim_vars = vec![("pt".to_string(), "Pt".to_string())];
        config.xsecs.insert("Zto2Q_PT-200".to_string(), 2.0);
        config.luminosities.insert("2022".to_string(), 10.0);

        let rows = vec![vec![500.0], vec![450.0]];
        let chunk = EventChunk::builder("2022_Zto2Q_PT-200", 2)
            .fat_jets(JaggedTable::from_fields(
                2,
                vec![("pt".to_string(), JaggedCol::from_rows(&rows))],
            ).unwrap())
            .gen_particles(JaggedTable::from_fields(
                2,
                vec![
                    ("pdgId".to_string(), JaggedCol::from_rows(&[vec![23.0], vec![23.0]])),
                    ("pt".to_string(), JaggedCol::from_rows(&[vec![500.0], vec![450.0]])),
                    ("eta".to_string(), JaggedCol::from_rows(&[vec![0.1], vec![0.2]])),
                    ("phi".to_string(), JaggedCol::from_rows(&[vec![0.3], vec![0.4]])),
                    ("mass".to_string(), JaggedCol::from_rows(&[vec![91.0], vec![91.0]])),
                ],
            ).unwrap())
            .gen_weight(vec![1.5, 0.5])
            .build()
            .unwrap();

        let skimmer = Skimmer::new(config).unwrap();
        let sink = MemorySink::new();
        let summary = skimmer.process(&chunk, &Ak8Objects, &sink).unwrap();

        let tables = sink.tables();
        let table = &tables[0].1;
        let weight = table.column("weight").unwrap().as_floats().unwrap();
        let noxsec = table.column("weight_noxsec").unwrap().as_floats().unwrap();
        // norm = xsec * lumi = 20.
        assert_eq!(weight, &[30.0, 10.0]);
        assert_eq!(noxsec, &[1.5, 0.5]);
        assert_eq!(table.column("GenVPt").unwrap().as_floats().unwrap(), &[500.0, 450.0]);
        assert_eq!(summary.totals.get("np_nominal"), Some(&2.0));
    }
}
