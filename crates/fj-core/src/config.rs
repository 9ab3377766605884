//! Static configuration consumed by the skimming pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};

/// Canonical 4-vector field-name convention: source field to output suffix.
pub const P4: [(&str, &str); 4] = [("pt", "Pt"), ("eta", "Eta"), ("phi", "Phi"), ("mass", "Mass")];

/// Configuration surface of the skimmer. All values are supplied externally;
/// nothing here is computed from event data.
#[derive(Debug, Clone)]
pub struct SkimConfig {
    /// Number of leading fat jets saved per event.
    pub num_fatjets: usize,
    /// Padding sentinel for events with fewer fat jets than `num_fatjets`.
    pub pad_value: f64,
    /// Enumerated trigger menu. Absent names yield all-zero output columns so
    /// the schema is stable across eras.
    pub triggers: Vec<String>,
    /// Ordered fat-jet skim map: source field name to output name.
    pub fatjet_skim_vars: Vec<(String, String)>,
    /// Cross sections in pb by dataset name.
    pub xsecs: HashMap<String, f64>,
    /// Integrated luminosity equivalents by year.
    pub luminosities: HashMap<String, f64>,
    /// Weight components whose variations must not change the sample
    /// normalization, tracked for postprocessing.
    pub norm_preserving: Vec<String>,
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            num_fatjets: 2,
            pad_value: 0.0,
            triggers: default_triggers(),
            fatjet_skim_vars: default_fatjet_skim_vars(),
            xsecs: HashMap::new(),
            luminosities: default_luminosities(),
            norm_preserving: vec!["genweight".to_string()],
        }
    }
}

impl SkimConfig {
    /// Replace the cross-section table.
    pub fn with_xsecs(mut self, xsecs: HashMap<String, f64>) -> Self {
        self.xsecs = xsecs;
        self
    }

    /// Check internal consistency of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_fatjets == 0 {
            return Err(Error::Validation("num_fatjets must be at least 1".into()));
        }
        if self.fatjet_skim_vars.is_empty() {
            return Err(Error::Validation("fatjet skim map is empty".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for (_, out) in &self.fatjet_skim_vars {
            if !seen.insert(out.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate fat-jet output name '{}'",
                    out
                )));
            }
        }
        Ok(())
    }

    /// Cross-section normalization factor for one `(year, dataset)`:
    /// xsec x luminosity. Missing entries fall back to 1.0 with a warning,
    /// leaving the global renormalization to postprocessing.
    pub fn dataset_norm(&self, year: &str, dataset: &str) -> f64 {
        let xsec = match self.xsecs.get(dataset) {
            Some(x) => *x,
            None => {
                warn!(dataset, "no cross section registered, using 1.0");
                1.0
            }
        };
        let lumi = match self.luminosities.get(year) {
            Some(l) => *l,
            None => {
                warn!(year, "no luminosity registered, using 1.0");
                1.0
            }
        };
        xsec * lumi
    }
}

/// Load a cross-section table (`dataset name -> xsec in pb`) from a JSON file.
pub fn load_xsecs(path: &Path) -> Result<HashMap<String, f64>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Integrated luminosity equivalents (per pb) by data-taking year.
fn default_luminosities() -> HashMap<String, f64> {
    [
        ("2022".to_string(), 7971.4),
        ("2022EE".to_string(), 26337.0),
        ("2023".to_string(), 17794.0),
        ("2023BPix".to_string(), 9451.0),
    ]
    .into_iter()
    .collect()
}

/// Fat-jet variables kept in the skim: the 4-vector plus substructure and
/// tagger discriminants.
fn default_fatjet_skim_vars() -> Vec<(String, String)> {
    [
        ("pt", "Pt"),
        ("eta", "Eta"),
        ("phi", "Phi"),
        ("mass", "Mass"),
        ("msoftdrop", "msoftdrop"),
        ("Txbb", "PNetTXbb"),
        ("Txjj", "PNetTXjj"),
        ("Tqcd", "PNetQCD"),
        ("PQCDb", "PNetQCD1HF"),
        ("PQCDbb", "PNetQCD2HF"),
        ("PQCDothers", "PNetQCD0HF"),
        ("particleNet_mass", "particleNet_mass"),
        ("particleNet_massraw", "PNetMassRaw"),
        ("t21", "Tau2OverTau1"),
        ("t32", "Tau3OverTau2"),
        ("rawFactor", "rawFactor"),
    ]
    .into_iter()
    .map(|(s, o)| (s.to_string(), o.to_string()))
    .collect()
}

/// Offline and parking triggers recorded in the skim.
fn default_triggers() -> Vec<String> {
    [
        "QuadPFJet70_50_40_35_PFBTagParticleNet_2BTagSum0p65",
        "PFHT1050",
        "AK8PFJet230_SoftDropMass40_PFAK8ParticleNetBB0p35",
        "AK8PFJet250_SoftDropMass40_PFAK8ParticleNetBB0p35",
        "AK8PFJet275_SoftDropMass40_PFAK8ParticleNetBB0p35",
        "AK8PFJet230_SoftDropMass40",
        "AK8PFJet425_SoftDropMass40",
        "AK8PFJet400_SoftDropMass40",
        "AK8DiPFJet250_250_MassSD50",
        "AK8DiPFJet260_260_MassSD30",
        "AK8PFJet420_MassSD30",
        "AK8PFJet230_SoftDropMass40_PNetBB0p06",
        "AK8PFJet230_SoftDropMass40_PNetBB0p10",
        "AK8PFJet250_SoftDropMass40_PNetBB0p06",
        "PFHT280_QuadPFJet30_PNet2BTagMean0p55",
        "DiJet110_35_Mjj650_PFMET110",
        "TripleJet110_35_35_Mjj650_PFMET110",
        "VBF_DiPFJet80_45_Mjj650_PFMETNoMu85",
        "VBF_DiPFJet110_35_Mjj650",
        "VBF_DiPFJet110_35_Mjj650_TriplePFJet",
        "VBF_DiPFJet110_40_Mjj1000_Detajj3p5",
        "VBF_DiPFJet110_40_Mjj1000_Detajj3p5_TriplePFJet",
        "VBF_DiJet_60_30_Mass500_DiJet50",
        "VBF_DiJet_110_35_Mass620",
        "Mu12_IP6",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SkimConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.num_fatjets, 2);
        assert_eq!(cfg.norm_preserving, vec!["genweight"]);
        assert!(cfg.triggers.iter().any(|t| t == "PFHT1050"));
    }

    #[test]
    fn zero_fatjets_rejected() {
        let cfg = SkimConfig { num_fatjets: 0, ..SkimConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_output_name_rejected() {
        let mut cfg = SkimConfig::default();
        cfg.fatjet_skim_vars.push(("pt".to_string(), "Pt".to_string()));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn norm_factor_known_and_unknown() {
        let mut cfg = SkimConfig::default();
        cfg.xsecs.insert("HHto4B".to_string(), 0.01);
        cfg.luminosities.insert("2022".to_string(), 1000.0);
        assert_eq!(cfg.dataset_norm("2022", "HHto4B"), 10.0);
        // Unknown dataset falls back to luminosity only.
        assert_eq!(cfg.dataset_norm("2022", "QCD"), 1000.0);
        // Unknown year and dataset falls back to unity.
        assert_eq!(cfg.dataset_norm("1999", "QCD"), 1.0);
    }
}
