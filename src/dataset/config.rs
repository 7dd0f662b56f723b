//! Conversion settings shared by every dataset in a run

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::AssemblerOptions;
use crate::enzyme::EnzymeRule;
use crate::mass::MassType;
use crate::modifications::{AmbiguityPolicy, MapperOptions, DEFAULT_TOLERANCE};
use crate::pepxml::{WriterOptions, DEFAULT_MASS_DECIMALS};
use crate::results::{ParserOptions, DEFAULT_DISALLOWED_RESIDUES};

/// Search parameters written to every `search_summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Overrides the engine name implied by the hit table layout
    pub engine: Option<String>,
    /// Protein database; also the FASTA source for protein descriptions
    pub database: Option<PathBuf>,
    /// Cleavage rule used for missing termini / missed-cleavage columns
    pub enzyme: EnzymeRule,
    /// Maximum internal cleavages allowed by the search
    pub max_missed_cleavages: u32,
    /// Minimum number of enzymatic termini
    pub min_termini: u8,
    /// Mass type of precursor masses
    pub precursor_mass_type: MassType,
    /// Mass type of fragment masses
    pub fragment_mass_type: MassType,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine: None,
            database: None,
            enzyme: EnzymeRule::trypsin(),
            max_missed_cleavages: 2,
            min_termini: 1,
            precursor_mass_type: MassType::Monoisotopic,
            fragment_mass_type: MassType::Monoisotopic,
        }
    }
}

/// Configuration for converting hit tables to pepXML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Keep at most this many best-ranked hits per spectrum
    pub hits_per_spectrum: Option<usize>,

    /// Drop peptides containing disallowed residue codes instead of flagging them
    pub skip_ambiguous_residues: bool,

    /// Residue codes treated as ambiguous
    pub disallowed_residues: Vec<char>,

    /// Read `<base>_ModSummary.txt` when present
    pub use_mod_summary: bool,

    /// Read `<dataset>_ScanStats.txt` for elution times
    pub use_scan_stats: bool,

    /// Read `<base>_MSGF.txt` for confidence scores
    pub use_msgf: bool,

    /// Read the result-to-sequence and sequence-to-protein maps
    pub use_protein_map: bool,

    /// Read protein descriptions from the search database
    pub use_fasta: bool,

    /// Decimals for masses in the output
    pub mass_decimals: usize,

    /// Mass tolerance (Da) for matching evidence to definitions
    pub tolerance: f64,

    /// What to do when evidence matches several definitions
    pub ambiguity_policy: AmbiguityPolicy,

    /// Fixed document date; the current local time when unset
    pub date: Option<String>,

    /// Search parameters
    pub search: SearchSettings,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            hits_per_spectrum: None,
            skip_ambiguous_residues: false,
            disallowed_residues: DEFAULT_DISALLOWED_RESIDUES.to_vec(),
            use_mod_summary: true,
            use_scan_stats: true,
            use_msgf: true,
            use_protein_map: true,
            use_fasta: true,
            mass_decimals: DEFAULT_MASS_DECIMALS,
            tolerance: DEFAULT_TOLERANCE,
            ambiguity_policy: AmbiguityPolicy::Fail,
            date: None,
            search: SearchSettings::default(),
        }
    }
}

impl ConversionConfig {
    /// Only the hit table and required companions; every enrichment off
    pub fn minimal() -> Self {
        Self {
            use_scan_stats: false,
            use_msgf: false,
            use_protein_map: false,
            use_fasta: false,
            ..Default::default()
        }
    }

    pub(crate) fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            disallowed_residues: self.disallowed_residues.clone(),
        }
    }

    pub(crate) fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            tolerance: self.tolerance,
            policy: self.ambiguity_policy,
        }
    }

    pub(crate) fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            hits_per_spectrum: self.hits_per_spectrum,
            skip_ambiguous_residues: self.skip_ambiguous_residues,
        }
    }

    pub(crate) fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            mass_decimals: self.mass_decimals,
            date: self.date.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::default();
        assert_eq!(config.mass_decimals, 4);
        assert!((config.tolerance - 0.0005).abs() < 1e-12);
        assert_eq!(config.search.enzyme.name, "trypsin");
        assert!(config.use_mod_summary && config.use_fasta);
    }

    #[test]
    fn test_minimal_disables_enrichment() {
        let config = ConversionConfig::minimal();
        assert!(config.use_mod_summary);
        assert!(!config.use_scan_stats && !config.use_msgf && !config.use_protein_map && !config.use_fasta);
    }
}
