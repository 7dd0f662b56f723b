//! TOML configuration file support for power users.
//!
//! Instead of passing many CLI flags, users can specify settings in a config file:
//!
//! ```toml
//! # pepxml.toml
//! [conversion]
//! hits_per_spectrum = 3
//! skip_ambiguous_residues = true
//! disallowed_residues = "BJOUXZ"
//! use_scan_stats = false
//! tolerance = 0.001
//! ambiguity_policy = "closest"
//!
//! [search]
//! database = "/data/fasta/S_oneidensis.fasta"
//! enzyme = "trypsin"
//! max_missed_cleavages = 1
//! precursor_mass_type = "average"
//! ```
//!
//! Settings left out keep their defaults; command-line flags win over both.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pepxml_convert::dataset::ConversionConfig;
use pepxml_convert::enzyme::{EnzymeRule, Sense};
use pepxml_convert::mass::MassType;
use pepxml_convert::modifications::AmbiguityPolicy;

/// Root configuration structure for pepxml.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Conversion-specific settings.
    #[serde(default)]
    pub conversion: ConversionSection,

    /// Search parameters written to the output.
    #[serde(default)]
    pub search: SearchSection,
}

/// The `[conversion]` table.
#[derive(Debug, Default, Deserialize)]
pub struct ConversionSection {
    /// Best-ranked hits kept per spectrum.
    pub hits_per_spectrum: Option<usize>,

    /// Drop peptides with disallowed residue codes.
    pub skip_ambiguous_residues: Option<bool>,

    /// Disallowed residue codes, e.g. "BJXZ".
    pub disallowed_residues: Option<String>,

    /// Read the modification summary file.
    pub use_mod_summary: Option<bool>,

    /// Read scan statistics for elution times.
    pub use_scan_stats: Option<bool>,

    /// Read MSGF confidence scores.
    pub use_msgf: Option<bool>,

    /// Read the protein map files.
    pub use_protein_map: Option<bool>,

    /// Read protein descriptions from the database.
    pub use_fasta: Option<bool>,

    /// Decimals for output masses.
    pub mass_decimals: Option<usize>,

    /// Modification mass tolerance in Da.
    pub tolerance: Option<f64>,

    /// `fail` or `closest`.
    pub ambiguity_policy: Option<AmbiguityPolicy>,
}

/// The `[search]` table.
#[derive(Debug, Default, Deserialize)]
pub struct SearchSection {
    /// Search engine name override.
    pub engine: Option<String>,

    /// Protein database path.
    pub database: Option<PathBuf>,

    /// `trypsin`, `nonspecific`, or a custom name with `cut` set.
    pub enzyme: Option<String>,

    /// Cut residues of a custom enzyme.
    pub cut: Option<String>,

    /// Blocking residues of a custom enzyme.
    pub no_cut: Option<String>,

    /// `C` or `N`.
    pub sense: Option<Sense>,

    /// Maximum internal cleavages.
    pub max_missed_cleavages: Option<u32>,

    /// Minimum enzymatic termini.
    pub min_termini: Option<u8>,

    /// Precursor mass type.
    pub precursor_mass_type: Option<MassType>,

    /// Fragment mass type.
    pub fragment_mass_type: Option<MassType>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Overlay the file's settings onto `config`.
    pub fn apply(&self, config: &mut ConversionConfig) -> Result<()> {
        let conversion = &self.conversion;
        if let Some(limit) = conversion.hits_per_spectrum {
            if limit == 0 {
                bail!("hits_per_spectrum must be at least 1");
            }
            config.hits_per_spectrum = Some(limit);
        }
        set(&mut config.skip_ambiguous_residues, conversion.skip_ambiguous_residues);
        if let Some(residues) = &conversion.disallowed_residues {
            config.disallowed_residues = residues
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .map(|c| c.to_ascii_uppercase())
                .collect();
        }
        set(&mut config.use_mod_summary, conversion.use_mod_summary);
        set(&mut config.use_scan_stats, conversion.use_scan_stats);
        set(&mut config.use_msgf, conversion.use_msgf);
        set(&mut config.use_protein_map, conversion.use_protein_map);
        set(&mut config.use_fasta, conversion.use_fasta);
        set(&mut config.mass_decimals, conversion.mass_decimals);
        if let Some(tolerance) = conversion.tolerance {
            if !(tolerance.is_finite() && tolerance >= 0.0) {
                bail!("tolerance must be a non-negative number, got {}", tolerance);
            }
            config.tolerance = tolerance;
        }
        set(&mut config.ambiguity_policy, conversion.ambiguity_policy);

        let search = &self.search;
        let settings = &mut config.search;
        if search.engine.is_some() {
            settings.engine = search.engine.clone();
        }
        if search.database.is_some() {
            settings.database = search.database.clone();
        }
        if let Some(name) = &search.enzyme {
            settings.enzyme = match name.to_ascii_lowercase().as_str() {
                "trypsin" => EnzymeRule::trypsin(),
                "nonspecific" | "no_enzyme" | "none" => EnzymeRule::no_enzyme(),
                _ if search.cut.is_some() => EnzymeRule {
                    name: name.clone(),
                    ..EnzymeRule::no_enzyme()
                },
                _ => bail!("Unknown enzyme '{}'; set `cut` to define it", name),
            };
        }
        if let Some(cut) = &search.cut {
            settings.enzyme.cut = cut.to_ascii_uppercase();
        }
        if let Some(no_cut) = &search.no_cut {
            settings.enzyme.no_cut = no_cut.to_ascii_uppercase();
        }
        set(&mut settings.enzyme.sense, search.sense);
        set(&mut settings.max_missed_cleavages, search.max_missed_cleavages);
        set(&mut settings.min_termini, search.min_termini);
        set(&mut settings.precursor_mass_type, search.precursor_mass_type);
        set(&mut settings.fragment_mass_type, search.fragment_mass_type);
        Ok(())
    }
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [conversion]
            hits_per_spectrum = 3
            skip_ambiguous_residues = true
            disallowed_residues = "bjx"
            use_msgf = false
            tolerance = 0.001
            ambiguity_policy = "closest"

            [search]
            database = "/data/fasta/S_oneidensis.fasta"
            max_missed_cleavages = 1
            precursor_mass_type = "average"
        "#;

        let file = Config::from_str(toml).unwrap();
        assert_eq!(file.conversion.hits_per_spectrum, Some(3));
        assert_eq!(file.conversion.ambiguity_policy, Some(AmbiguityPolicy::Closest));

        let mut config = ConversionConfig::default();
        file.apply(&mut config).unwrap();
        assert_eq!(config.hits_per_spectrum, Some(3));
        assert!(config.skip_ambiguous_residues);
        assert_eq!(config.disallowed_residues, vec!['B', 'J', 'X']);
        assert!(!config.use_msgf);
        assert!(config.use_scan_stats);
        assert_eq!(config.tolerance, 0.001);
        assert_eq!(config.search.max_missed_cleavages, 1);
        assert_eq!(config.search.precursor_mass_type, MassType::Average);
        assert_eq!(config.search.fragment_mass_type, MassType::Monoisotopic);
        assert_eq!(
            config.search.database,
            Some(PathBuf::from("/data/fasta/S_oneidensis.fasta"))
        );
    }

    #[test]
    fn test_custom_enzyme() {
        let toml = r#"
            [search]
            enzyme = "Asp-N"
            cut = "d"
            sense = "N"
        "#;

        let mut config = ConversionConfig::default();
        Config::from_str(toml).unwrap().apply(&mut config).unwrap();
        assert_eq!(config.search.enzyme.name, "Asp-N");
        assert_eq!(config.search.enzyme.cut, "D");
        assert_eq!(config.search.enzyme.no_cut, "");
        assert_eq!(config.search.enzyme.sense, Sense::N);
    }

    #[test]
    fn test_unknown_enzyme_rejected() {
        let toml = r#"
            [search]
            enzyme = "chymotrypsin"
        "#;

        let mut config = ConversionConfig::default();
        assert!(Config::from_str(toml).unwrap().apply(&mut config).is_err());
    }

    #[test]
    fn test_empty_config() {
        let file = Config::from_str("").unwrap();
        let mut config = ConversionConfig::default();
        file.apply(&mut config).unwrap();
        assert_eq!(config, ConversionConfig::default());
    }
}
