//! Companion-file naming and the preview listing

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DatasetError;

/// Hit table suffixes stripped to get the dataset name, longest first
pub const HIT_TABLE_SUFFIXES: [&str; 7] = [
    "_msgfplus_syn",
    "_msgfplus_fht",
    "_msgfdb_syn",
    "_msgfdb_fht",
    "_syn",
    "_fht",
    "_xt",
];

/// Files looked up beside a hit table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Companion {
    /// Explicit modification catalog
    ModSummary,
    /// Per-result modification positions
    ModDetails,
    /// Result to unique sequence map
    ResultToSeqMap,
    /// Unique sequence to protein map
    SeqToProteinMap,
    /// Confidence scores
    Msgf,
    /// Scan elution times
    ScanStats,
}

impl Companion {
    /// Every companion in lookup order
    pub const ALL: [Companion; 6] = [
        Companion::ModSummary,
        Companion::ModDetails,
        Companion::ResultToSeqMap,
        Companion::SeqToProteinMap,
        Companion::Msgf,
        Companion::ScanStats,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Companion::ModSummary => "_ModSummary.txt",
            Companion::ModDetails => "_ModDetails.txt",
            Companion::ResultToSeqMap => "_ResultToSeqMap.txt",
            Companion::SeqToProteinMap => "_SeqToProteinMap.txt",
            Companion::Msgf => "_MSGF.txt",
            Companion::ScanStats => "_ScanStats.txt",
        }
    }
}

impl fmt::Display for Companion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Companion::ModSummary => "modification summary",
            Companion::ModDetails => "modification details",
            Companion::ResultToSeqMap => "result-to-sequence map",
            Companion::SeqToProteinMap => "sequence-to-protein map",
            Companion::Msgf => "confidence scores",
            Companion::ScanStats => "scan statistics",
        };
        write!(f, "{}", name)
    }
}

/// Location of a hit table and the names derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    /// The hit table
    pub hit_table: PathBuf,
    /// Hit table file stem
    pub base_name: String,
    /// Base name without the layout suffix
    pub dataset: String,
    directory: PathBuf,
}

impl DatasetPaths {
    /// Derive names from a hit table path
    pub fn from_hit_table<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let hit_table = path.as_ref().to_path_buf();
        let base_name = hit_table
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DatasetError::InvalidPath(hit_table.display().to_string()))?
            .to_string();
        let dataset = strip_suffix(&base_name).to_string();
        let directory = match hit_table.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            hit_table,
            base_name,
            dataset,
            directory,
        })
    }

    /// Directory holding the hit table
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Expected location of a companion file
    pub fn companion(&self, companion: Companion) -> PathBuf {
        let stem = match companion {
            Companion::ScanStats => &self.dataset,
            _ => &self.base_name,
        };
        self.directory.join(format!("{}{}", stem, companion.suffix()))
    }

    /// Default output file: `<dataset>.pepXML` in `output_dir` or beside the input
    pub fn output_file(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .unwrap_or(&self.directory)
            .join(format!("{}.pepXML", self.dataset))
    }
}

fn strip_suffix(base_name: &str) -> &str {
    let lower = base_name.to_ascii_lowercase();
    HIT_TABLE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix) && lower.len() > suffix.len())
        .map(|suffix| &base_name[..base_name.len() - suffix.len()])
        .unwrap_or(base_name)
}

/// Whether a run needs a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Conversion fails without it
    Required,
    /// Enrichment only
    Optional,
    /// Disabled by configuration
    Disabled,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Required => write!(f, "required"),
            Requirement::Optional => write!(f, "optional"),
            Requirement::Disabled => write!(f, "disabled"),
        }
    }
}

/// One file in a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    /// What the file provides
    pub name: String,
    /// Expected location
    pub path: PathBuf,
    /// Whether the run needs it
    pub requirement: Requirement,
    /// Whether it exists
    pub found: bool,
}

/// Files a conversion would read, without converting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    /// Dataset name
    pub dataset: String,
    /// Hit table
    pub hit_table: PathBuf,
    /// Output file
    pub output: PathBuf,
    /// Companion files
    pub entries: Vec<PreviewEntry>,
}

impl Preview {
    /// Whether every required file exists
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.found || e.requirement != Requirement::Required)
    }

    /// Required files that are missing
    pub fn missing(&self) -> impl Iterator<Item = &PreviewEntry> {
        self.entries
            .iter()
            .filter(|e| !e.found && e.requirement == Requirement::Required)
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.dataset)?;
        writeln!(f, "  hit table: {}", self.hit_table.display())?;
        writeln!(f, "  output:    {}", self.output.display())?;
        for entry in &self.entries {
            let status = if entry.found { "found" } else { "missing" };
            writeln!(
                f,
                "  [{}] {} ({}): {}",
                status,
                entry.name,
                entry.requirement,
                entry.path.display()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_name_strips_suffix() {
        let paths = DatasetPaths::from_hit_table("/data/QC_Shew_msgfplus_syn.txt").unwrap();
        assert_eq!(paths.base_name, "QC_Shew_msgfplus_syn");
        assert_eq!(paths.dataset, "QC_Shew");

        let paths = DatasetPaths::from_hit_table("QC_Shew_xt.txt").unwrap();
        assert_eq!(paths.dataset, "QC_Shew");
        assert_eq!(paths.directory(), Path::new("."));

        let paths = DatasetPaths::from_hit_table("plain.txt").unwrap();
        assert_eq!(paths.dataset, "plain");
    }

    #[test]
    fn test_companion_locations() {
        let paths = DatasetPaths::from_hit_table("/data/QC_syn.txt").unwrap();
        assert_eq!(
            paths.companion(Companion::ModSummary),
            PathBuf::from("/data/QC_syn_ModSummary.txt")
        );
        assert_eq!(
            paths.companion(Companion::ScanStats),
            PathBuf::from("/data/QC_ScanStats.txt")
        );
        assert_eq!(paths.output_file(None), PathBuf::from("/data/QC.pepXML"));
        assert_eq!(
            paths.output_file(Some(Path::new("/out"))),
            PathBuf::from("/out/QC.pepXML")
        );
    }

    #[test]
    fn test_invalid_path() {
        assert!(matches!(
            DatasetPaths::from_hit_table(""),
            Err(DatasetError::InvalidPath(_))
        ));
    }
}
