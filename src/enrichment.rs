//! # Enrichment Resolvers
//!
//! Optional side lookups merged into hits after modification mapping:
//!
//! - elution time by scan number (scan-statistics table)
//! - confidence score by result id (probability-score table)
//! - protein descriptions by accession (FASTA database)
//! - alternative proteins by result id (result-to-sequence and sequence-to-protein maps)
//!
//! Each lookup is injected as a resolver; a source that is absent or unreadable is
//! replaced by [`NoEnrichment`] and recorded as disabled. Missing keys yield `None`.
//! Enrichment never changes identification fields.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use log::{debug, warn};
use serde::Serialize;

use crate::results::tsv_reader;

/// Errors loading an enrichment table
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// I/O error reading the table
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// TSV parsing error
    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// A required column is absent
    #[error("Missing column {column} in {table}")]
    MissingColumn {
        /// Table kind
        table: &'static str,
        /// Column name
        column: String,
    },

    /// A value could not be parsed
    #[error("Invalid value '{value}' in {table}")]
    InvalidValue {
        /// Table kind
        table: &'static str,
        /// Offending text
        value: String,
    },
}

/// Scan number to elution time in seconds
pub trait ElutionTimeResolver: Send + Sync {
    /// Elution time for a scan
    fn elution_time(&self, scan: u32) -> Option<f64>;
}

/// Result id to probability-like score
pub trait ConfidenceResolver: Send + Sync {
    /// Confidence score for a result
    fn confidence(&self, result_id: u64) -> Option<f64>;

    /// Name the score is written under
    fn score_name(&self) -> &str;
}

/// Protein accession to description
pub trait DescriptionResolver: Send + Sync {
    /// Description for an accession
    fn description(&self, accession: &str) -> Option<&str>;
}

/// Result id to every protein the peptide maps to
pub trait ProteinMapResolver: Send + Sync {
    /// Proteins for a result, primary included
    fn proteins(&self, result_id: u64) -> Option<&[ProteinRef]>;
}

/// A protein a peptide maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinRef {
    /// Protein accession
    pub protein: String,
    /// Tolerable termini in this protein's context
    pub tolerable_termini: Option<u8>,
}

/// Resolver for a disabled source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl ElutionTimeResolver for NoEnrichment {
    fn elution_time(&self, _scan: u32) -> Option<f64> {
        None
    }
}

impl ConfidenceResolver for NoEnrichment {
    fn confidence(&self, _result_id: u64) -> Option<f64> {
        None
    }

    fn score_name(&self) -> &str {
        ""
    }
}

impl DescriptionResolver for NoEnrichment {
    fn description(&self, _accession: &str) -> Option<&str> {
        None
    }
}

impl ProteinMapResolver for NoEnrichment {
    fn proteins(&self, _result_id: u64) -> Option<&[ProteinRef]> {
        None
    }
}

/// Optional auxiliary sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    /// Scan statistics (elution time)
    ScanStats,
    /// Probability scores (confidence)
    Confidence,
    /// Result-to-protein maps (alternative proteins)
    ProteinMap,
    /// FASTA database (protein descriptions)
    Fasta,
}

impl fmt::Display for EnrichmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrichmentSource::ScanStats => "scan statistics",
            EnrichmentSource::Confidence => "confidence scores",
            EnrichmentSource::ProteinMap => "protein map",
            EnrichmentSource::Fasta => "FASTA descriptions",
        };
        write!(f, "{}", name)
    }
}

/// An enrichment that is not applied for a dataset, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisabledEnrichment {
    /// Affected source
    pub source: EnrichmentSource,
    /// Reason it is disabled
    pub reason: String,
}

/// The resolvers injected into one dataset's conversion
pub struct Enrichment {
    /// Elution time lookup
    pub elution: Box<dyn ElutionTimeResolver>,
    /// Confidence score lookup
    pub confidence: Box<dyn ConfidenceResolver>,
    /// Protein description lookup
    pub descriptions: Box<dyn DescriptionResolver>,
    /// Alternative protein lookup
    pub proteins: Box<dyn ProteinMapResolver>,
    disabled: Vec<DisabledEnrichment>,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enrichment").field("disabled", &self.disabled).finish()
    }
}

impl Enrichment {
    /// All resolvers disabled, nothing recorded
    pub fn none() -> Self {
        Self {
            elution: Box::new(NoEnrichment),
            confidence: Box::new(NoEnrichment),
            descriptions: Box::new(NoEnrichment),
            proteins: Box::new(NoEnrichment),
            disabled: Vec::new(),
        }
    }

    /// Record a source as disabled; its resolver stays the no-op one
    pub fn disable(&mut self, source: EnrichmentSource, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("Enrichment {} disabled: {}", source, reason);
        self.disabled.push(DisabledEnrichment { source, reason });
    }

    /// Install a loaded resolver or record why it could not be loaded
    pub fn install<T, F>(&mut self, source: EnrichmentSource, loaded: Result<T, EnrichmentError>, set: F)
    where
        F: FnOnce(&mut Self, T),
    {
        match loaded {
            Ok(resolver) => set(self, resolver),
            Err(e) => {
                warn!("Could not load {}: {}", source, e);
                self.disable(source, e.to_string());
            }
        }
    }

    /// Disabled sources in the order they were recorded
    pub fn disabled(&self) -> &[DisabledEnrichment] {
        &self.disabled
    }
}

/// Header-indexed view over a small TSV table
struct Table<R: Read> {
    kind: &'static str,
    reader: csv::Reader<R>,
    header: Vec<String>,
}

impl<R: Read> Table<R> {
    fn open(kind: &'static str, reader: R) -> Result<Self, EnrichmentError> {
        let mut reader = tsv_reader(reader);
        let mut record = StringRecord::new();
        loop {
            if !reader.read_record(&mut record)? {
                break;
            }
            if record.iter().any(|f| !f.trim().is_empty()) {
                break;
            }
        }
        let header = record.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        Ok(Self { kind, reader, header })
    }

    fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.header.iter().position(|h| h.eq_ignore_ascii_case(name)))
    }

    fn require(&self, names: &[&str]) -> Result<usize, EnrichmentError> {
        self.column(names).ok_or_else(|| EnrichmentError::MissingColumn {
            table: self.kind,
            column: names.join(" or "),
        })
    }

    /// Visit every non-blank row
    fn for_each<F>(&mut self, mut visit: F) -> Result<(), EnrichmentError>
    where
        F: FnMut(&StringRecord) -> Result<(), EnrichmentError>,
    {
        for record in self.reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            visit(&record)?;
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(
    table: &'static str,
    record: &StringRecord,
    index: usize,
) -> Result<T, EnrichmentError> {
    let value = record.get(index).map(str::trim).unwrap_or("");
    value.parse().map_err(|_| EnrichmentError::InvalidValue {
        table,
        value: value.to_string(),
    })
}

/// Elution times from a scan-statistics table (`ScanNumber`, `ScanTime` in minutes)
#[derive(Debug, Clone, Default)]
pub struct ScanStatsTable {
    seconds: HashMap<u32, f64>,
}

impl ScanStatsTable {
    /// Load from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EnrichmentError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    /// Load from a reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EnrichmentError> {
        const KIND: &str = "scan statistics";
        let mut table = Table::open(KIND, reader)?;
        let scan_col = table.require(&["ScanNumber", "Scan"])?;
        let time_col = table.require(&["ScanTime", "ScanTime1"])?;

        let mut seconds = HashMap::new();
        table.for_each(|record| {
            let scan: u32 = parse_field(KIND, record, scan_col)?;
            let minutes: f64 = parse_field(KIND, record, time_col)?;
            seconds.insert(scan, minutes * 60.0);
            Ok(())
        })?;
        debug!("Loaded elution times for {} scans", seconds.len());
        Ok(Self { seconds })
    }

    /// Number of scans with an elution time
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }
}

impl ElutionTimeResolver for ScanStatsTable {
    fn elution_time(&self, scan: u32) -> Option<f64> {
        self.seconds.get(&scan).copied()
    }
}

/// Confidence scores from a probability-score table (`Result_ID`, `SpecProb` or `SpecEValue`)
#[derive(Debug, Clone, Default)]
pub struct ConfidenceTable {
    score_name: String,
    scores: HashMap<u64, f64>,
}

impl ConfidenceTable {
    /// Load from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EnrichmentError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    /// Load from a reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EnrichmentError> {
        const KIND: &str = "confidence scores";
        let mut table = Table::open(KIND, reader)?;
        let id = table.require(&["Result_ID", "ResultID"])?;
        let (score, score_name) = match table.column(&["SpecProb"]) {
            Some(index) => (index, "specprob"),
            None => (table.require(&["SpecEValue", "SpecProb"])?, "specevalue"),
        };

        let mut scores = HashMap::new();
        table.for_each(|record| {
            let id: u64 = parse_field(KIND, record, id)?;
            // Unscored results are written as empty or non-numeric placeholders
            if let Ok(value) = parse_field::<f64>(KIND, record, score) {
                if value.is_finite() {
                    scores.insert(id, value);
                }
            }
            Ok(())
        })?;
        Ok(Self {
            score_name: score_name.to_string(),
            scores,
        })
    }
}

impl ConfidenceResolver for ConfidenceTable {
    fn confidence(&self, result_id: u64) -> Option<f64> {
        self.scores.get(&result_id).copied()
    }

    fn score_name(&self) -> &str {
        &self.score_name
    }
}

/// Protein descriptions from a FASTA file
#[derive(Debug, Clone, Default)]
pub struct FastaDescriptions {
    descriptions: HashMap<String, String>,
}

impl FastaDescriptions {
    /// Load from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EnrichmentError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    /// Load header lines (`>ACCESSION description`) from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, EnrichmentError> {
        let mut descriptions = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let Some(header) = line.strip_prefix('>') else {
                continue;
            };
            let header = header.trim();
            let (accession, description) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
            let description = description.trim();
            if !accession.is_empty() && !description.is_empty() {
                descriptions
                    .entry(accession.to_string())
                    .or_insert_with(|| description.to_string());
            }
        }
        debug!("Loaded {} protein descriptions", descriptions.len());
        Ok(Self { descriptions })
    }
}

impl DescriptionResolver for FastaDescriptions {
    fn description(&self, accession: &str) -> Option<&str> {
        self.descriptions.get(accession).map(String::as_str)
    }
}

/// Proteins per result from the result-to-sequence and sequence-to-protein maps
#[derive(Debug, Clone, Default)]
pub struct ProteinMap {
    proteins: HashMap<u64, Vec<ProteinRef>>,
}

impl ProteinMap {
    /// Load both map files
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        result_to_seq: P,
        seq_to_protein: Q,
    ) -> Result<Self, EnrichmentError> {
        Self::from_readers(
            BufReader::new(File::open(result_to_seq.as_ref())?),
            BufReader::new(File::open(seq_to_protein.as_ref())?),
        )
    }

    /// Load from readers over `Result_ID, Unique_Seq_ID` and
    /// `Unique_Seq_ID, Cleavage_State, Protein_Name`
    pub fn from_readers<R: Read, S: Read>(result_to_seq: R, seq_to_protein: S) -> Result<Self, EnrichmentError> {
        const SEQ_KIND: &str = "sequence-to-protein map";
        const RESULT_KIND: &str = "result-to-sequence map";

        let mut table = Table::open(SEQ_KIND, seq_to_protein)?;
        let seq = table.require(&["Unique_Seq_ID"])?;
        let protein = table.require(&["Protein_Name"])?;
        let cleavage = table.column(&["Cleavage_State"]);

        let mut by_sequence: HashMap<u64, Vec<ProteinRef>> = HashMap::new();
        table.for_each(|record| {
            let seq_id: u64 = parse_field(SEQ_KIND, record, seq)?;
            let name = record.get(protein).map(str::trim).unwrap_or("");
            if name.is_empty() {
                return Ok(());
            }
            let tolerable_termini = cleavage.and_then(|c| parse_field::<u8>(SEQ_KIND, record, c).ok());
            let entry = by_sequence.entry(seq_id).or_default();
            if !entry.iter().any(|p| p.protein == name) {
                entry.push(ProteinRef {
                    protein: name.to_string(),
                    tolerable_termini,
                });
            }
            Ok(())
        })?;

        let mut table = Table::open(RESULT_KIND, result_to_seq)?;
        let result = table.require(&["Result_ID", "ResultID"])?;
        let seq = table.require(&["Unique_Seq_ID"])?;

        let mut proteins = HashMap::new();
        table.for_each(|record| {
            let result_id: u64 = parse_field(RESULT_KIND, record, result)?;
            let seq_id: u64 = parse_field(RESULT_KIND, record, seq)?;
            if let Some(refs) = by_sequence.get(&seq_id) {
                proteins.insert(result_id, refs.clone());
            }
            Ok(())
        })?;
        debug!("Loaded protein map for {} results", proteins.len());
        Ok(Self { proteins })
    }
}

impl ProteinMapResolver for ProteinMap {
    fn proteins(&self, result_id: u64) -> Option<&[ProteinRef]> {
        self.proteins.get(&result_id).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scan_stats_minutes_to_seconds() {
        let text = "Dataset\tScanNumber\tScanTime\tScanType\n1\t100\t12.5\t2\n1\t101\t12.51\t2\n";
        let table = ScanStatsTable::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.elution_time(100), Some(750.0));
        assert_eq!(table.elution_time(7), None);
    }

    #[test]
    fn test_scan_stats_missing_column() {
        let err = ScanStatsTable::from_reader(Cursor::new("ScanNumber\n1\n")).unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingColumn { .. }));
    }

    #[test]
    fn test_confidence_table_skips_placeholders() {
        let text = "Result_ID\tScan\tSpecProb\n1\t100\t1.5E-12\n2\t101\tPValue\n";
        let table = ConfidenceTable::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(table.score_name(), "specprob");
        assert_eq!(table.confidence(1), Some(1.5e-12));
        assert_eq!(table.confidence(2), None);
    }

    #[test]
    fn test_fasta_descriptions() {
        let text = ">SO_1234 Chain A <putative> & friends\nMPEPTIDEK\n>SO_9999\nAAAK\n";
        let fasta = FastaDescriptions::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(fasta.description("SO_1234"), Some("Chain A <putative> & friends"));
        assert_eq!(fasta.description("SO_9999"), None);
    }

    #[test]
    fn test_protein_map_joins_tables() {
        let results = "Result_ID\tUnique_Seq_ID\n1\t10\n2\t11\n";
        let sequences = "Unique_Seq_ID\tCleavage_State\tTerminus_State\tProtein_Name\n10\t2\t0\tP1\n10\t1\t0\tP2\n11\t2\t0\tP3\n";
        let map = ProteinMap::from_readers(Cursor::new(results), Cursor::new(sequences)).unwrap();
        let refs = map.proteins(1).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].protein, "P2");
        assert_eq!(refs[1].tolerable_termini, Some(1));
        assert!(map.proteins(3).is_none());
    }

    #[test]
    fn test_install_records_failures() {
        let mut enrichment = Enrichment::none();
        let loaded = ScanStatsTable::from_reader(Cursor::new("Nope\n1\n"));
        enrichment.install(EnrichmentSource::ScanStats, loaded, |e, table| e.elution = Box::new(table));
        assert_eq!(enrichment.disabled().len(), 1);
        assert_eq!(enrichment.disabled()[0].source, EnrichmentSource::ScanStats);
        assert_eq!(enrichment.elution.elution_time(1), None);
    }
}
