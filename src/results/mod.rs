//! # Hit Table Reader
//!
//! Streams rows of a tab-delimited peptide-spectrum-match table into
//! [`HitRow`] records. The column layout is detected once from the header
//! (see [`ResultLayout`]); unknown columns are ignored.
//!
//! Per-row problems surface as [`ParseError::MalformedRow`] items from the
//! iterator so the caller can skip the row and keep reading.

mod error;
pub mod layout;
pub mod sequence;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;

pub use error::{ParseError, SequenceError};
pub use layout::{IonColumns, LayoutColumns, ResultLayout, ScoreColumn, ScoreTransform};
pub use sequence::{AnnotatedPeptide, Evidence, EvidenceKind, Site, TERMINUS_MARKER};

use crate::mass::PROTON;

/// Residue codes flagged by default: ambiguous or unknown amino acids
pub const DEFAULT_DISALLOWED_RESIDUES: [char; 4] = ['B', 'J', 'X', 'Z'];

/// Options for reading a hit table
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Residue codes that flag a row (reported, not fatal)
    pub disallowed_residues: Vec<char>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            disallowed_residues: DEFAULT_DISALLOWED_RESIDUES.to_vec(),
        }
    }
}

/// A named numeric score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamedScore {
    /// Score name as written to `search_score`
    pub name: &'static str,
    /// Score value
    pub value: f64,
}

/// One parsed row of a hit table
#[derive(Debug, Clone, PartialEq)]
pub struct HitRow {
    /// 1-based line number in the source file
    pub line: u64,
    /// Result identifier (row number when the layout has none)
    pub result_id: u64,
    /// Scan number
    pub scan: u32,
    /// Precursor charge
    pub charge: u8,
    /// Annotated peptide
    pub peptide: AnnotatedPeptide,
    /// Primary protein accession
    pub protein: String,
    /// Number of proteins besides the primary one
    pub additional_proteins: u32,
    /// Hit rank, when the layout reports one
    pub rank: Option<u32>,
    /// Theoretical neutral peptide mass
    pub calc_neutral_mass: Option<f64>,
    /// Observed minus calculated mass
    pub mass_diff: f64,
    /// Tolerable termini, when the layout reports them
    pub tolerable_termini: Option<u8>,
    /// Missed cleavages, when the layout reports them
    pub missed_cleavages: Option<u32>,
    /// Matched fragment ions
    pub matched_ions: u32,
    /// Total theoretical fragment ions
    pub total_ions: u32,
    /// Failed the upstream filter
    pub rejected: bool,
    /// Scores in layout order
    pub scores: Vec<NamedScore>,
    /// Disallowed residue codes present in the peptide
    pub flagged_residues: Vec<char>,
}

/// Streaming reader over one hit table
pub struct ResultReader<R: Read> {
    reader: csv::Reader<R>,
    layout: ResultLayout,
    header: Vec<String>,
    options: ParserOptions,
    record: StringRecord,
    rows_read: u64,
}

impl ResultReader<BufReader<File>> {
    /// Open a hit table file
    pub fn open<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self, ParseError> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::with_capacity(64 * 1024, file), options)
    }
}

impl<R: Read> ResultReader<R> {
    /// Create a reader and resolve the layout from the first non-blank line
    pub fn new(reader: R, options: ParserOptions) -> Result<Self, ParseError> {
        let mut reader = hit_table_reader(reader);

        let mut record = StringRecord::new();
        loop {
            if !reader.read_record(&mut record)? {
                return Err(ParseError::UnrecognizedLayout("<empty file>".to_string()));
            }
            if !is_blank(&record) {
                break;
            }
        }

        let layout = ResultLayout::detect(&record)?;
        let header = record.iter().map(|s| s.trim().to_string()).collect();

        Ok(Self {
            reader,
            layout,
            header,
            options,
            record: StringRecord::new(),
            rows_read: 0,
        })
    }

    /// The detected layout
    pub fn layout(&self) -> &ResultLayout {
        &self.layout
    }

    /// Data rows seen so far, including malformed ones
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read the next row; `None` at end of file
    pub fn next_row(&mut self) -> Option<Result<HitRow, ParseError>> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) if is_blank(&self.record) => continue,
                Ok(true) => {
                    self.rows_read += 1;
                    let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                    return Some(self.parse_record(line));
                }
                Err(e) => {
                    self.rows_read += 1;
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    return Some(Err(ParseError::malformed(line, "<row>", e.to_string())));
                }
            }
        }
    }

    fn parse_record(&self, line: u64) -> Result<HitRow, ParseError> {
        let row = RowView {
            record: &self.record,
            header: &self.header,
            line,
        };
        let columns = self.layout.columns();

        let peptide_text = row.required(columns.peptide)?;
        let peptide = AnnotatedPeptide::parse(peptide_text)
            .map_err(|e| ParseError::malformed(line, row.name(columns.peptide), e.to_string()))?;

        let (matched_ions, total_ions) = match columns.ions {
            IonColumns::None => (0, 0),
            IonColumns::ObservedExpected { observed, expected } => (
                row.number(observed)?.unwrap_or(0),
                row.number(expected)?.unwrap_or(0),
            ),
            IonColumns::BAndY { b, y } => {
                let b: u32 = row.number(b)?.unwrap_or(0);
                let y: u32 = row.number(y)?.unwrap_or(0);
                (b + y, 2 * (peptide.len() as u32).saturating_sub(1))
            }
        };

        let mut scores = Vec::with_capacity(columns.scores.len());
        for score in &columns.scores {
            if let Some(value) = row.number::<f64>(score.index)? {
                let value = match score.transform {
                    ScoreTransform::Identity => value,
                    ScoreTransform::Exp10 => 10f64.powf(value),
                };
                scores.push(NamedScore {
                    name: score.name,
                    value,
                });
            }
        }

        let flagged_residues = peptide.residues_in(&self.options.disallowed_residues);

        Ok(HitRow {
            line,
            result_id: match columns.result_id {
                Some(index) => row.number(index)?.unwrap_or(self.rows_read),
                None => self.rows_read,
            },
            scan: row
                .number(columns.scan)?
                .ok_or_else(|| ParseError::malformed(line, row.name(columns.scan), "empty value"))?,
            charge: row
                .number(columns.charge)?
                .ok_or_else(|| ParseError::malformed(line, row.name(columns.charge), "empty value"))?,
            peptide,
            protein: row.required(columns.protein)?.to_string(),
            additional_proteins: match columns.protein_count {
                Some(index) => row.number(index)?.unwrap_or(0),
                None => 0,
            },
            rank: row.optional_number(columns.rank)?,
            calc_neutral_mass: row
                .optional_number::<f64>(columns.mh)?
                .map(|mh| mh - PROTON),
            mass_diff: row.optional_number(columns.mass_diff)?.unwrap_or(0.0),
            tolerable_termini: row.optional_number(columns.tolerable_termini)?,
            missed_cleavages: row.optional_number(columns.missed_cleavages)?,
            matched_ions,
            total_ions,
            rejected: matches!(row.optional_number::<u8>(columns.pass_filter)?, Some(0)),
            scores,
            flagged_residues,
        })
    }
}

impl<R: Read> Iterator for ResultReader<R> {
    type Item = Result<HitRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

/// Tab-delimited reader for companion tables.
///
/// No comment handling: `#` is a modification symbol in these tables.
pub(crate) fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    tsv_builder().from_reader(reader)
}

/// Tab-delimited reader for hit tables, skipping `#` comment lines
fn hit_table_reader<R: Read>(reader: R) -> csv::Reader<R> {
    tsv_builder().comment(Some(b'#')).from_reader(reader)
}

fn tsv_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(b'\t').flexible(true).has_headers(false).quoting(false);
    builder
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

struct RowView<'a> {
    record: &'a StringRecord,
    header: &'a [String],
    line: u64,
}

impl<'a> RowView<'a> {
    fn name(&self, index: usize) -> &str {
        self.header.get(index).map(String::as_str).unwrap_or("<unknown>")
    }

    fn required(&self, index: usize) -> Result<&'a str, ParseError> {
        let value = self
            .record
            .get(index)
            .ok_or_else(|| ParseError::malformed(self.line, self.name(index), "column absent"))?
            .trim();
        if value.is_empty() {
            return Err(ParseError::malformed(self.line, self.name(index), "empty value"));
        }
        Ok(value)
    }

    /// Numeric column; empty or absent yields `None`, non-numeric is an error
    fn number<T: std::str::FromStr + Finite>(&self, index: usize) -> Result<Option<T>, ParseError> {
        let Some(value) = self.record.get(index).map(str::trim) else {
            return Ok(None);
        };
        if value.is_empty() {
            return Ok(None);
        }
        let value = value.strip_prefix('+').unwrap_or(value);
        match value.parse::<T>() {
            Ok(parsed) if parsed.is_finite_value() => Ok(Some(parsed)),
            _ => Err(ParseError::malformed(
                self.line,
                self.name(index),
                format!("'{}' is not a valid number", value),
            )),
        }
    }

    fn optional_number<T: std::str::FromStr + Finite>(
        &self,
        index: Option<usize>,
    ) -> Result<Option<T>, ParseError> {
        match index {
            Some(index) => self.number(index),
            None => Ok(None),
        }
    }
}

trait Finite {
    fn is_finite_value(&self) -> bool;
}

impl Finite for f64 {
    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

macro_rules! impl_finite_int {
    ($($t:ty),*) => {
        $(impl Finite for $t {
            fn is_finite_value(&self) -> bool {
                true
            }
        })*
    };
}

impl_finite_int!(u8, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SEQUEST: &str = "\
HitNum\tScanNum\tChargeState\tMH\tXCorr\tDelCn\tSp\tReference\tMultiProtein\tPeptide\tDelCn2\tRankSp\tRankXc\tDelM\tXcRatio\tPassFilt\tNumTrypticEnds\tIons_Observed\tIons_Expected
1\t1234\t2\t1263.5833\t3.512\t0\t812.5\tSO_1234\t+1\tK.AVAAGM*NPM*DLK.E\t0.2113\t1\t1\t0.0032\t1\t1\t2\t15\t22
# a comment line

2\t1234\t2\t1201.6\t2.77\t0.21\t610.2\tSO_4321\t0\tR.LLPEPTIDEK.-\t0.05\t2\t2\t-0.0011\t0.79\t0\t1\t11\t18
";

    fn reader(text: &str) -> ResultReader<Cursor<Vec<u8>>> {
        ResultReader::new(Cursor::new(text.as_bytes().to_vec()), ParserOptions::default()).unwrap()
    }

    #[test]
    fn test_read_sequest_rows() {
        let mut reader = reader(SEQUEST);
        assert!(matches!(reader.layout(), ResultLayout::Sequest(_)));

        let rows: Vec<HitRow> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(reader.rows_read(), 2);

        let first = &rows[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.scan, 1234);
        assert_eq!(first.charge, 2);
        assert_eq!(first.peptide.sequence(), "AVAAGMNPMDLK");
        assert_eq!(first.additional_proteins, 1);
        assert_eq!(first.rank, Some(1));
        assert!((first.calc_neutral_mass.unwrap() - (1263.5833 - PROTON)).abs() < 1e-9);
        assert_eq!(first.tolerable_termini, Some(2));
        assert_eq!((first.matched_ions, first.total_ions), (15, 22));
        assert!(!first.rejected);
        assert_eq!(first.scores[0], NamedScore { name: "xcorr", value: 3.512 });

        assert!(rows[1].rejected);
        assert_eq!(rows[1].peptide.next_aa, '-');
    }

    #[test]
    fn test_malformed_row_does_not_stop_reading() {
        let text = "\
ResultID\tScan\tCharge\tPeptide\tProtein\tMSGFScore\tSpecEValue
1\tabc\t2\tK.PEPTIDE.R\tP1\t100\t1e-10
2\t10\t2\tK.PEPTIDE.R\tP1\t90\t1.5E-9
";
        let results: Vec<_> = reader(text).collect();
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(ParseError::MalformedRow { line, column, .. }) => {
                assert_eq!(*line, 2);
                assert_eq!(column, "Scan");
            }
            other => panic!("expected malformed row, got {:?}", other),
        }
        let row = results[1].as_ref().unwrap();
        assert_eq!(row.scores[1], NamedScore { name: "specevalue", value: 1.5e-9 });
    }

    #[test]
    fn test_flagged_residues_are_reported_not_fatal() {
        let text = "Scan\tCharge\tPeptide\tProtein\n5\t3\tK.PEPXIDE.R\tP1\n";
        let row = reader(text).next().unwrap().unwrap();
        assert_eq!(row.flagged_residues, vec!['X']);
        assert_eq!(row.result_id, 1);
    }

    #[test]
    fn test_xtandem_expectation_is_exponentiated() {
        let text = "Result_ID\tScan\tCharge\tPeptide_MH\tPeptide_Hyperscore\tPeptide_Expectation_Value_Log(e)\tPeptide_Sequence\tProtein\tb_ions\ty_ions\n\
7\t100\t2\t1000.5\t45.2\t-3\tK.PEPTIDER.A\tP1\t3\t4\n";
        let row = reader(text).next().unwrap().unwrap();
        let expect = row.scores.iter().find(|s| s.name == "expect").unwrap();
        assert!((expect.value - 0.001).abs() < 1e-12);
        assert_eq!((row.matched_ions, row.total_ions), (7, 14));
        assert_eq!(row.result_id, 7);
    }

    #[test]
    fn test_empty_file() {
        let err = ResultReader::new(Cursor::new(Vec::new()), ParserOptions::default()).err().unwrap();
        assert!(matches!(err, ParseError::UnrecognizedLayout(_)));
    }
}
