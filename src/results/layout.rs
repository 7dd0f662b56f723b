//! Hit table layouts.
//!
//! Each upstream search engine writes its own column set. The layout is
//! resolved once from the header into column indices; rows are then read by
//! index without any per-row name lookup.

use std::collections::HashMap;
use std::fmt;

use csv::StringRecord;

use super::error::ParseError;

/// How a score column is converted before being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTransform {
    /// Written as read
    Identity,
    /// Column holds log10(value); written as 10^value
    Exp10,
}

/// A score column and the name it is written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreColumn {
    /// Output score name
    pub name: &'static str,
    /// Column index
    pub index: usize,
    /// Conversion applied to the raw value
    pub transform: ScoreTransform,
}

/// Where fragment ion counts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IonColumns {
    /// Not reported by this layout
    None,
    /// Matched and expected counts in separate columns
    ObservedExpected {
        /// Matched ion count column
        observed: usize,
        /// Expected ion count column
        expected: usize,
    },
    /// Matched b and y ion counts; the total is derived from peptide length
    BAndY {
        /// Matched b ion count column
        b: usize,
        /// Matched y ion count column
        y: usize,
    },
}

/// Column indices shared by every layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutColumns {
    /// Result identifier
    pub result_id: Option<usize>,
    /// Scan number
    pub scan: usize,
    /// Precursor charge
    pub charge: usize,
    /// Annotated peptide
    pub peptide: usize,
    /// Primary protein
    pub protein: usize,
    /// Hit rank
    pub rank: Option<usize>,
    /// Protonated theoretical peptide mass (MH)
    pub mh: Option<usize>,
    /// Observed minus calculated mass
    pub mass_diff: Option<usize>,
    /// Number of tolerable termini
    pub tolerable_termini: Option<usize>,
    /// Number of missed cleavages
    pub missed_cleavages: Option<usize>,
    /// Count of additional proteins
    pub protein_count: Option<usize>,
    /// Pass/fail filter flag
    pub pass_filter: Option<usize>,
    /// Fragment ion counts
    pub ions: IonColumns,
    /// Score columns in output order
    pub scores: Vec<ScoreColumn>,
}

/// Known hit table layouts, resolved once per file from its header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLayout {
    /// SEQUEST synopsis / first-hits tables
    Sequest(LayoutColumns),
    /// X!Tandem result tables
    XTandem(LayoutColumns),
    /// MS-GF+ result tables
    MsgfPlus(LayoutColumns),
    /// Any table carrying the canonical column names
    Generic(LayoutColumns),
}

impl fmt::Display for ResultLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.search_engine())
    }
}

struct Header {
    names: HashMap<String, usize>,
    raw: Vec<String>,
}

impl Header {
    fn new(record: &StringRecord) -> Self {
        let raw: Vec<String> = record.iter().map(|s| s.trim().to_string()).collect();
        let mut names = HashMap::new();
        for (i, name) in raw.iter().enumerate() {
            names.entry(name.to_ascii_lowercase()).or_insert(i);
        }
        Self { names, raw }
    }

    fn has(&self, name: &str) -> bool {
        self.names.contains_key(&name.to_ascii_lowercase())
    }

    fn find(&self, candidates: &[&str]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|c| self.names.get(&c.to_ascii_lowercase()).copied())
    }

    fn require(&self, candidates: &[&str]) -> Result<usize, ParseError> {
        self.find(candidates)
            .ok_or_else(|| ParseError::MissingColumn(candidates[0].to_string()))
    }

    fn scores(&self, table: &[(&'static str, &[&str], ScoreTransform)]) -> Vec<ScoreColumn> {
        table
            .iter()
            .filter_map(|(name, candidates, transform)| {
                self.find(candidates).map(|index| ScoreColumn {
                    name: *name,
                    index,
                    transform: *transform,
                })
            })
            .collect()
    }
}

use ScoreTransform::{Exp10, Identity};

const SEQUEST_SCORES: &[(&str, &[&str], ScoreTransform)] = &[
    ("xcorr", &["XCorr"], Identity),
    ("deltacn", &["DelCn2"], Identity),
    ("deltacnstar", &["DelCn"], Identity),
    ("spscore", &["Sp"], Identity),
    ("sprank", &["RankSp"], Identity),
    ("xcratio", &["XcRatio"], Identity),
];

const XTANDEM_SCORES: &[(&str, &[&str], ScoreTransform)] = &[
    ("hyperscore", &["Peptide_Hyperscore"], Identity),
    ("expect", &["Peptide_Expectation_Value_Log(e)", "Peptide_Expectation_Value_LogE"], Exp10),
    ("nextscore", &["DeltaCn2"], Identity),
    ("y_score", &["y_score"], Identity),
    ("b_score", &["b_score"], Identity),
];

const MSGF_SCORES: &[(&str, &[&str], ScoreTransform)] = &[
    ("msgfscore", &["MSGFScore"], Identity),
    ("denovoscore", &["DeNovoScore"], Identity),
    ("specevalue", &["SpecEValue", "MSGFDB_SpecEValue", "MSGFDB_SpecProb"], Identity),
    ("evalue", &["EValue", "PValue"], Identity),
    ("qvalue", &["QValue", "FDR"], Identity),
    ("pepqvalue", &["PepQValue", "PepFDR"], Identity),
];

const GENERIC_SCORES: &[(&str, &[&str], ScoreTransform)] = &[
    ("score", &["Score"], Identity),
    ("expect", &["EValue", "Expect"], Identity),
];

impl ResultLayout {
    /// Resolve the layout from a header record
    pub fn detect(header: &StringRecord) -> Result<Self, ParseError> {
        let header = Header::new(header);

        if header.has("XCorr") && header.has("DelCn") {
            let columns = LayoutColumns {
                result_id: header.find(&["HitNum", "ResultID", "Result_ID"]),
                scan: header.require(&["ScanNum", "Scan"])?,
                charge: header.require(&["ChargeState", "Charge"])?,
                peptide: header.require(&["Peptide"])?,
                protein: header.require(&["Reference", "Protein"])?,
                rank: header.find(&["RankXc", "Rank"]),
                mh: header.find(&["MH"]),
                mass_diff: header.find(&["DelM"]),
                tolerable_termini: header.find(&["NumTrypticEnds", "NTT"]),
                missed_cleavages: header.find(&["MissedCleavages"]),
                protein_count: header.find(&["MultiProtein"]),
                pass_filter: header.find(&["PassFilt"]),
                ions: match (header.find(&["Ions_Observed"]), header.find(&["Ions_Expected"])) {
                    (Some(observed), Some(expected)) => IonColumns::ObservedExpected { observed, expected },
                    _ => IonColumns::None,
                },
                scores: header.scores(SEQUEST_SCORES),
            };
            return Ok(ResultLayout::Sequest(columns));
        }

        if header.has("Peptide_Hyperscore") {
            let columns = LayoutColumns {
                result_id: header.find(&["Result_ID", "ResultID"]),
                scan: header.require(&["Scan"])?,
                charge: header.require(&["Charge"])?,
                peptide: header.require(&["Peptide_Sequence", "Peptide"])?,
                protein: header.require(&["Protein", "Protein_Name", "Reference"])?,
                rank: header.find(&["Rank"]),
                mh: header.find(&["Peptide_MH", "MH"]),
                mass_diff: header.find(&["Delta_Mass", "DelM"]),
                tolerable_termini: header.find(&["NTT", "NumTrypticEnds"]),
                missed_cleavages: header.find(&["MissedCleavages"]),
                protein_count: header.find(&["Multiple_Protein_Count"]),
                pass_filter: None,
                ions: match (header.find(&["b_ions"]), header.find(&["y_ions"])) {
                    (Some(b), Some(y)) => IonColumns::BAndY { b, y },
                    _ => IonColumns::None,
                },
                scores: header.scores(XTANDEM_SCORES),
            };
            return Ok(ResultLayout::XTandem(columns));
        }

        if header.has("MSGFScore") || header.has("SpecEValue") || header.has("MSGFDB_SpecEValue") {
            let columns = LayoutColumns {
                result_id: header.find(&["ResultID", "Result_ID"]),
                scan: header.require(&["Scan"])?,
                charge: header.require(&["Charge"])?,
                peptide: header.require(&["Peptide"])?,
                protein: header.require(&["Protein"])?,
                rank: header.find(&["Rank"]),
                mh: header.find(&["MH"]),
                mass_diff: header.find(&["DelM"]),
                tolerable_termini: header.find(&["NTT"]),
                missed_cleavages: header.find(&["MissedCleavages"]),
                protein_count: header.find(&["Multiple_Protein_Count"]),
                pass_filter: None,
                ions: IonColumns::None,
                scores: header.scores(MSGF_SCORES),
            };
            return Ok(ResultLayout::MsgfPlus(columns));
        }

        if header.has("Peptide") && header.has("Scan") && header.has("Protein") {
            let columns = LayoutColumns {
                result_id: header.find(&["ResultID", "Result_ID"]),
                scan: header.require(&["Scan"])?,
                charge: header.require(&["Charge"])?,
                peptide: header.require(&["Peptide"])?,
                protein: header.require(&["Protein"])?,
                rank: header.find(&["Rank"]),
                mh: header.find(&["MH"]),
                mass_diff: header.find(&["DelM"]),
                tolerable_termini: header.find(&["NTT"]),
                missed_cleavages: header.find(&["MissedCleavages"]),
                protein_count: header.find(&["ProteinCount"]),
                pass_filter: None,
                ions: IonColumns::None,
                scores: header.scores(GENERIC_SCORES),
            };
            return Ok(ResultLayout::Generic(columns));
        }

        Err(ParseError::UnrecognizedLayout(header.raw.join(", ")))
    }

    /// Column indices of this layout
    pub fn columns(&self) -> &LayoutColumns {
        match self {
            ResultLayout::Sequest(c)
            | ResultLayout::XTandem(c)
            | ResultLayout::MsgfPlus(c)
            | ResultLayout::Generic(c) => c,
        }
    }

    /// Search engine name written to `search_summary`
    pub fn search_engine(&self) -> &'static str {
        match self {
            ResultLayout::Sequest(_) => "SEQUEST",
            ResultLayout::XTandem(_) => "X! Tandem",
            ResultLayout::MsgfPlus(_) => "MS-GF+",
            ResultLayout::Generic(_) => "unknown",
        }
    }
}
