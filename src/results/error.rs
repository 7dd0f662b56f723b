/// Errors that can occur while reading a hit table
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// I/O error reading the hit table
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV/TSV error outside of a data row (e.g. an unreadable header)
    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// The header matches none of the known layouts
    #[error("Unrecognized hit table layout; header columns: {0}")]
    UnrecognizedLayout(String),

    /// A column the detected layout requires is absent from the header
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// One row is unusable; the rest of the file is unaffected
    #[error("Malformed row at line {line}, column {column}: {reason}")]
    MalformedRow {
        /// 1-based line number in the hit table
        line: u64,
        /// Offending column name
        column: String,
        /// What was wrong with the value
        reason: String,
    },

    /// The peptide contains residue codes the run was told to skip
    #[error("Peptide at line {line} contains disallowed residues {residues:?}")]
    DisallowedResidue {
        /// 1-based line number in the hit table
        line: u64,
        /// Offending residue codes
        residues: Vec<char>,
    },
}

impl ParseError {
    pub(crate) fn malformed(line: u64, column: &str, reason: impl Into<String>) -> Self {
        ParseError::MalformedRow {
            line,
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error is confined to a single row
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            ParseError::MalformedRow { .. } | ParseError::DisallowedResidue { .. }
        )
    }
}

/// Errors in an annotated peptide string
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SequenceError {
    /// No residues between the flanking dots
    #[error("empty peptide sequence")]
    Empty,

    /// A character that is neither a residue, a symbol nor an annotation
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    /// A bracketed annotation that is not closed
    #[error("unterminated mass annotation starting at offset {0}")]
    Unterminated(usize),

    /// A bracketed annotation whose content is not a number
    #[error("invalid mass annotation '{0}'")]
    InvalidMass(String),

    /// An annotation or symbol with no residue before it
    #[error("modification annotation at offset {0} has no residue")]
    Dangling(usize),
}
