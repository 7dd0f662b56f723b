/// Errors from catalog resolution and per-hit modification mapping
#[derive(Debug, thiserror::Error)]
pub enum ModificationError {
    /// I/O error reading a modification table
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// TSV parsing error in a modification table
    #[error("TSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// A modification table is structurally invalid
    #[error("Invalid modification table: {0}")]
    InvalidCatalog(String),

    /// Evidence for which no definition exists or can be inferred
    #[error("Unresolvable modification on {target}: {detail}")]
    Unresolvable {
        /// Residue or terminus the evidence refers to
        target: String,
        /// What could not be matched
        detail: String,
    },

    /// Evidence matching more than one definition within tolerance
    #[error("Ambiguous modification on {target}: observed {observed:.4} matches {candidates}")]
    Ambiguous {
        /// Residue or terminus the evidence refers to
        target: String,
        /// Observed mass shift
        observed: f64,
        /// Matching definitions
        candidates: String,
    },

    /// More distinct modifications than available symbols
    #[error("No modification symbols left for {0}")]
    SymbolPoolExhausted(String),
}

impl ModificationError {
    /// Whether the error only concerns one hit
    pub fn is_hit_error(&self) -> bool {
        matches!(
            self,
            ModificationError::Unresolvable { .. } | ModificationError::Ambiguous { .. }
        )
    }
}
