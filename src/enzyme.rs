//! Enzymatic cleavage rule.
//!
//! Used to describe the search enzyme in the output and to compute the number
//! of tolerable termini and missed cleavages for hit tables that do not carry
//! those columns.

use serde::{Deserialize, Serialize};

/// Side of the cut site relative to the residues in `cut`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    /// Cleaves after the residue (trypsin)
    #[default]
    #[serde(rename = "C", alias = "c")]
    C,
    /// Cleaves before the residue (Asp-N)
    #[serde(rename = "N", alias = "n")]
    N,
}

impl Sense {
    /// Single-letter code used by pepXML
    pub fn as_str(&self) -> &'static str {
        match self {
            Sense::C => "C",
            Sense::N => "N",
        }
    }
}

/// A cleavage rule: cut residues, residues blocking the cut, and the sense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnzymeRule {
    /// Enzyme name written to `sample_enzyme`
    pub name: String,
    /// Residues at which the enzyme cuts; empty means non-specific
    pub cut: String,
    /// Residues that block the cut when adjacent
    #[serde(default)]
    pub no_cut: String,
    /// Cut side
    #[serde(default)]
    pub sense: Sense,
}

impl Default for EnzymeRule {
    fn default() -> Self {
        Self::trypsin()
    }
}

impl EnzymeRule {
    /// Trypsin: after K or R, not before P
    pub fn trypsin() -> Self {
        Self {
            name: "trypsin".to_string(),
            cut: "KR".to_string(),
            no_cut: "P".to_string(),
            sense: Sense::C,
        }
    }

    /// Non-specific cleavage
    pub fn no_enzyme() -> Self {
        Self {
            name: "nonspecific".to_string(),
            cut: String::new(),
            no_cut: String::new(),
            sense: Sense::C,
        }
    }

    /// Whether the rule cuts anywhere (empty `cut` means every bond is allowed)
    pub fn is_specific(&self) -> bool {
        !self.cut.is_empty()
    }

    fn cuts(&self, residue: u8) -> bool {
        self.cut.as_bytes().contains(&residue)
    }

    fn blocks(&self, residue: u8) -> bool {
        self.no_cut.as_bytes().contains(&residue)
    }

    /// Whether the bond between `left` and `right` is a cleavage site
    fn is_site(&self, left: u8, right: u8) -> bool {
        match self.sense {
            Sense::C => self.cuts(left) && !self.blocks(right),
            Sense::N => self.cuts(right) && !self.blocks(left),
        }
    }

    /// Internal cleavage sites the enzyme skipped
    pub fn missed_cleavages(&self, residues: &[u8]) -> u32 {
        if !self.is_specific() {
            return 0;
        }
        residues
            .windows(2)
            .filter(|pair| self.is_site(pair[0], pair[1]))
            .count() as u32
    }

    /// Number of peptide ends (0-2) consistent with the rule.
    ///
    /// `prev` and `next` are the flanking residues, `-` for a protein terminus.
    pub fn tolerable_termini(&self, prev: char, residues: &[u8], next: char) -> u8 {
        let (Some(&first), Some(&last)) = (residues.first(), residues.last()) else {
            return 0;
        };
        if !self.is_specific() {
            return 2;
        }
        let n_ok = prev == '-' || self.is_site(prev as u8, first);
        let c_ok = next == '-' || self.is_site(last, next as u8);
        n_ok as u8 + c_ok as u8
    }
}
