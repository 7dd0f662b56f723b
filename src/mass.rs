//! Residue and terminus mass tables.
//!
//! Monoisotopic values follow the Unimod residue table; average values use
//! IUPAC average atomic weights. The ambiguous codes `B`, `Z` and `J` carry
//! averaged masses so that peptides containing them can still be written.
//! `X` has no mass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mass of a proton
pub const PROTON: f64 = 1.007276466;

/// Monoisotopic mass of the peptide N-terminal hydrogen
pub const N_TERMINUS_MONO: f64 = 1.0078250321;

/// Monoisotopic mass of the peptide C-terminal hydroxyl
pub const C_TERMINUS_MONO: f64 = 17.00273965;

/// Average mass of the peptide N-terminal hydrogen
pub const N_TERMINUS_AVG: f64 = 1.00794;

/// Average mass of the peptide C-terminal hydroxyl
pub const C_TERMINUS_AVG: f64 = 17.00734;

/// Mass type declared for precursor or fragment masses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassType {
    /// Monoisotopic masses (default)
    #[default]
    Monoisotopic,
    /// Average masses
    Average,
}

impl MassType {
    /// Mass of the unmodified peptide N-terminus (H)
    pub fn n_terminus(&self) -> f64 {
        match self {
            MassType::Monoisotopic => N_TERMINUS_MONO,
            MassType::Average => N_TERMINUS_AVG,
        }
    }

    /// Mass of the unmodified peptide C-terminus (OH)
    pub fn c_terminus(&self) -> f64 {
        match self {
            MassType::Monoisotopic => C_TERMINUS_MONO,
            MassType::Average => C_TERMINUS_AVG,
        }
    }

    /// Unmodified residue mass, `None` for codes without a defined mass
    pub fn residue(&self, residue: u8) -> Option<f64> {
        match self {
            MassType::Monoisotopic => monoisotopic(residue),
            MassType::Average => average(residue),
        }
    }
}

impl fmt::Display for MassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MassType::Monoisotopic => write!(f, "monoisotopic"),
            MassType::Average => write!(f, "average"),
        }
    }
}

impl FromStr for MassType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monoisotopic" | "mono" => Ok(MassType::Monoisotopic),
            "average" | "avg" => Ok(MassType::Average),
            other => Err(format!("unknown mass type: {}", other)),
        }
    }
}

fn monoisotopic(residue: u8) -> Option<f64> {
    let mass = match residue {
        b'A' => 71.037114,
        b'R' => 156.101111,
        b'N' => 114.042927,
        b'D' => 115.026943,
        b'C' => 103.009185,
        b'E' => 129.042593,
        b'Q' => 128.058578,
        b'G' => 57.021464,
        b'H' => 137.058912,
        b'I' => 113.084064,
        b'L' => 113.084064,
        b'K' => 128.094963,
        b'M' => 131.040485,
        b'F' => 147.068414,
        b'P' => 97.052764,
        b'S' => 87.032028,
        b'T' => 101.047679,
        b'W' => 186.079313,
        b'Y' => 163.063329,
        b'V' => 99.068414,
        b'U' => 150.953633,
        b'O' => 237.147727,
        b'B' => 114.534935,
        b'Z' => 128.550585,
        b'J' => 113.084064,
        _ => return None,
    };
    Some(mass)
}

fn average(residue: u8) -> Option<f64> {
    let mass = match residue {
        b'A' => 71.0779,
        b'R' => 156.1857,
        b'N' => 114.1026,
        b'D' => 115.0874,
        b'C' => 103.1429,
        b'E' => 129.1140,
        b'Q' => 128.1292,
        b'G' => 57.0513,
        b'H' => 137.1393,
        b'I' => 113.1576,
        b'L' => 113.1576,
        b'K' => 128.1723,
        b'M' => 131.1961,
        b'F' => 147.1739,
        b'P' => 97.1152,
        b'S' => 87.0773,
        b'T' => 101.1039,
        b'W' => 186.2099,
        b'Y' => 163.1733,
        b'V' => 99.1311,
        b'U' => 150.0379,
        b'O' => 237.2982,
        b'B' => 114.5950,
        b'Z' => 128.6216,
        b'J' => 113.1576,
        _ => return None,
    };
    Some(mass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_methionine_oxidation_total() {
        let base = MassType::Monoisotopic.residue(b'M').unwrap();
        assert!((base + 15.9949 - 147.0354).abs() < 0.0001);
    }

    #[test]
    fn test_terminus_masses() {
        assert!((MassType::Monoisotopic.n_terminus() + 42.01057 - 43.01839).abs() < 0.0001);
        assert!((MassType::Monoisotopic.c_terminus() + 4.0085 - 21.0112).abs() < 0.0001);
    }

    #[test]
    fn test_unknown_residue() {
        assert_eq!(MassType::Monoisotopic.residue(b'X'), None);
        assert_eq!(MassType::Average.residue(b'1'), None);
    }

    #[test]
    fn test_mass_type_parse() {
        assert_eq!("avg".parse::<MassType>().unwrap(), MassType::Average);
        assert_eq!("Monoisotopic".parse::<MassType>().unwrap(), MassType::Monoisotopic);
        assert!("heavy".parse::<MassType>().is_err());
        assert_eq!(MassType::Average.to_string(), "average");
    }
}
