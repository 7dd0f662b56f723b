//! Per-result modification details.
//!
//! Some hit tables only carry catalog symbols in the peptide column and list
//! the actual residue positions and mass shifts in a companion table keyed by
//! result id. Position `0` denotes the peptide N-terminus and `length + 1` the
//! C-terminus.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::ModificationError;
use crate::results::{tsv_reader, AnnotatedPeptide, Evidence, EvidenceKind, Site};

#[derive(Debug, Clone, Copy, PartialEq)]
struct DetailEntry {
    residue: char,
    position: usize,
    shift: f64,
}

/// Modification details grouped by result id
#[derive(Debug, Clone, Default)]
pub struct ModDetailsTable {
    entries: HashMap<u64, Vec<DetailEntry>>,
}

impl ModDetailsTable {
    /// Load a details table from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModificationError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a details table with `ResultID`, `Residue`, `Position` and `Mass_Shift` columns
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ModificationError> {
        let mut reader = tsv_reader(reader);
        let mut table = Self::default();
        let mut columns: Option<[usize; 4]> = None;

        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let Some([id_col, residue_col, position_col, shift_col]) = columns else {
                let find = |name: &str| {
                    record
                        .iter()
                        .position(|h| h.trim().eq_ignore_ascii_case(name))
                        .ok_or_else(|| {
                            ModificationError::InvalidCatalog(format!("modification details lack column {}", name))
                        })
                };
                columns = Some([find("ResultID")?, find("Residue")?, find("Position")?, find("Mass_Shift")?]);
                continue;
            };

            let field = |index: usize| record.get(index).map(str::trim).unwrap_or("");
            let invalid = |what: &str| {
                ModificationError::InvalidCatalog(format!(
                    "invalid {} in modification details: '{}'",
                    what,
                    record.iter().collect::<Vec<_>>().join("\t")
                ))
            };

            let result_id: u64 = field(id_col).parse().map_err(|_| invalid("result id"))?;
            let residue = field(residue_col).chars().next().ok_or_else(|| invalid("residue"))?;
            let position: usize = field(position_col).parse().map_err(|_| invalid("position"))?;
            let shift: f64 = field(shift_col)
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| invalid("mass shift"))?;

            table.entries.entry(result_id).or_default().push(DetailEntry {
                residue,
                position,
                shift,
            });
        }

        Ok(table)
    }

    /// Number of results with details
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no details
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evidence for one result, checked against the peptide it belongs to.
    ///
    /// Every residue carrying a symbol must have a detail at its position;
    /// a result without details has no evidence only when the peptide
    /// carries no symbols.
    pub fn evidence_for(
        &self,
        result_id: u64,
        peptide: &AnnotatedPeptide,
    ) -> Result<Vec<Evidence>, ModificationError> {
        let entries = self.entries.get(&result_id).map(Vec::as_slice).unwrap_or(&[]);

        for item in &peptide.evidence {
            if let (Site::Residue(i), EvidenceKind::Symbol(symbol)) = (item.site, item.kind) {
                if !entries.iter().any(|entry| entry.position == i + 1) {
                    return Err(ModificationError::Unresolvable {
                        target: (peptide.residues[i] as char).to_string(),
                        detail: format!(
                            "result {} has no modification details for '{}' at position {}",
                            result_id,
                            symbol,
                            i + 1
                        ),
                    });
                }
            }
        }

        let len = peptide.len();
        entries
            .iter()
            .map(|entry| {
                let site = match entry.position {
                    0 => Site::NTerm,
                    p if p == len + 1 => Site::CTerm,
                    p if p <= len => {
                        let actual = peptide.residues[p - 1] as char;
                        if entry.residue.is_ascii_uppercase() && entry.residue != actual {
                            return Err(ModificationError::Unresolvable {
                                target: actual.to_string(),
                                detail: format!(
                                    "result {} lists residue {} at position {}",
                                    result_id, entry.residue, p
                                ),
                            });
                        }
                        Site::Residue(p - 1)
                    }
                    p => {
                        return Err(ModificationError::Unresolvable {
                            target: peptide.sequence(),
                            detail: format!("result {} lists position {} beyond the peptide", result_id, p),
                        })
                    }
                };
                Ok(Evidence {
                    site,
                    kind: EvidenceKind::Shift(entry.shift),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DETAILS: &str = "\
ResultID\tResidue\tPosition\tMass_Shift\tModification_Symbol
1\tM\t6\t15.9949\t*
1\tM\t9\t15.9949\t*
2\t<\t0\t42.0106\t-
3\tK\t4\t8.0142\t-
";

    #[test]
    fn test_evidence_for_result() {
        let table = ModDetailsTable::from_reader(Cursor::new(DETAILS)).unwrap();
        assert_eq!(table.len(), 3);

        let peptide = AnnotatedPeptide::parse("K.AVAAGM*NPM*DLK.E").unwrap();
        let evidence = table.evidence_for(1, &peptide).unwrap();
        assert_eq!(
            evidence,
            vec![
                Evidence { site: Site::Residue(5), kind: EvidenceKind::Shift(15.9949) },
                Evidence { site: Site::Residue(8), kind: EvidenceKind::Shift(15.9949) },
            ]
        );

        let nterm = table.evidence_for(2, &AnnotatedPeptide::parse("K.PEPTIDE.R").unwrap()).unwrap();
        assert_eq!(nterm[0].site, Site::NTerm);

        let plain = AnnotatedPeptide::parse("K.AVAAGMNPMDLK.E").unwrap();
        assert!(table.evidence_for(99, &plain).unwrap().is_empty());
    }

    #[test]
    fn test_symbols_without_details_are_unresolvable() {
        let table = ModDetailsTable::from_reader(Cursor::new(DETAILS)).unwrap();

        let peptide = AnnotatedPeptide::parse("K.AVAAGM*NPM*DLK.E").unwrap();
        let err = table.evidence_for(99, &peptide).unwrap_err();
        assert!(matches!(err, ModificationError::Unresolvable { .. }));

        // Result 1 covers positions 6 and 9 only
        let extra = AnnotatedPeptide::parse("K.AVAAGM*NPM*DLK*.E").unwrap();
        let err = table.evidence_for(1, &extra).unwrap_err();
        assert!(err.to_string().contains("position 12"), "{}", err);
    }

    #[test]
    fn test_residue_mismatch_is_unresolvable() {
        let table = ModDetailsTable::from_reader(Cursor::new(DETAILS)).unwrap();
        let peptide = AnnotatedPeptide::parse("K.PEPTIDE.R").unwrap();
        let err = table.evidence_for(3, &peptide).unwrap_err();
        assert!(err.is_hit_error());
    }

    #[test]
    fn test_missing_column() {
        let err = ModDetailsTable::from_reader(Cursor::new("ResultID\tResidue\n1\tM\n")).unwrap_err();
        assert!(matches!(err, ModificationError::InvalidCatalog(_)));
    }
}
