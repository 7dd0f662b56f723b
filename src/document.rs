//! # Document Assembler
//!
//! Builds the in-memory form of one dataset's output: a [`SearchSummary`] and
//! its ordered [`SpectrumQuery`] groups. Hits arrive in row order; consecutive
//! rows with the same (scan, charge) form one spectrum query. Ranks are taken
//! from the input and never reordered; top-N limiting keeps the best-ranked
//! hits of a group but writes them in row order.

use crate::enrichment::Enrichment;
use crate::enzyme::EnzymeRule;
use crate::mass::MassType;
use crate::modifications::{ModificationDefinition, ModificationInfo};
use crate::results::{HitRow, ParseError};

/// Per-dataset search summary
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    /// Dataset name, used for `base_name` and spectrum names
    pub base_name: String,
    /// Search engine identifier
    pub search_engine: String,
    /// Mass type of precursor masses
    pub precursor_mass_type: MassType,
    /// Mass type of fragment masses
    pub fragment_mass_type: MassType,
    /// Cleavage rule
    pub enzyme: EnzymeRule,
    /// Maximum missed cleavages allowed by the search
    pub max_missed_cleavages: u32,
    /// Minimum tolerable termini required by the search
    pub min_termini: u8,
    /// Protein database path
    pub database: Option<String>,
    /// Modification definitions in catalog order
    pub modifications: Vec<ModificationDefinition>,
    /// Free-form search parameters
    pub parameters: Vec<(String, String)>,
}

/// A protein other than the primary one that the peptide maps to
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeProtein {
    /// Protein accession
    pub protein: String,
    /// Description, when known
    pub description: Option<String>,
    /// Tolerable termini in this protein's context
    pub tolerable_termini: u8,
}

/// A named score on a hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchScore {
    /// Score name
    pub name: String,
    /// Score value
    pub value: f64,
}

/// One candidate peptide for a spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideHit {
    /// Source result id
    pub result_id: u64,
    /// Hit rank within the spectrum
    pub rank: u32,
    /// Plain peptide sequence
    pub peptide: String,
    /// Residue before the peptide
    pub prev_aa: char,
    /// Residue after the peptide
    pub next_aa: char,
    /// Primary protein
    pub protein: String,
    /// Primary protein description
    pub protein_description: Option<String>,
    /// Total number of proteins the peptide maps to
    pub num_tot_proteins: u32,
    /// Matched fragment ions
    pub matched_ions: u32,
    /// Total theoretical fragment ions
    pub total_ions: u32,
    /// Calculated neutral peptide mass
    pub calc_neutral_mass: f64,
    /// Observed minus calculated mass
    pub mass_diff: f64,
    /// Tolerable termini
    pub tolerable_termini: u8,
    /// Missed cleavages
    pub missed_cleavages: u32,
    /// Failed the upstream filter
    pub rejected: bool,
    /// Other proteins
    pub alternatives: Vec<AlternativeProtein>,
    /// Modified residues and termini
    pub modifications: ModificationInfo,
    /// Named scores
    pub scores: Vec<SearchScore>,
}

/// All hits for one (scan, charge)
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumQuery {
    /// `<dataset>.<scan>.<scan>.<charge>`
    pub spectrum: String,
    /// Scan number
    pub scan: u32,
    /// Assumed charge
    pub charge: u8,
    /// Observed neutral precursor mass
    pub precursor_neutral_mass: f64,
    /// 1-based position within the run
    pub index: u32,
    /// Elution time in seconds
    pub retention_time_sec: Option<f64>,
    /// Hits in row order
    pub hits: Vec<PeptideHit>,
}

/// A finished dataset, ready to serialize
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRun {
    /// Search summary
    pub summary: SearchSummary,
    /// Spectrum queries in row order
    pub queries: Vec<SpectrumQuery>,
}

impl AssembledRun {
    /// Number of hits across all queries
    pub fn hit_count(&self) -> usize {
        self.queries.iter().map(|q| q.hits.len()).sum()
    }
}

/// Assembler settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Keep at most this many hits per spectrum; `None` keeps all
    pub hits_per_spectrum: Option<usize>,
    /// Drop peptides with disallowed residue codes
    pub skip_ambiguous_residues: bool,
}

struct PendingHit {
    rank: Option<u32>,
    hit: PeptideHit,
}

struct PendingQuery {
    scan: u32,
    charge: u8,
    retention_time_sec: Option<f64>,
    hits: Vec<PendingHit>,
}

/// Accumulates hits for one dataset
pub struct Assembler {
    summary: SearchSummary,
    options: AssemblerOptions,
    queries: Vec<SpectrumQuery>,
    pending: Option<PendingQuery>,
    hits_dropped: usize,
}

impl Assembler {
    /// Assembler for a dataset
    pub fn new(summary: SearchSummary, options: AssemblerOptions) -> Self {
        Self {
            summary,
            options,
            queries: Vec::new(),
            pending: None,
            hits_dropped: 0,
        }
    }

    /// The summary hits are assembled under
    pub fn summary(&self) -> &SearchSummary {
        &self.summary
    }

    /// Hits dropped by top-N limiting so far
    pub fn hits_dropped(&self) -> usize {
        self.hits_dropped
    }

    /// Add a mapped row.
    ///
    /// Fails with [`ParseError::DisallowedResidue`] when the peptide carries
    /// disallowed residue codes and such peptides are skipped.
    pub fn add(&mut self, row: &HitRow, modifications: ModificationInfo, enrichment: &Enrichment) -> Result<(), ParseError> {
        if self.options.skip_ambiguous_residues && !row.flagged_residues.is_empty() {
            return Err(ParseError::DisallowedResidue {
                line: row.line,
                residues: row.flagged_residues.clone(),
            });
        }

        let hit = self.build_hit(row, modifications, enrichment);

        let same_group = self
            .pending
            .as_ref()
            .is_some_and(|p| p.scan == row.scan && p.charge == row.charge);
        if !same_group {
            self.close_group();
            self.pending = Some(PendingQuery {
                scan: row.scan,
                charge: row.charge,
                retention_time_sec: enrichment.elution.elution_time(row.scan),
                hits: Vec::new(),
            });
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.hits.push(PendingHit { rank: row.rank, hit });
        }
        Ok(())
    }

    /// Close the last group and hand off the run
    pub fn finish(mut self) -> AssembledRun {
        self.close_group();
        AssembledRun {
            summary: self.summary,
            queries: self.queries,
        }
    }

    fn build_hit(&self, row: &HitRow, modifications: ModificationInfo, enrichment: &Enrichment) -> PeptideHit {
        let peptide = &row.peptide;
        let enzyme = &self.summary.enzyme;
        let tolerable_termini = row
            .tolerable_termini
            .unwrap_or_else(|| enzyme.tolerable_termini(peptide.prev_aa, &peptide.residues, peptide.next_aa));
        let missed_cleavages = row
            .missed_cleavages
            .unwrap_or_else(|| enzyme.missed_cleavages(&peptide.residues));

        let alternatives: Vec<AlternativeProtein> = enrichment
            .proteins
            .proteins(row.result_id)
            .unwrap_or_default()
            .iter()
            .filter(|p| p.protein != row.protein)
            .map(|p| AlternativeProtein {
                protein: p.protein.clone(),
                description: enrichment.descriptions.description(&p.protein).map(str::to_string),
                tolerable_termini: p.tolerable_termini.unwrap_or(tolerable_termini),
            })
            .collect();
        let num_tot_proteins = if alternatives.is_empty() {
            1 + row.additional_proteins
        } else {
            1 + alternatives.len() as u32
        };

        let mut scores: Vec<SearchScore> = row
            .scores
            .iter()
            .map(|s| SearchScore {
                name: s.name.to_string(),
                value: s.value,
            })
            .collect();
        if let Some(value) = enrichment.confidence.confidence(row.result_id) {
            scores.push(SearchScore {
                name: enrichment.confidence.score_name().to_string(),
                value,
            });
        }

        let calc_neutral_mass = row
            .calc_neutral_mass
            .unwrap_or_else(|| neutral_mass(&peptide.residues, &modifications, self.summary.precursor_mass_type));

        PeptideHit {
            result_id: row.result_id,
            rank: row.rank.unwrap_or(0),
            peptide: peptide.sequence(),
            prev_aa: peptide.prev_aa,
            next_aa: peptide.next_aa,
            protein: row.protein.clone(),
            protein_description: enrichment.descriptions.description(&row.protein).map(str::to_string),
            num_tot_proteins,
            matched_ions: row.matched_ions,
            total_ions: row.total_ions,
            calc_neutral_mass,
            mass_diff: row.mass_diff,
            tolerable_termini,
            missed_cleavages,
            rejected: row.rejected,
            alternatives,
            modifications,
            scores,
        }
    }

    fn close_group(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let mut hits: Vec<(usize, u32, PeptideHit)> = pending
            .hits
            .into_iter()
            .enumerate()
            .map(|(order, p)| {
                let rank = p.rank.unwrap_or(order as u32 + 1);
                (order, rank, p.hit)
            })
            .collect();

        if let Some(limit) = self.options.hits_per_spectrum {
            if hits.len() > limit {
                self.hits_dropped += hits.len() - limit;
                hits.sort_by_key(|(_, rank, _)| *rank);
                hits.truncate(limit);
                hits.sort_by_key(|(order, _, _)| *order);
            }
        }

        let hits: Vec<PeptideHit> = hits
            .into_iter()
            .map(|(_, rank, mut hit)| {
                hit.rank = rank;
                hit
            })
            .collect();
        let Some(first) = hits.first() else {
            return;
        };
        let precursor_neutral_mass = first.calc_neutral_mass + first.mass_diff;

        let index = self.queries.len() as u32 + 1;
        self.queries.push(SpectrumQuery {
            spectrum: format!(
                "{}.{}.{}.{}",
                self.summary.base_name, pending.scan, pending.scan, pending.charge
            ),
            scan: pending.scan,
            charge: pending.charge,
            precursor_neutral_mass,
            index,
            retention_time_sec: pending.retention_time_sec,
            hits,
        });
    }
}

/// Neutral peptide mass from residue masses and mapped modifications
pub fn neutral_mass(residues: &[u8], modifications: &ModificationInfo, mass_type: MassType) -> f64 {
    let mut total: f64 = residues.iter().filter_map(|&r| mass_type.residue(r)).sum();
    for modified in &modifications.residues {
        if let Some(base) = residues
            .get(modified.position - 1)
            .and_then(|&r| mass_type.residue(r))
        {
            total += modified.mass - base;
        }
    }
    total += modifications.nterm_mass.unwrap_or_else(|| mass_type.n_terminus());
    total += modifications.cterm_mass.unwrap_or_else(|| mass_type.c_terminus());
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifications::ModifiedResidue;
    use crate::results::{AnnotatedPeptide, NamedScore};

    fn summary() -> SearchSummary {
        SearchSummary {
            base_name: "QC_Shew".to_string(),
            search_engine: "SEQUEST".to_string(),
            precursor_mass_type: MassType::Monoisotopic,
            fragment_mass_type: MassType::Monoisotopic,
            enzyme: EnzymeRule::trypsin(),
            max_missed_cleavages: 2,
            min_termini: 1,
            database: None,
            modifications: Vec::new(),
            parameters: Vec::new(),
        }
    }

    fn row(line: u64, scan: u32, charge: u8, rank: Option<u32>, peptide: &str) -> HitRow {
        HitRow {
            line,
            result_id: line,
            scan,
            charge,
            peptide: AnnotatedPeptide::parse(peptide).unwrap(),
            protein: "P1".to_string(),
            additional_proteins: 0,
            rank,
            calc_neutral_mass: Some(1000.0),
            mass_diff: 0.5,
            tolerable_termini: None,
            missed_cleavages: None,
            matched_ions: 0,
            total_ions: 0,
            rejected: false,
            scores: vec![NamedScore { name: "xcorr", value: 2.5 }],
            flagged_residues: Vec::new(),
        }
    }

    fn assemble(rows: &[HitRow], options: AssemblerOptions) -> AssembledRun {
        let enrichment = Enrichment::none();
        let mut assembler = Assembler::new(summary(), options);
        for r in rows {
            assembler.add(r, ModificationInfo::default(), &enrichment).unwrap();
        }
        assembler.finish()
    }

    #[test]
    fn test_groups_by_consecutive_scan_and_charge() {
        let rows = vec![
            row(2, 100, 2, Some(1), "K.PEPTIDEK.A"),
            row(3, 100, 2, Some(2), "K.PEPTIDER.A"),
            row(4, 100, 3, Some(1), "K.PEPTIDEK.A"),
            row(5, 101, 2, Some(1), "K.PEPTIDEK.A"),
        ];
        let run = assemble(&rows, AssemblerOptions::default());
        assert_eq!(run.queries.len(), 3);
        assert_eq!(run.queries[0].spectrum, "QC_Shew.100.100.2");
        assert_eq!(run.queries[0].hits.len(), 2);
        assert_eq!(run.queries[1].spectrum, "QC_Shew.100.100.3");
        let indices: Vec<u32> = run.queries.iter().map(|q| q.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!((run.queries[0].precursor_neutral_mass - 1000.5).abs() < 1e-9);
        assert_eq!(run.hit_count(), 4);
    }

    #[test]
    fn test_top_n_keeps_best_ranks_in_row_order() {
        let rows = vec![
            row(2, 100, 2, Some(3), "K.AAAK.A"),
            row(3, 100, 2, Some(1), "K.CCCK.A"),
            row(4, 100, 2, Some(2), "K.DDDK.A"),
        ];
        let run = assemble(
            &rows,
            AssemblerOptions {
                hits_per_spectrum: Some(2),
                ..Default::default()
            },
        );
        let hits: Vec<(u32, &str)> = run.queries[0]
            .hits
            .iter()
            .map(|h| (h.rank, h.peptide.as_str()))
            .collect();
        assert_eq!(hits, vec![(1, "CCCK"), (2, "DDDK")]);

        let all = assemble(&rows, AssemblerOptions::default());
        assert_eq!(all.queries[0].hits.len(), 3);

        let generous = assemble(
            &rows,
            AssemblerOptions {
                hits_per_spectrum: Some(10),
                ..Default::default()
            },
        );
        assert_eq!(generous.queries[0].hits.len(), 3);
    }

    #[test]
    fn test_missing_rank_follows_group_order() {
        let rows = vec![row(2, 7, 2, None, "K.AAAK.A"), row(3, 7, 2, None, "K.CCCK.A")];
        let run = assemble(&rows, AssemblerOptions::default());
        let ranks: Vec<u32> = run.queries[0].hits.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn test_enzyme_fills_missing_termini_and_cleavages() {
        let run = assemble(&[row(2, 7, 2, Some(1), "R.AKDEPK.-")], AssemblerOptions::default());
        let hit = &run.queries[0].hits[0];
        assert_eq!(hit.tolerable_termini, 2);
        assert_eq!(hit.missed_cleavages, 1);
    }

    #[test]
    fn test_disallowed_residues_are_skipped_when_requested() {
        let mut flagged = row(2, 7, 2, Some(1), "K.PEPXK.A");
        flagged.flagged_residues = vec!['X'];
        let enrichment = Enrichment::none();
        let mut assembler = Assembler::new(
            summary(),
            AssemblerOptions {
                skip_ambiguous_residues: true,
                ..Default::default()
            },
        );
        let err = assembler.add(&flagged, ModificationInfo::default(), &enrichment).unwrap_err();
        assert!(matches!(err, ParseError::DisallowedResidue { line: 2, .. }));
        assert!(assembler.finish().queries.is_empty());
    }

    #[test]
    fn test_neutral_mass_from_modifications() {
        let peptide = AnnotatedPeptide::parse("GM").unwrap();
        let unmodified = neutral_mass(&peptide.residues, &ModificationInfo::default(), MassType::Monoisotopic);
        // G + M + H2O
        assert!((unmodified - 206.0725).abs() < 0.001);

        let oxidized = ModificationInfo {
            residues: vec![ModifiedResidue { position: 2, mass: 147.0354 }],
            ..Default::default()
        };
        let modified = neutral_mass(&peptide.residues, &oxidized, MassType::Monoisotopic);
        assert!((modified - unmodified - 15.9949).abs() < 0.001);
    }
}
