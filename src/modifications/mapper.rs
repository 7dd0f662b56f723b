//! Per-hit modification mapping.
//!
//! Resolves a peptide's evidence against a frozen [`ModificationCatalog`] and
//! produces the exact residue and terminal masses written to the output.
//! Statics apply to every occurrence of their target; variable definitions
//! only where evidence places them.

use serde::{Deserialize, Serialize};

use super::{ModificationCatalog, ModificationDefinition, ModificationError, ModificationTarget};
use crate::results::{AnnotatedPeptide, Evidence, EvidenceKind, Site, TERMINUS_MARKER};

/// Default tolerance when matching an observed mass shift to a definition
pub const DEFAULT_TOLERANCE: f64 = 0.0005;

/// What to do when evidence matches several definitions within tolerance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Reject the hit
    #[default]
    Fail,
    /// Take the definition closest to the observed shift; ties go to catalog order
    Closest,
}

impl std::str::FromStr for AmbiguityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(AmbiguityPolicy::Fail),
            "closest" => Ok(AmbiguityPolicy::Closest),
            other => Err(format!("unknown ambiguity policy '{}'", other)),
        }
    }
}

/// Mapper settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperOptions {
    /// Maximum |observed - defined| mass shift difference
    pub tolerance: f64,
    /// Ambiguity handling
    pub policy: AmbiguityPolicy,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            policy: AmbiguityPolicy::default(),
        }
    }
}

/// A modified residue: 1-based position and total residue mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifiedResidue {
    /// 1-based position in the peptide
    pub position: usize,
    /// Total mass of the modified residue
    pub mass: f64,
}

/// Modification masses for one hit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationInfo {
    /// Total N-terminal mass when the N-terminus is modified
    pub nterm_mass: Option<f64>,
    /// Total C-terminal mass when the C-terminus is modified
    pub cterm_mass: Option<f64>,
    /// Modified residues in increasing position
    pub residues: Vec<ModifiedResidue>,
}

impl ModificationInfo {
    /// Whether the hit carries no modification at all
    pub fn is_empty(&self) -> bool {
        self.nterm_mass.is_none() && self.cterm_mass.is_none() && self.residues.is_empty()
    }
}

/// Accumulated shift on one site
#[derive(Debug, Clone, Copy, Default)]
struct SiteShift {
    shift: f64,
    modified: bool,
}

impl SiteShift {
    fn add(&mut self, shift: f64) {
        self.shift += shift;
        self.modified = true;
    }
}

/// Maps hits against one catalog
#[derive(Debug, Clone, Copy)]
pub struct ModificationMapper<'a> {
    catalog: &'a ModificationCatalog,
    options: MapperOptions,
}

impl<'a> ModificationMapper<'a> {
    /// Mapper over a frozen catalog
    pub fn new(catalog: &'a ModificationCatalog, options: MapperOptions) -> Self {
        Self { catalog, options }
    }

    /// The catalog this mapper resolves against
    pub fn catalog(&self) -> &'a ModificationCatalog {
        self.catalog
    }

    /// Compute modification masses for a peptide from its evidence
    pub fn map(
        &self,
        peptide: &AnnotatedPeptide,
        evidence: &[Evidence],
    ) -> Result<ModificationInfo, ModificationError> {
        let mass_type = self.catalog.mass_type();
        let last = peptide.len().saturating_sub(1);
        let n_targets = n_terminal_targets(peptide);
        let c_terminal = c_terminal_targets(peptide);

        let mut residues: Vec<SiteShift> = peptide
            .residues
            .iter()
            .map(|&r| self.static_site(&[ModificationTarget::Residue(r)]))
            .collect();
        let mut nterm = self.static_site(&n_targets);
        let mut cterm = self.static_site(&c_terminal);

        for item in evidence {
            match (item.site, item.kind) {
                (Site::Residue(i), EvidenceKind::Symbol(symbol)) => {
                    let residue = ModificationTarget::Residue(peptide.residues[i]);
                    if let Some(def) = self.catalog.by_symbol(residue, symbol) {
                        residues[i].add(def.mass_shift);
                    } else if let Some(def) = (i == 0).then(|| self.symbol_on(&n_targets, symbol)).flatten() {
                        nterm.add(def.mass_shift);
                    } else if let Some(def) = (i == last).then(|| self.symbol_on(&c_terminal, symbol)).flatten() {
                        cterm.add(def.mass_shift);
                    } else {
                        return Err(ModificationError::Unresolvable {
                            target: residue.to_string(),
                            detail: format!("symbol '{}' is not in the catalog", symbol),
                        });
                    }
                }
                (Site::Residue(i), kind) => {
                    let residue = ModificationTarget::Residue(peptide.residues[i]);
                    let base = residue.base_mass(mass_type).ok_or_else(|| ModificationError::Unresolvable {
                        target: residue.to_string(),
                        detail: "residue has no defined mass".to_string(),
                    })?;
                    let observed = observed_shift(kind, base);
                    if let Some(def) = self.resolve_shift(&[residue], residues[i].shift, observed)? {
                        residues[i].add(def.mass_shift);
                    }
                }
                (Site::NTerm, EvidenceKind::Symbol(symbol)) => {
                    let def = self.symbol_on(&n_targets, symbol).ok_or_else(|| unknown_symbol(&n_targets, symbol))?;
                    nterm.add(def.mass_shift);
                }
                (Site::CTerm, EvidenceKind::Symbol(symbol)) => {
                    let def = self
                        .symbol_on(&c_terminal, symbol)
                        .ok_or_else(|| unknown_symbol(&c_terminal, symbol))?;
                    cterm.add(def.mass_shift);
                }
                (Site::NTerm, kind) => {
                    let observed = observed_shift(kind, mass_type.n_terminus());
                    if let Some(def) = self.resolve_shift(&n_targets, nterm.shift, observed)? {
                        nterm.add(def.mass_shift);
                    }
                }
                (Site::CTerm, kind) => {
                    let observed = observed_shift(kind, mass_type.c_terminus());
                    if let Some(def) = self.resolve_shift(&c_terminal, cterm.shift, observed)? {
                        cterm.add(def.mass_shift);
                    }
                }
            }
        }

        let mut info = ModificationInfo {
            nterm_mass: nterm.modified.then(|| mass_type.n_terminus() + nterm.shift),
            cterm_mass: cterm.modified.then(|| mass_type.c_terminus() + cterm.shift),
            residues: Vec::new(),
        };
        for (i, site) in residues.iter().enumerate() {
            if !site.modified {
                continue;
            }
            if let Some(base) = mass_type.residue(peptide.residues[i]) {
                info.residues.push(ModifiedResidue {
                    position: i + 1,
                    mass: base + site.shift,
                });
            }
        }
        Ok(info)
    }

    fn static_site(&self, targets: &[ModificationTarget]) -> SiteShift {
        let mut site = SiteShift::default();
        for target in targets {
            if let Some(shift) = self.catalog.static_shift(*target) {
                site.add(shift);
            }
        }
        site
    }

    fn symbol_on(&self, targets: &[ModificationTarget], symbol: char) -> Option<&'a ModificationDefinition> {
        targets.iter().find_map(|t| self.catalog.by_symbol(*t, symbol))
    }

    /// Match an observed shift to a variable definition on top of the shift
    /// already applied; `None` when the observation only confirms statics.
    fn resolve_shift(
        &self,
        targets: &[ModificationTarget],
        applied: f64,
        observed: f64,
    ) -> Result<Option<&'a ModificationDefinition>, ModificationError> {
        let tolerance = self.options.tolerance;
        if (observed - applied).abs() <= tolerance {
            return Ok(None);
        }

        let candidates: Vec<&'a ModificationDefinition> = targets
            .iter()
            .flat_map(|t| self.catalog.variable_for(*t))
            .filter(|d| (applied + d.mass_shift - observed).abs() <= tolerance)
            .collect();

        let target = targets.first().map(|t| t.to_string()).unwrap_or_default();
        match candidates.as_slice() {
            [] => Err(ModificationError::Unresolvable {
                target,
                detail: format!("no definition for mass shift {:+.4}", observed),
            }),
            [only] => Ok(Some(*only)),
            _ => match self.options.policy {
                AmbiguityPolicy::Fail => Err(ModificationError::Ambiguous {
                    target,
                    observed,
                    candidates: candidates
                        .iter()
                        .map(|d| format!("{:+.4} ({})", d.mass_shift, d.symbol))
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
                AmbiguityPolicy::Closest => {
                    let distance = |d: &ModificationDefinition| (applied + d.mass_shift - observed).abs();
                    let mut best = candidates[0];
                    for &candidate in &candidates[1..] {
                        if distance(candidate) < distance(best) {
                            best = candidate;
                        }
                    }
                    Ok(Some(best))
                }
            },
        }
    }
}

fn observed_shift(kind: EvidenceKind, base: f64) -> f64 {
    match kind {
        EvidenceKind::Shift(shift) => shift,
        EvidenceKind::Total(total) => total - base,
        EvidenceKind::Symbol(_) => 0.0,
    }
}

fn n_terminal_targets(peptide: &AnnotatedPeptide) -> Vec<ModificationTarget> {
    let mut targets = vec![ModificationTarget::PeptideNTerm];
    if peptide.prev_aa == TERMINUS_MARKER {
        targets.push(ModificationTarget::ProteinNTerm);
    }
    targets
}

fn c_terminal_targets(peptide: &AnnotatedPeptide) -> Vec<ModificationTarget> {
    let mut targets = vec![ModificationTarget::PeptideCTerm];
    if peptide.next_aa == TERMINUS_MARKER {
        targets.push(ModificationTarget::ProteinCTerm);
    }
    targets
}

fn unknown_symbol(targets: &[ModificationTarget], symbol: char) -> ModificationError {
    ModificationError::Unresolvable {
        target: targets.first().map(|t| t.to_string()).unwrap_or_default(),
        detail: format!("symbol '{}' is not in the catalog", symbol),
    }
}
