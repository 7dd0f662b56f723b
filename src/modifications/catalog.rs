//! Per-dataset modification catalog.
//!
//! A [`CatalogBuilder`] collects definitions either from an explicit
//! modification-summary table or lazily from per-hit evidence, then freezes
//! into an immutable [`ModificationCatalog`]. Definitions are keyed by
//! (target, mass shift) in an insertion-ordered map so symbol assignment only
//! depends on input order.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};

use super::ModificationError;
use crate::mass::MassType;
use crate::results::{tsv_reader, AnnotatedPeptide, Evidence, EvidenceKind, Site};

/// Symbols handed out to definitions without a declared one, in order
pub const SYMBOL_POOL: [char; 12] = ['*', '#', '@', '$', '&', '!', '%', '~', '^', '+', '=', '?'];

/// Mass shifts are compared at this many decimals when keying definitions
const SHIFT_KEY_SCALE: f64 = 10_000.0;

/// What a modification attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModificationTarget {
    /// A residue, by one-letter code
    Residue(u8),
    /// Peptide N-terminus
    PeptideNTerm,
    /// Peptide C-terminus
    PeptideCTerm,
    /// Protein N-terminus (peptide N-terminus at a protein start)
    ProteinNTerm,
    /// Protein C-terminus (peptide C-terminus at a protein end)
    ProteinCTerm,
}

impl ModificationTarget {
    /// Parse a target code: a residue letter, `<`, `>`, `[` or `]`
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '<' => Some(ModificationTarget::PeptideNTerm),
            '>' => Some(ModificationTarget::PeptideCTerm),
            '[' => Some(ModificationTarget::ProteinNTerm),
            ']' => Some(ModificationTarget::ProteinCTerm),
            c if c.is_ascii_uppercase() => Some(ModificationTarget::Residue(c as u8)),
            _ => None,
        }
    }

    /// Code used in modification tables
    pub fn code(&self) -> char {
        match self {
            ModificationTarget::Residue(r) => *r as char,
            ModificationTarget::PeptideNTerm => '<',
            ModificationTarget::PeptideCTerm => '>',
            ModificationTarget::ProteinNTerm => '[',
            ModificationTarget::ProteinCTerm => ']',
        }
    }

    /// Whether this is one of the N-terminal targets
    pub fn is_n_terminal(&self) -> bool {
        matches!(self, ModificationTarget::PeptideNTerm | ModificationTarget::ProteinNTerm)
    }

    /// Whether this is one of the C-terminal targets
    pub fn is_c_terminal(&self) -> bool {
        matches!(self, ModificationTarget::PeptideCTerm | ModificationTarget::ProteinCTerm)
    }

    /// Whether this is a protein-terminal target
    pub fn is_protein_terminal(&self) -> bool {
        matches!(self, ModificationTarget::ProteinNTerm | ModificationTarget::ProteinCTerm)
    }

    /// Unmodified mass of the residue or terminus
    pub fn base_mass(&self, mass_type: MassType) -> Option<f64> {
        match self {
            ModificationTarget::Residue(r) => mass_type.residue(*r),
            ModificationTarget::PeptideNTerm | ModificationTarget::ProteinNTerm => {
                Some(mass_type.n_terminus())
            }
            ModificationTarget::PeptideCTerm | ModificationTarget::ProteinCTerm => {
                Some(mass_type.c_terminus())
            }
        }
    }
}

impl fmt::Display for ModificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationTarget::Residue(r) => write!(f, "{}", *r as char),
            ModificationTarget::PeptideNTerm => write!(f, "peptide N-terminus"),
            ModificationTarget::PeptideCTerm => write!(f, "peptide C-terminus"),
            ModificationTarget::ProteinNTerm => write!(f, "protein N-terminus"),
            ModificationTarget::ProteinCTerm => write!(f, "protein C-terminus"),
        }
    }
}

/// One residue or terminal modification known to a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationDefinition {
    /// Residue or terminus
    pub target: ModificationTarget,
    /// Mass shift relative to the unmodified target
    pub mass_shift: f64,
    /// Unmodified target mass plus the shift
    pub total_mass: f64,
    /// Variable (evidence-driven) rather than static
    pub variable: bool,
    /// One-character annotation symbol
    pub symbol: char,
    /// Optional name (mass correction tag)
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DefinitionKey {
    target: ModificationTarget,
    shift: i64,
}

impl DefinitionKey {
    fn new(target: ModificationTarget, mass_shift: f64) -> Self {
        Self {
            target,
            shift: (mass_shift * SHIFT_KEY_SCALE).round() as i64,
        }
    }
}

#[derive(Debug, Clone)]
struct Draft {
    target: ModificationTarget,
    mass_shift: f64,
    total_mass: f64,
    variable: bool,
    symbol: Option<char>,
    name: Option<String>,
}

/// Mutable catalog under construction
#[derive(Debug)]
pub struct CatalogBuilder {
    mass_type: MassType,
    tolerance: f64,
    explicit: bool,
    drafts: IndexMap<DefinitionKey, Draft>,
}

impl CatalogBuilder {
    /// Empty builder; definitions will be inferred from evidence
    pub fn new(mass_type: MassType, tolerance: f64) -> Self {
        Self {
            mass_type,
            tolerance,
            explicit: false,
            drafts: IndexMap::new(),
        }
    }

    /// Builder seeded from a modification-summary file
    pub fn from_mod_summary_file<P: AsRef<Path>>(
        path: P,
        mass_type: MassType,
        tolerance: f64,
    ) -> Result<Self, ModificationError> {
        let file = File::open(path.as_ref())?;
        Self::from_mod_summary(BufReader::new(file), mass_type, tolerance)
    }

    /// Builder seeded from modification-summary rows
    ///
    /// Columns: `Modification_Symbol`, `Modification_Mass`, `Target_Residues`,
    /// `Modification_Type` and optionally `Mass_Correction_Tag`.
    pub fn from_mod_summary<R: Read>(
        reader: R,
        mass_type: MassType,
        tolerance: f64,
    ) -> Result<Self, ModificationError> {
        let mut builder = Self::new(mass_type, tolerance);
        builder.explicit = true;

        let mut reader = tsv_reader(reader);
        let mut columns: Option<HashMap<String, usize>> = None;
        let mut symbol_shifts: HashMap<char, i64> = HashMap::new();

        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if columns.is_none() {
                columns = Some(
                    record
                        .iter()
                        .enumerate()
                        .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
                        .collect(),
                );
                continue;
            }
            let Some(columns) = columns.as_ref() else {
                continue;
            };

            let field = |name: &str| -> Result<&str, ModificationError> {
                columns
                    .get(name)
                    .and_then(|&i| record.get(i))
                    .map(str::trim)
                    .ok_or_else(|| ModificationError::InvalidCatalog(format!("missing column {}", name)))
            };

            let symbol_text = field("modification_symbol")?;
            let mass_text = field("modification_mass")?;
            let targets = field("target_residues")?;
            let kind = field("modification_type")?;
            let name = columns
                .get("mass_correction_tag")
                .and_then(|&i| record.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            let mass_shift: f64 = mass_text.parse().map_err(|_| {
                ModificationError::InvalidCatalog(format!("invalid modification mass '{}'", mass_text))
            })?;

            let variable = match kind.to_ascii_uppercase().as_str() {
                "D" => true,
                "S" | "T" | "P" => false,
                other => {
                    warn!("Ignoring modification of unsupported type '{}' ({})", other, mass_text);
                    continue;
                }
            };

            let symbol = symbol_text
                .chars()
                .next()
                .filter(|&c| c != '-' && symbol_text.chars().count() == 1);

            if let Some(symbol) = symbol {
                let key = DefinitionKey::new(ModificationTarget::PeptideNTerm, mass_shift).shift;
                match symbol_shifts.get(&symbol) {
                    Some(&existing) if existing != key => {
                        return Err(ModificationError::InvalidCatalog(format!(
                            "symbol '{}' declared for more than one mass shift",
                            symbol
                        )));
                    }
                    _ => {
                        symbol_shifts.insert(symbol, key);
                    }
                }
            }

            for code in targets.chars() {
                let mut target = ModificationTarget::from_code(code).ok_or_else(|| {
                    ModificationError::InvalidCatalog(format!("invalid target residue '{}'", code))
                })?;
                // Protein-terminal statics are declared on the peptide termini codes
                if kind.eq_ignore_ascii_case("P") {
                    target = match target {
                        ModificationTarget::PeptideNTerm => ModificationTarget::ProteinNTerm,
                        ModificationTarget::PeptideCTerm => ModificationTarget::ProteinCTerm,
                        other => other,
                    };
                }
                builder.insert(target, mass_shift, variable, symbol, name.clone())?;
            }
        }

        if columns.is_none() {
            return Err(ModificationError::InvalidCatalog("empty modification summary".to_string()));
        }

        debug!("Loaded {} modification definitions", builder.drafts.len());
        Ok(builder)
    }

    /// Whether the catalog came from an explicit table (closed to inference)
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Number of definitions collected so far
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// Whether no definitions have been collected
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    fn insert(
        &mut self,
        target: ModificationTarget,
        mass_shift: f64,
        variable: bool,
        symbol: Option<char>,
        name: Option<String>,
    ) -> Result<(), ModificationError> {
        let base = target.base_mass(self.mass_type).ok_or_else(|| {
            ModificationError::InvalidCatalog(format!("residue '{}' has no defined mass", target))
        })?;
        let key = DefinitionKey::new(target, mass_shift);
        if self.drafts.contains_key(&key) {
            warn!("Duplicate modification {:+.4} on {}; keeping the first", mass_shift, target);
            return Ok(());
        }
        self.drafts.insert(
            key,
            Draft {
                target,
                mass_shift,
                total_mass: base + mass_shift,
                variable,
                symbol,
                name,
            },
        );
        Ok(())
    }

    /// Record one observed (target, mass shift) pair.
    ///
    /// Pairs within tolerance of a known definition reuse it; new pairs
    /// become variable definitions in order of first appearance.
    pub fn observe(&mut self, target: ModificationTarget, mass_shift: f64) -> Result<(), ModificationError> {
        let known = self
            .drafts
            .values()
            .any(|d| d.target == target && (d.mass_shift - mass_shift).abs() <= self.tolerance);
        if known {
            return Ok(());
        }
        if self.explicit {
            return Err(ModificationError::Unresolvable {
                target: target.to_string(),
                detail: format!("mass shift {:+.4} is not in the modification summary", mass_shift),
            });
        }
        debug!("Inferred modification {:+.4} on {}", mass_shift, target);
        self.insert(target, mass_shift, true, None, None).map_err(|_| ModificationError::Unresolvable {
            target: target.to_string(),
            detail: "residue has no defined mass".to_string(),
        })
    }

    /// Record every modification a peptide's evidence implies.
    ///
    /// All pairs are checked before any is recorded, so a hit that cannot be
    /// resolved leaves the catalog untouched. Explicit catalogs are closed and
    /// ignore observations; their evidence is checked when hits are mapped.
    pub fn observe_peptide(
        &mut self,
        peptide: &AnnotatedPeptide,
        evidence: &[Evidence],
    ) -> Result<(), ModificationError> {
        if self.explicit {
            return Ok(());
        }
        let mut pairs = Vec::with_capacity(evidence.len());
        for item in evidence {
            let target = match item.site {
                Site::NTerm => ModificationTarget::PeptideNTerm,
                Site::CTerm => ModificationTarget::PeptideCTerm,
                Site::Residue(i) => ModificationTarget::Residue(peptide.residues[i]),
            };
            let shift = match item.kind {
                EvidenceKind::Shift(shift) => shift,
                EvidenceKind::Total(total) => {
                    let base = target.base_mass(self.mass_type).ok_or_else(|| {
                        ModificationError::Unresolvable {
                            target: target.to_string(),
                            detail: "residue has no defined mass".to_string(),
                        }
                    })?;
                    total - base
                }
                EvidenceKind::Symbol(symbol) => {
                    return Err(ModificationError::Unresolvable {
                        target: target.to_string(),
                        detail: format!("symbol '{}' without a modification summary", symbol),
                    });
                }
            };
            pairs.push((target, shift));
        }
        for (target, shift) in pairs {
            self.observe(target, shift)?;
        }
        Ok(())
    }

    /// Freeze the catalog, assigning pool symbols to definitions without one
    pub fn build(self) -> Result<ModificationCatalog, ModificationError> {
        let mut used: Vec<char> = self.drafts.values().filter_map(|d| d.symbol).collect();
        let mut pool = SYMBOL_POOL.iter().copied();

        let mut definitions = IndexMap::with_capacity(self.drafts.len());
        for (key, draft) in self.drafts {
            let symbol = match draft.symbol {
                Some(symbol) => symbol,
                None => {
                    let symbol = pool
                        .by_ref()
                        .find(|c| !used.contains(c))
                        .ok_or_else(|| ModificationError::SymbolPoolExhausted(draft.target.to_string()))?;
                    used.push(symbol);
                    symbol
                }
            };
            definitions.insert(
                key,
                ModificationDefinition {
                    target: draft.target,
                    mass_shift: draft.mass_shift,
                    total_mass: draft.total_mass,
                    variable: draft.variable,
                    symbol,
                    name: draft.name,
                },
            );
        }

        Ok(ModificationCatalog {
            mass_type: self.mass_type,
            explicit: self.explicit,
            definitions,
        })
    }
}

/// Immutable set of modification definitions for one dataset.
///
/// Each (target, mass shift) pair has exactly one definition, and a symbol
/// maps to exactly one mass shift. A symbol may still cover several residues
/// when a summary row declares a multi-letter target such as `STY`, so
/// symbols are unique per mass shift rather than per residue.
#[derive(Debug, Clone)]
pub struct ModificationCatalog {
    mass_type: MassType,
    explicit: bool,
    definitions: IndexMap<DefinitionKey, ModificationDefinition>,
}

impl ModificationCatalog {
    /// Catalog with no definitions
    pub fn empty(mass_type: MassType) -> Self {
        Self {
            mass_type,
            explicit: false,
            definitions: IndexMap::new(),
        }
    }

    /// Mass type used for total masses
    pub fn mass_type(&self) -> MassType {
        self.mass_type
    }

    /// Whether the definitions came from an explicit table
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Definitions in catalog order
    pub fn definitions(&self) -> impl Iterator<Item = &ModificationDefinition> {
        self.definitions.values()
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog has no definitions
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Sum of static shifts on a target, `None` when no static applies
    pub fn static_shift(&self, target: ModificationTarget) -> Option<f64> {
        self.definitions
            .values()
            .filter(|d| !d.variable && d.target == target)
            .map(|d| d.mass_shift)
            .reduce(|a, b| a + b)
    }

    /// Variable definitions on a target
    pub fn variable_for(&self, target: ModificationTarget) -> impl Iterator<Item = &ModificationDefinition> {
        self.definitions
            .values()
            .filter(move |d| d.variable && d.target == target)
    }

    /// Variable definition on a target with the given symbol
    pub fn by_symbol(&self, target: ModificationTarget, symbol: char) -> Option<&ModificationDefinition> {
        self.variable_for(target).find(|d| d.symbol == symbol)
    }

    /// Definition for an exact (target, mass shift) pair
    pub fn get(&self, target: ModificationTarget, mass_shift: f64) -> Option<&ModificationDefinition> {
        self.definitions.get(&DefinitionKey::new(target, mass_shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MOD_SUMMARY: &str = "\
Modification_Symbol\tModification_Mass\tTarget_Residues\tModification_Type\tMass_Correction_Tag\tOccurrence_Count
-\t57.021465\tC\tS\tIodoAcet\t0
*\t15.994915\tM\tD\tPlus1Oxy\t12
#\t79.966331\tSTY\tD\tPhosph\t3
-\t42.010565\t<\tT\tAcetyl\t0
";

    fn explicit() -> CatalogBuilder {
        CatalogBuilder::from_mod_summary(Cursor::new(MOD_SUMMARY), MassType::Monoisotopic, 0.0005).unwrap()
    }

    #[test]
    fn test_mod_summary_expands_targets() {
        let catalog = explicit().build().unwrap();
        assert!(catalog.is_explicit());
        assert_eq!(catalog.len(), 6);

        let oxidation = catalog.by_symbol(ModificationTarget::Residue(b'M'), '*').unwrap();
        assert!((oxidation.total_mass - 147.0354).abs() < 0.0001);
        assert_eq!(oxidation.name.as_deref(), Some("Plus1Oxy"));

        for residue in [b'S', b'T', b'Y'] {
            let phospho = catalog.by_symbol(ModificationTarget::Residue(residue), '#').unwrap();
            assert!(phospho.variable);
        }

        let acetyl = catalog.get(ModificationTarget::PeptideNTerm, 42.010565).unwrap();
        assert!(!acetyl.variable);
        assert!((acetyl.total_mass - 43.0184).abs() < 0.0001);
    }

    #[test]
    fn test_symbols_are_unique_per_mass_shift() {
        let catalog = explicit().build().unwrap();
        let mut shifts: HashMap<char, f64> = HashMap::new();
        for definition in catalog.definitions() {
            let shift = *shifts.entry(definition.symbol).or_insert(definition.mass_shift);
            assert_eq!(shift, definition.mass_shift, "symbol {}", definition.symbol);
        }
        assert_eq!(catalog.definitions().filter(|d| d.symbol == '#').count(), 3);
    }

    #[test]
    fn test_statics_receive_pool_symbols_not_clashing_with_declared() {
        let catalog = explicit().build().unwrap();
        let carbamidomethyl = catalog.get(ModificationTarget::Residue(b'C'), 57.021465).unwrap();
        // '*' and '#' are declared, so the first free pool symbol is '@'
        assert_eq!(carbamidomethyl.symbol, '@');
        assert_eq!(catalog.static_shift(ModificationTarget::Residue(b'C')), Some(57.021465));
        assert_eq!(catalog.static_shift(ModificationTarget::Residue(b'M')), None);
    }

    #[test]
    fn test_explicit_catalog_is_closed() {
        let mut builder = explicit();
        assert!(builder.observe(ModificationTarget::Residue(b'M'), 15.9950).is_ok());
        let err = builder.observe(ModificationTarget::Residue(b'K'), 8.0142).unwrap_err();
        assert!(matches!(err, ModificationError::Unresolvable { .. }));
    }

    #[test]
    fn test_inferred_symbols_follow_first_appearance() {
        let mut builder = CatalogBuilder::new(MassType::Monoisotopic, 0.0005);
        let first = AnnotatedPeptide::parse("K.PEPM[+15.9949]K.R").unwrap();
        let second = AnnotatedPeptide::parse("K.n[+42.0106]S[+79.9663]M[147.0354]K.R").unwrap();
        builder.observe_peptide(&first, &first.evidence).unwrap();
        builder.observe_peptide(&second, &second.evidence).unwrap();

        let catalog = builder.build().unwrap();
        let symbols: Vec<(String, char)> = catalog
            .definitions()
            .map(|d| (d.target.to_string(), d.symbol))
            .collect();
        assert_eq!(
            symbols,
            vec![
                ("M".to_string(), '*'),
                ("peptide N-terminus".to_string(), '#'),
                ("S".to_string(), '@'),
            ]
        );
    }

    #[test]
    fn test_unresolvable_peptide_leaves_catalog_untouched() {
        let mut builder = CatalogBuilder::new(MassType::Monoisotopic, 0.0005);
        let peptide = AnnotatedPeptide::parse("M[+15.9949]X[200.0]K").unwrap();
        assert!(builder.observe_peptide(&peptide, &peptide.evidence).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_conflicting_symbol_is_rejected() {
        let text = "Modification_Symbol\tModification_Mass\tTarget_Residues\tModification_Type\n*\t15.9949\tM\tD\n*\t79.9663\tS\tD\n";
        let err = CatalogBuilder::from_mod_summary(Cursor::new(text), MassType::Monoisotopic, 0.0005).unwrap_err();
        assert!(matches!(err, ModificationError::InvalidCatalog(_)));
    }

    #[test]
    fn test_symbol_pool_exhaustion() {
        let mut builder = CatalogBuilder::new(MassType::Monoisotopic, 0.0005);
        for i in 0..=SYMBOL_POOL.len() {
            builder.observe(ModificationTarget::Residue(b'K'), 1.0 + i as f64).unwrap();
        }
        assert!(matches!(builder.build(), Err(ModificationError::SymbolPoolExhausted(_))));
    }
}
