//! # Modification Catalog and Mapping
//!
//! Each dataset gets its own catalog of residue and terminal modifications.
//! Conversion runs in two passes over a dataset:
//!
//! 1. every row is parsed and its evidence observed by a [`CatalogBuilder`]
//!    (seeded from a modification-summary table when one exists, otherwise
//!    inferred in order of first appearance);
//! 2. the frozen [`ModificationCatalog`] is used by a [`ModificationMapper`]
//!    to compute exact masses for each hit.
//!
//! Within one catalog every variable definition has exactly one symbol and no
//! symbol is shared by two inferred definitions. Identical input always
//! yields identical symbol assignment.

mod catalog;
mod details;
mod error;
mod mapper;

pub use catalog::{CatalogBuilder, ModificationCatalog, ModificationDefinition, ModificationTarget, SYMBOL_POOL};
pub use details::ModDetailsTable;
pub use error::ModificationError;
pub use mapper::{
    AmbiguityPolicy, MapperOptions, ModificationInfo, ModificationMapper, ModifiedResidue, DEFAULT_TOLERANCE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass::MassType;
    use crate::results::AnnotatedPeptide;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// At most twelve distinct (residue, shift) pairs, so the symbol pool always suffices
    fn annotated_peptide() -> impl Strategy<Value = String> {
        let residue = prop::sample::select(vec!['A', 'K', 'M', 'S']);
        let shift = prop::option::of(prop::sample::select(vec!["+15.9949", "+79.9663", "+8.0142"]));
        prop::collection::vec((residue, shift), 1..12).prop_map(|items| {
            items
                .into_iter()
                .map(|(r, s)| match s {
                    Some(s) => format!("{}[{}]", r, s),
                    None => r.to_string(),
                })
                .collect()
        })
    }

    fn infer(peptides: &[String]) -> ModificationCatalog {
        let mut builder = CatalogBuilder::new(MassType::Monoisotopic, DEFAULT_TOLERANCE);
        for text in peptides {
            let peptide = AnnotatedPeptide::parse(text).unwrap();
            builder.observe_peptide(&peptide, &peptide.evidence).unwrap();
        }
        builder.build().unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn inferred_symbols_are_a_bijection(peptides in prop::collection::vec(annotated_peptide(), 1..6)) {
            let catalog = infer(&peptides);
            let mut symbols = HashSet::new();
            for definition in catalog.definitions() {
                prop_assert!(definition.variable);
                prop_assert!(symbols.insert(definition.symbol));
            }
        }

        #[test]
        fn inference_is_deterministic(peptides in prop::collection::vec(annotated_peptide(), 1..6)) {
            let first: Vec<_> = infer(&peptides).definitions().cloned().collect();
            let second: Vec<_> = infer(&peptides).definitions().cloned().collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn every_observed_hit_maps(peptides in prop::collection::vec(annotated_peptide(), 1..6)) {
            let catalog = infer(&peptides);
            let mapper = ModificationMapper::new(&catalog, MapperOptions::default());
            for text in &peptides {
                let peptide = AnnotatedPeptide::parse(text).unwrap();
                let info = mapper.map(&peptide, &peptide.evidence).unwrap();
                prop_assert_eq!(info.residues.len(), peptide.evidence.len());
            }
        }
    }
}
