//! # pepxml-convert - Search Results to pepXML
//!
//! `pepxml-convert` turns tab-delimited peptide-spectrum-match tables
//! produced by database search engines (SEQUEST, X! Tandem, MS-GF+ or any
//! table with scan, charge, peptide and protein columns) into pepXML
//! documents with exact modification masses.
//!
//! ## Key Features
//!
//! - **Layout Detection**: the column layout is recognized from the header;
//!   unknown columns are ignored.
//!
//! - **Exact Modification Masses**: symbols, mass shifts and total masses in
//!   annotated peptides are resolved against a per-dataset modification
//!   catalog, either declared in a `_ModSummary.txt` file or inferred from
//!   the evidence itself.
//!
//! - **Optional Enrichment**: elution times, confidence scores, alternative
//!   proteins and protein descriptions are read from companion files when
//!   present; missing ones only disable that enrichment.
//!
//! - **Safe Output**: documents are written to a temporary file and
//!   persisted when complete. A failed dataset never leaves a partial file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pepxml_convert::dataset::{ConversionConfig, DatasetConverter};
//!
//! let mut config = ConversionConfig::default();
//! config.hits_per_spectrum = Some(1);
//!
//! let converter = DatasetConverter::new(config);
//! let report = converter.convert("QC_Shew_syn.txt", None);
//! if let Some(reason) = &report.failure {
//!     eprintln!("conversion failed: {}", reason);
//! }
//! ```
//!
//! ## Reading pepXML Files
//!
//! ```rust,no_run
//! use pepxml_convert::pepxml::PepXmlDocument;
//!
//! let document = PepXmlDocument::from_path("QC_Shew.pepXML")?;
//! for run in &document.runs {
//!     println!("{}: {} hits", run.base_name, run.hit_count());
//! }
//! # Ok::<(), pepxml_convert::pepxml::SerializationError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`results`]: hit table reader and annotated peptide parser
//! - [`modifications`]: modification catalog and per-hit mass mapping
//! - [`enrichment`]: companion-file resolvers
//! - [`document`]: in-memory search summary and spectrum queries
//! - [`pepxml`]: streaming pepXML writer and read-back parser
//! - [`dataset`]: per-dataset orchestration and output
//! - [`report`]: end-of-run summary
//! - [`mass`] and [`enzyme`]: residue masses and cleavage rules

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod dataset;
pub mod document;
pub mod enrichment;
pub mod enzyme;
pub mod mass;
pub mod modifications;
pub mod pepxml;
pub mod report;
pub mod results;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::dataset::{ConversionConfig, DatasetConverter, DatasetError, DatasetPaths, SearchSettings};
    pub use crate::document::{AssembledRun, Assembler, PeptideHit, SearchSummary, SpectrumQuery};
    pub use crate::enrichment::{Enrichment, EnrichmentSource};
    pub use crate::enzyme::EnzymeRule;
    pub use crate::mass::MassType;
    pub use crate::modifications::{
        AmbiguityPolicy, CatalogBuilder, ModificationCatalog, ModificationDefinition, ModificationMapper,
        ModificationTarget,
    };
    pub use crate::pepxml::{PepXmlDocument, PepXmlWriter, WriterOptions};
    pub use crate::report::{DatasetReport, RunReport, SkipKind};
    pub use crate::results::{AnnotatedPeptide, HitRow, ResultReader};
}
