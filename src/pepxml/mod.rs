//! # pepXML Serialization
//!
//! [`PepXmlWriter`] streams assembled runs into a pepXML document, one
//! `msms_run_summary` per dataset, flushing after each run. Masses use a fixed
//! number of decimals and scores the shortest exact decimal form; attribute
//! text is XML-escaped.
//!
//! [`PepXmlDocument`] reads a produced document back.
//!
//! ```text
//! msms_pipeline_analysis
//! └── msms_run_summary
//!     ├── sample_enzyme / specificity
//!     ├── search_summary
//!     │   ├── search_database
//!     │   ├── enzymatic_search_constraint
//!     │   ├── aminoacid_modification*, terminal_modification*
//!     │   └── parameter*
//!     └── spectrum_query*
//!         └── search_result / search_hit
//!             ├── alternative_protein*
//!             ├── modification_info? / mod_aminoacid_mass*
//!             └── search_score*
//! ```

mod error;
pub mod reader;
pub mod writer;

pub use error::SerializationError;
pub use reader::{HitRecord, ModificationRecord, PepXmlDocument, QueryRecord, RunRecord};
pub use writer::{format_mass, format_score, PepXmlWriter, WriterOptions, DEFAULT_MASS_DECIMALS};
