//! # pepxml-convert
//!
//! Command-line front end for converting search engine hit tables to pepXML.
//!
//! ## Usage
//!
//! ```bash
//! # Convert one hit table; writes QC_Shew.pepXML beside it
//! pepxml-convert convert QC_Shew_syn.txt
//!
//! # Every hit table under a directory, best hit only, into one file
//! pepxml-convert convert results/ -r --top-hits 1 --combine all.pepXML
//!
//! # Show which companion files would be used
//! pepxml-convert convert 'QC_*_syn.txt' --preview
//!
//! # Summarize a pepXML file
//! pepxml-convert info QC_Shew.pepXML
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(&cli)?;
    cli::dispatch(cli)
}
