use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod convert;
mod discover;
mod info;

/// pepxml-convert - Search result tables to pepXML
#[derive(Parser)]
#[command(name = "pepxml-convert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Write log output to a file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments of the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Hit tables, directories, or wildcard patterns (`*`, `?`)
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the pepXML files (defaults to beside each input)
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Write every dataset into this one pepXML file
    #[arg(long, value_name = "FILE", conflicts_with = "output_dir")]
    combine: Option<PathBuf>,

    /// Descend into sub-directories of directory and wildcard inputs
    #[arg(short, long)]
    recurse: bool,

    /// Keep only the N best-ranked hits per spectrum
    #[arg(long, value_name = "N")]
    top_hits: Option<usize>,

    /// Skip peptides with ambiguous residue codes (B, J, X, Z)
    #[arg(long)]
    skip_ambiguous: bool,

    /// Ignore the modification summary file
    #[arg(long)]
    no_mod_summary: bool,

    /// Ignore the scan statistics file
    #[arg(long)]
    no_scan_stats: bool,

    /// Ignore the MSGF confidence score file
    #[arg(long)]
    no_msgf: bool,

    /// Ignore the protein map files
    #[arg(long)]
    no_protein_map: bool,

    /// FASTA file for protein descriptions
    #[arg(long, value_name = "PATH")]
    fasta: Option<PathBuf>,

    /// List required and optional files without converting
    #[arg(long)]
    preview: bool,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write the run report as JSON
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert hit tables to pepXML
    Convert(ConvertArgs),

    /// Display information about a pepXML file
    Info {
        /// Input pepXML file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));
    if let Some(path) = &cli.log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert(args) => convert::run(args),
        Commands::Info { file } => info::run(file),
    }
}
