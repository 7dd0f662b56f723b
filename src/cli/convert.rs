use anyhow::{bail, Context, Result};
use log::info;

use pepxml_convert::dataset::{ConversionConfig, DatasetConverter};
use pepxml_convert::report::RunReport;

use super::config::Config;
use super::discover::discover;
use super::ConvertArgs;

/// Convert hit tables to pepXML
pub fn run(args: ConvertArgs) -> Result<()> {
    let config = build_config(&args)?;
    let inputs = discover(&args.inputs, args.recurse)?;
    if inputs.is_empty() {
        bail!("No hit tables found");
    }
    info!("{} hit table(s) to process", inputs.len());

    let converter = DatasetConverter::new(config);

    if args.preview {
        let mut incomplete = false;
        for input in &inputs {
            let preview = converter
                .preview(input, args.output_dir.as_deref())
                .with_context(|| format!("Failed to preview {}", input.display()))?;
            incomplete |= !preview.is_complete();
            println!("{}", preview);
        }
        if incomplete {
            std::process::exit(1);
        }
        return Ok(());
    }

    let report = match &args.combine {
        Some(output) => converter
            .convert_combined(&inputs, output)
            .with_context(|| format!("Failed to write {}", output.display()))?,
        None => converter.convert_all(&inputs, args.output_dir.as_deref()),
    };

    if let Some(path) = &args.report_json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }
    print_report(&report);

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Defaults, then the config file, then command-line flags
fn build_config(args: &ConvertArgs) -> Result<ConversionConfig> {
    let mut config = ConversionConfig::default();
    if let Some(path) = &args.config {
        Config::from_file(path)?.apply(&mut config)?;
    }

    if let Some(limit) = args.top_hits {
        if limit == 0 {
            bail!("--top-hits must be at least 1");
        }
        config.hits_per_spectrum = Some(limit);
    }
    if args.skip_ambiguous {
        config.skip_ambiguous_residues = true;
    }
    if args.no_mod_summary {
        config.use_mod_summary = false;
    }
    if args.no_scan_stats {
        config.use_scan_stats = false;
    }
    if args.no_msgf {
        config.use_msgf = false;
    }
    if args.no_protein_map {
        config.use_protein_map = false;
    }
    if let Some(fasta) = &args.fasta {
        config.search.database = Some(fasta.clone());
        config.use_fasta = true;
    }
    Ok(config)
}

fn print_report(report: &RunReport) {
    #[cfg(feature = "colorized_output")]
    {
        println!("{}", report.format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", report);
    }
}
