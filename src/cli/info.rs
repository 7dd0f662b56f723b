use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

use pepxml_convert::pepxml::{format_mass, PepXmlDocument};

/// Display information about a pepXML file
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let document = PepXmlDocument::from_path(&file)
        .with_context(|| format!("Failed to read pepXML file: {}", file.display()))?;

    println!("pepXML File Information");
    println!("=======================");
    println!("File: {}", file.display());
    if let Some(date) = &document.date {
        println!("Date: {}", date);
    }
    println!("Runs: {}", document.runs.len());

    for run in &document.runs {
        println!();
        println!("Run: {}", run.base_name);
        println!("  Search engine: {}", run.search_engine.as_deref().unwrap_or("-"));
        println!("  Enzyme: {}", run.enzyme.as_deref().unwrap_or("-"));
        println!("  Database: {}", run.database.as_deref().unwrap_or("-"));

        println!("  Modifications: {}", run.modifications.len());
        for modification in &run.modifications {
            let kind = if modification.variable { "variable" } else { "static" };
            let symbol = modification
                .symbol
                .as_deref()
                .map(|s| format!(", symbol {}", s))
                .unwrap_or_default();
            println!(
                "    {} {:+.4} -> {} ({}{})",
                modification.target,
                modification.massdiff,
                format_mass(modification.mass, 4),
                kind,
                symbol
            );
        }

        let hits = run.queries.iter().flat_map(|q| &q.hits);
        let modified = hits.clone().filter(|h| h.has_modification_info).count();
        let rejected = hits.clone().filter(|h| h.rejected).count();
        let scores: BTreeSet<&str> = hits.flat_map(|h| h.scores.iter().map(|(name, _)| name.as_str())).collect();

        println!("  Spectra: {}", run.queries.len());
        println!("  Hits: {} ({} modified, {} rejected)", run.hit_count(), modified, rejected);
        if !scores.is_empty() {
            let names: Vec<&str> = scores.into_iter().collect();
            println!("  Scores: {}", names.join(", "));
        }
    }
    Ok(())
}
