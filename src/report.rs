//! End-of-run conversion report.
//!
//! Every skipped row, disabled enrichment and failed dataset is collected
//! here and printed once at the end of a run, optionally as JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[cfg(feature = "colorized_output")]
use console::style;
use serde::Serialize;

use crate::enrichment::DisabledEnrichment;

/// Representative messages kept per skip reason
pub const MAX_EXAMPLES: usize = 3;

/// Why a row did not make it into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// Unparseable row
    MalformedRow,
    /// Modification evidence with no matching definition
    UnresolvableModification,
    /// Modification evidence matching several definitions
    AmbiguousModification,
    /// Peptide with disallowed residue codes, skipped on request
    DisallowedResidue,
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipKind::MalformedRow => "malformed row",
            SkipKind::UnresolvableModification => "unresolvable modification",
            SkipKind::AmbiguousModification => "ambiguous modification",
            SkipKind::DisallowedResidue => "disallowed residue",
        };
        write!(f, "{}", name)
    }
}

/// Count of occurrences plus a few example messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Occurrences {
    /// Number of occurrences
    pub count: usize,
    /// Up to [`MAX_EXAMPLES`] messages
    pub examples: Vec<String>,
}

impl Occurrences {
    fn record(&mut self, message: String) {
        self.count += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(message);
        }
    }
}

/// Outcome of converting one dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetReport {
    /// Dataset name
    pub dataset: String,
    /// Hit table path
    pub input: PathBuf,
    /// Output file, when one was written
    pub output: Option<PathBuf>,
    /// Detected hit table layout
    pub layout: Option<String>,
    /// Data rows read
    pub rows_read: u64,
    /// Hits written
    pub hits_written: usize,
    /// Spectrum queries written
    pub spectra_written: usize,
    /// Hits beyond the per-spectrum limit
    pub hits_over_limit: usize,
    /// Modification definitions in the catalog
    pub modifications: usize,
    /// Skipped rows by reason
    pub skipped: BTreeMap<SkipKind, Occurrences>,
    /// Kept rows with disallowed residue codes
    pub flagged: Occurrences,
    /// Enrichments not applied
    pub disabled_enrichments: Vec<DisabledEnrichment>,
    /// Why the dataset failed
    pub failure: Option<String>,
}

impl DatasetReport {
    /// Empty report for a dataset
    pub fn new(dataset: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            input: input.into(),
            ..Default::default()
        }
    }

    /// Record a skipped row
    pub fn skip(&mut self, kind: SkipKind, message: impl Into<String>) {
        self.skipped.entry(kind).or_default().record(message.into());
    }

    /// Record a kept row with disallowed residues
    pub fn flag(&mut self, message: impl Into<String>) {
        self.flagged.record(message.into());
    }

    /// Total skipped rows
    pub fn skipped_rows(&self) -> usize {
        self.skipped.values().map(|o| o.count).sum()
    }

    /// Whether the dataset converted
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn write_details(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "    rows read: {}, spectra: {}, hits: {}, modifications: {}",
            self.rows_read, self.spectra_written, self.hits_written, self.modifications
        )?;
        if self.hits_over_limit > 0 {
            writeln!(f, "    hits over per-spectrum limit: {}", self.hits_over_limit)?;
        }
        for (kind, occurrences) in &self.skipped {
            writeln!(f, "    skipped ({}): {}", kind, occurrences.count)?;
            for example in &occurrences.examples {
                writeln!(f, "      - {}", example)?;
            }
        }
        if self.flagged.count > 0 {
            writeln!(f, "    rows with disallowed residues (kept): {}", self.flagged.count)?;
        }
        for disabled in &self.disabled_enrichments {
            writeln!(f, "    {} disabled: {}", disabled.source, disabled.reason)?;
        }
        Ok(())
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Per-dataset reports in input order
    pub datasets: Vec<DatasetReport>,
    /// Shared output file in combined mode
    pub combined_output: Option<PathBuf>,
}

impl RunReport {
    /// Add a dataset report
    pub fn push(&mut self, report: DatasetReport) {
        self.datasets.push(report);
    }

    /// Whether any dataset failed
    pub fn has_failures(&self) -> bool {
        self.datasets.iter().any(|d| !d.is_success())
    }

    /// Number of converted datasets
    pub fn success_count(&self) -> usize {
        self.datasets.iter().filter(|d| d.is_success()).count()
    }

    /// Number of failed datasets
    pub fn failure_count(&self) -> usize {
        self.datasets.len() - self.success_count()
    }

    /// Total skipped rows across datasets
    pub fn skipped_rows(&self) -> usize {
        self.datasets.iter().map(DatasetReport::skipped_rows).sum()
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(std::io::Error::from)
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("pepXML Conversion Report").bold().cyan()));
            output.push_str(&format!("{}\n", style("========================").cyan()));
            if let Some(path) = &self.combined_output {
                output.push_str(&format!("{}: {}\n", style("Output").bold(), path.display()));
            }
            output.push('\n');

            for dataset in &self.datasets {
                match &dataset.failure {
                    None => {
                        output.push_str(&format!("[{}] {}", OK, style(&dataset.dataset).green()));
                        if let Some(path) = &dataset.output {
                            output.push_str(&format!(" -> {}", path.display()));
                        }
                        output.push('\n');
                    }
                    Some(reason) => {
                        output.push_str(&format!(
                            "[{}] {} - {}: {}\n",
                            FAIL,
                            style(&dataset.dataset).red(),
                            style("FAILED").red().bold(),
                            reason
                        ));
                    }
                }
                output.push_str(&format!("{}", Details(dataset)));
            }

            output.push('\n');
            output.push_str(&format!(
                "{}: {} converted, {} failed, {} rows skipped\n",
                style("Summary").bold(),
                style(self.success_count()).green(),
                style(self.failure_count()).red(),
                style(self.skipped_rows()).yellow()
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

/// Display adapter for the indented per-dataset lines
struct Details<'a>(&'a DatasetReport);

impl fmt::Display for Details<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_details(f)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pepXML Conversion Report")?;
        writeln!(f, "========================")?;
        if let Some(path) = &self.combined_output {
            writeln!(f, "Output: {}", path.display())?;
        }
        writeln!(f)?;

        for dataset in &self.datasets {
            match &dataset.failure {
                None => {
                    write!(f, "[✓] {}", dataset.dataset)?;
                    if let Some(path) = &dataset.output {
                        write!(f, " -> {}", path.display())?;
                    }
                    writeln!(f)?;
                }
                Some(reason) => writeln!(f, "[✗] {} - FAILED: {}", dataset.dataset, reason)?,
            }
            dataset.write_details(f)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} converted, {} failed, {} rows skipped",
            self.success_count(),
            self.failure_count(),
            self.skipped_rows()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_keeps_three_examples() {
        let mut report = DatasetReport::new("QC", "QC_syn.txt");
        for i in 0..5 {
            report.skip(SkipKind::MalformedRow, format!("line {}", i));
        }
        report.skip(SkipKind::AmbiguousModification, "line 9");

        let malformed = &report.skipped[&SkipKind::MalformedRow];
        assert_eq!(malformed.count, 5);
        assert_eq!(malformed.examples, vec!["line 0", "line 1", "line 2"]);
        assert_eq!(report.skipped_rows(), 6);
        assert!(report.is_success());
    }

    #[test]
    fn test_run_report_summary() {
        let mut run = RunReport::default();
        run.push(DatasetReport::new("A", "A_syn.txt"));
        let mut failed = DatasetReport::new("B", "B_syn.txt");
        failed.failure = Some("Missing required file: B_syn_ModDetails.txt".to_string());
        run.push(failed);

        assert!(run.has_failures());
        assert_eq!(run.success_count(), 1);
        assert_eq!(run.failure_count(), 1);

        let text = run.to_string();
        assert!(text.contains("[✗] B - FAILED: Missing required file"));
        assert!(text.contains("Summary: 1 converted, 1 failed, 0 rows skipped"));
    }

    #[test]
    fn test_json_report() {
        let mut report = DatasetReport::new("QC", "QC_syn.txt");
        report.skip(SkipKind::UnresolvableModification, "line 4: no definition");
        let run = RunReport {
            datasets: vec![report],
            combined_output: None,
        };
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
        assert_eq!(
            json["datasets"][0]["skipped"]["unresolvable_modification"]["count"],
            serde_json::json!(1)
        );
    }
}
