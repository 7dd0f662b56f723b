//! # Dataset Conversion
//!
//! Orchestrates the conversion of one hit table, or many, into pepXML.
//!
//! A dataset is converted in two passes over its rows:
//!
//! 1. every hit's modification evidence is observed to build the
//!    [`ModificationCatalog`] (explicit catalogs from a `_ModSummary.txt`
//!    file are closed and skip this step);
//! 2. with the catalog frozen, each hit is mapped and handed to the
//!    [`Assembler`] in row order.
//!
//! Companion files are found beside the hit table (see [`DatasetPaths`]).
//! Output goes to a temporary file in the destination directory and is
//! persisted only when the document is complete, so a failed dataset leaves
//! nothing behind.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pepxml_convert::dataset::{ConversionConfig, DatasetConverter};
//!
//! let converter = DatasetConverter::new(ConversionConfig::default());
//! let report = converter.convert("QC_Shew_syn.txt", None);
//! println!("{} hits written", report.hits_written);
//! ```

mod config;
mod error;
mod paths;

pub use config::{ConversionConfig, SearchSettings};
pub use error::DatasetError;
pub use paths::{Companion, DatasetPaths, Preview, PreviewEntry, Requirement, HIT_TABLE_SUFFIXES};

use std::borrow::Cow;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::document::{AssembledRun, Assembler, SearchSummary};
use crate::enrichment::{
    ConfidenceTable, Enrichment, EnrichmentSource, FastaDescriptions, ProteinMap, ScanStatsTable,
};
use crate::modifications::{
    CatalogBuilder, ModDetailsTable, ModificationCatalog, ModificationError, ModificationMapper,
};
use crate::pepxml::{PepXmlWriter, WriterOptions};
use crate::report::{DatasetReport, RunReport, SkipKind};
use crate::results::{Evidence, HitRow, ResultLayout, ResultReader};

/// Converts hit tables to pepXML
#[derive(Debug, Clone, Default)]
pub struct DatasetConverter {
    config: ConversionConfig,
}

impl DatasetConverter {
    /// Create a converter with the given configuration
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// List the files a conversion would read and whether they exist
    pub fn preview<P: AsRef<Path>>(&self, hit_table: P, output_dir: Option<&Path>) -> Result<Preview, DatasetError> {
        let paths = DatasetPaths::from_hit_table(hit_table)?;
        let config = &self.config;

        let has_summary = config.use_mod_summary && paths.companion(Companion::ModSummary).is_file();
        let has_symbols = ResultReader::open(&paths.hit_table, config.parser_options())?
            .filter_map(Result::ok)
            .any(|row| row.peptide.has_symbols());

        let enabled = |on: bool| if on { Requirement::Optional } else { Requirement::Disabled };
        let mut entries: Vec<PreviewEntry> = Companion::ALL
            .iter()
            .map(|&companion| {
                let requirement = match companion {
                    Companion::ModSummary => enabled(config.use_mod_summary),
                    Companion::ModDetails if !has_summary && has_symbols => Requirement::Required,
                    Companion::ModDetails => Requirement::Optional,
                    Companion::ResultToSeqMap | Companion::SeqToProteinMap => enabled(config.use_protein_map),
                    Companion::Msgf => enabled(config.use_msgf),
                    Companion::ScanStats => enabled(config.use_scan_stats),
                };
                let path = paths.companion(companion);
                PreviewEntry {
                    name: companion.to_string(),
                    found: path.is_file(),
                    path,
                    requirement,
                }
            })
            .collect();
        if let Some(database) = &config.search.database {
            entries.push(PreviewEntry {
                name: "protein database".to_string(),
                found: database.is_file(),
                path: database.clone(),
                requirement: enabled(config.use_fasta),
            });
        }

        Ok(Preview {
            dataset: paths.dataset.clone(),
            hit_table: paths.hit_table.clone(),
            output: paths.output_file(output_dir),
            entries,
        })
    }

    /// Convert one hit table to `<dataset>.pepXML`.
    ///
    /// Failures are recorded in the returned report, never propagated.
    pub fn convert<P: AsRef<Path>>(&self, hit_table: P, output_dir: Option<&Path>) -> DatasetReport {
        let hit_table = hit_table.as_ref();
        let mut report = DatasetReport::new(hit_table.display().to_string(), hit_table);

        match self.convert_to_file(hit_table, output_dir, &mut report) {
            Ok(output) => report.output = Some(output),
            Err(e) => {
                warn!("Dataset {} failed: {}", report.dataset, e);
                report.failure = Some(e.to_string());
            }
        }
        report
    }

    /// Convert each hit table to its own file
    pub fn convert_all(&self, inputs: &[PathBuf], output_dir: Option<&Path>) -> RunReport {
        RunReport {
            datasets: map_inputs(inputs, |input| self.convert(input, output_dir)),
            combined_output: None,
        }
    }

    /// Convert every hit table into one document, one run summary per dataset
    /// in input order.
    ///
    /// Datasets that fail contribute nothing. Fails only when the shared
    /// output cannot be written; no file is left behind in that case.
    pub fn convert_combined(&self, inputs: &[PathBuf], output: &Path) -> Result<RunReport, DatasetError> {
        info!("Converting {} datasets into {}", inputs.len(), output.display());

        let mut run_report = RunReport::default();
        let mut document = PendingDocument::create(output, self.config.writer_options())?;

        for chunk in inputs.chunks(batch_size()) {
            let prepared = map_inputs(chunk, |input| self.prepare_input(input));
            for (mut report, run) in prepared {
                if let Some(run) = run {
                    document.write_run(&run)?;
                    report.output = Some(output.to_path_buf());
                }
                run_report.push(report);
            }
        }

        if run_report.success_count() == 0 {
            warn!("No dataset converted; {} not written", output.display());
            return Ok(run_report);
        }
        run_report.combined_output = Some(document.persist()?);
        Ok(run_report)
    }

    /// Read, resolve and assemble one dataset without writing it
    pub fn prepare(&self, paths: &DatasetPaths, report: &mut DatasetReport) -> Result<AssembledRun, DatasetError> {
        let config = &self.config;
        report.dataset = paths.dataset.clone();

        let (layout, rows) = self.read_rows(paths, report)?;
        info!(
            "{}: {} rows ({} layout)",
            paths.dataset,
            rows.len(),
            layout
        );

        let mut builder = self.catalog_builder(paths)?;
        let details = if !builder.is_explicit() && rows.iter().any(|r| r.peptide.has_symbols()) {
            let file = paths.companion(Companion::ModDetails);
            if !file.is_file() {
                return Err(DatasetError::MissingRequiredAuxiliary {
                    file,
                    reason: "peptides carry modification symbols and there is no modification summary"
                        .to_string(),
                });
            }
            let table = ModDetailsTable::from_path(&file)?;
            debug!("{}: {} results with modification details", paths.dataset, table.len());
            Some(table)
        } else {
            None
        };

        let enrichment = self.load_enrichment(paths);

        let mut rejected = vec![false; rows.len()];
        for (row, rejected) in rows.iter().zip(rejected.iter_mut()) {
            let observed = evidence(row, details.as_ref())
                .and_then(|evidence| builder.observe_peptide(&row.peptide, &evidence));
            if let Err(e) = observed {
                record_hit_error(report, row, e)?;
                *rejected = true;
            }
        }

        let catalog = builder.build()?;
        report.modifications = catalog.len();
        debug!(
            "{}: catalog of {} modifications ({})",
            paths.dataset,
            catalog.len(),
            if catalog.is_explicit() { "explicit" } else { "inferred" }
        );

        let mapper = ModificationMapper::new(&catalog, config.mapper_options());
        let mut assembler = Assembler::new(
            self.search_summary(paths, &layout, &catalog),
            config.assembler_options(),
        );
        let mut added = 0;
        for (row, _) in rows.iter().zip(&rejected).filter(|(_, rejected)| !**rejected) {
            let mapped = evidence(row, details.as_ref()).and_then(|evidence| mapper.map(&row.peptide, &evidence));
            let modifications = match mapped {
                Ok(modifications) => modifications,
                Err(e) => {
                    record_hit_error(report, row, e)?;
                    continue;
                }
            };
            match assembler.add(row, modifications, &enrichment) {
                Ok(()) => added += 1,
                Err(e) if e.is_row_error() => {
                    warn!("{}: skipping {}", paths.dataset, e);
                    report.skip(SkipKind::DisallowedResidue, e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let run = assembler.finish();
        report.hits_written = run.hit_count();
        report.hits_over_limit = added - run.hit_count();
        report.spectra_written = run.queries.len();
        report.disabled_enrichments = enrichment.disabled().to_vec();
        info!(
            "{}: {} spectra, {} hits, {} rows skipped",
            paths.dataset,
            report.spectra_written,
            report.hits_written,
            report.skipped_rows()
        );
        Ok(run)
    }

    fn convert_to_file(
        &self,
        hit_table: &Path,
        output_dir: Option<&Path>,
        report: &mut DatasetReport,
    ) -> Result<PathBuf, DatasetError> {
        let paths = DatasetPaths::from_hit_table(hit_table)?;
        let output = paths.output_file(output_dir);
        info!("Converting {} to {}", hit_table.display(), output.display());

        let run = self.prepare(&paths, report)?;
        let mut document = PendingDocument::create(&output, self.config.writer_options())?;
        document.write_run(&run)?;
        document.persist()
    }

    fn prepare_input(&self, hit_table: &Path) -> (DatasetReport, Option<AssembledRun>) {
        let mut report = DatasetReport::new(hit_table.display().to_string(), hit_table);
        let prepared = DatasetPaths::from_hit_table(hit_table).and_then(|paths| self.prepare(&paths, &mut report));
        match prepared {
            Ok(run) => (report, Some(run)),
            Err(e) => {
                warn!("Dataset {} failed: {}", report.dataset, e);
                report.failure = Some(e.to_string());
                (report, None)
            }
        }
    }

    fn read_rows(
        &self,
        paths: &DatasetPaths,
        report: &mut DatasetReport,
    ) -> Result<(ResultLayout, Vec<HitRow>), DatasetError> {
        let mut reader = ResultReader::open(&paths.hit_table, self.config.parser_options())?;
        let mut rows = Vec::new();

        while let Some(row) = reader.next_row() {
            match row {
                Ok(row) => {
                    if !row.flagged_residues.is_empty() && !self.config.skip_ambiguous_residues {
                        report.flag(format!(
                            "line {}: {} contains {:?}",
                            row.line,
                            row.peptide.sequence(),
                            row.flagged_residues
                        ));
                    }
                    rows.push(row);
                }
                Err(e) if e.is_row_error() => {
                    warn!("{}: skipping {}", paths.dataset, e);
                    report.skip(SkipKind::MalformedRow, e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        report.rows_read = reader.rows_read();
        report.layout = Some(reader.layout().to_string());
        Ok((reader.layout().clone(), rows))
    }

    fn catalog_builder(&self, paths: &DatasetPaths) -> Result<CatalogBuilder, DatasetError> {
        let mass_type = self.config.search.precursor_mass_type;
        let summary = paths.companion(Companion::ModSummary);

        if self.config.use_mod_summary && summary.is_file() {
            let builder = CatalogBuilder::from_mod_summary_file(&summary, mass_type, self.config.tolerance)?;
            debug!("{}: {} declared modifications", paths.dataset, builder.len());
            Ok(builder)
        } else {
            Ok(CatalogBuilder::new(mass_type, self.config.tolerance))
        }
    }

    fn load_enrichment(&self, paths: &DatasetPaths) -> Enrichment {
        let config = &self.config;
        let mut enrichment = Enrichment::none();

        if config.use_scan_stats {
            let file = paths.companion(Companion::ScanStats);
            if found(&mut enrichment, EnrichmentSource::ScanStats, &[file.as_path()]) {
                enrichment.install(EnrichmentSource::ScanStats, ScanStatsTable::from_path(&file), |e, t| {
                    e.elution = Box::new(t)
                });
            }
        }

        if config.use_msgf {
            let file = paths.companion(Companion::Msgf);
            if found(&mut enrichment, EnrichmentSource::Confidence, &[file.as_path()]) {
                enrichment.install(EnrichmentSource::Confidence, ConfidenceTable::from_path(&file), |e, t| {
                    e.confidence = Box::new(t)
                });
            }
        }

        if config.use_protein_map {
            let result_to_seq = paths.companion(Companion::ResultToSeqMap);
            let seq_to_protein = paths.companion(Companion::SeqToProteinMap);
            if found(&mut enrichment, EnrichmentSource::ProteinMap, &[result_to_seq.as_path(), seq_to_protein.as_path()]) {
                enrichment.install(
                    EnrichmentSource::ProteinMap,
                    ProteinMap::from_paths(&result_to_seq, &seq_to_protein),
                    |e, t| e.proteins = Box::new(t),
                );
            }
        }

        if let (true, Some(database)) = (config.use_fasta, config.search.database.as_ref()) {
            if found(&mut enrichment, EnrichmentSource::Fasta, &[database.as_path()]) {
                enrichment.install(EnrichmentSource::Fasta, FastaDescriptions::from_path(database), |e, t| {
                    e.descriptions = Box::new(t)
                });
            }
        }

        enrichment
    }

    fn search_summary(&self, paths: &DatasetPaths, layout: &ResultLayout, catalog: &ModificationCatalog) -> SearchSummary {
        let search = &self.config.search;

        let mut parameters = vec![
            (
                "source_file".to_string(),
                paths
                    .hit_table
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            ("modification_tolerance".to_string(), self.config.tolerance.to_string()),
        ];
        if let Some(limit) = self.config.hits_per_spectrum {
            parameters.push(("hits_per_spectrum".to_string(), limit.to_string()));
        }

        SearchSummary {
            base_name: paths.dataset.clone(),
            search_engine: search
                .engine
                .clone()
                .unwrap_or_else(|| layout.search_engine().to_string()),
            precursor_mass_type: search.precursor_mass_type,
            fragment_mass_type: search.fragment_mass_type,
            enzyme: search.enzyme.clone(),
            max_missed_cleavages: search.max_missed_cleavages,
            min_termini: search.min_termini,
            database: search.database.as_ref().map(|p| p.display().to_string()),
            modifications: catalog.definitions().cloned().collect(),
            parameters,
        }
    }
}

/// Evidence for a row: modification details replace symbol annotations
fn evidence<'a>(row: &'a HitRow, details: Option<&ModDetailsTable>) -> Result<Cow<'a, [Evidence]>, ModificationError> {
    match details {
        Some(details) if row.peptide.has_symbols() => {
            Ok(Cow::Owned(details.evidence_for(row.result_id, &row.peptide)?))
        }
        _ => Ok(Cow::Borrowed(row.peptide.evidence.as_slice())),
    }
}

/// Record a per-hit error, propagating anything that affects the dataset
fn record_hit_error(report: &mut DatasetReport, row: &HitRow, error: ModificationError) -> Result<(), DatasetError> {
    let kind = match error {
        ModificationError::Unresolvable { .. } => SkipKind::UnresolvableModification,
        ModificationError::Ambiguous { .. } => SkipKind::AmbiguousModification,
        other => return Err(other.into()),
    };
    warn!("Skipping hit at line {}: {}", row.line, error);
    report.skip(kind, format!("line {}: {}", row.line, error));
    Ok(())
}

/// Whether every file exists; records the source as disabled otherwise
fn found(enrichment: &mut Enrichment, source: EnrichmentSource, files: &[&Path]) -> bool {
    match files.iter().find(|file| !file.is_file()) {
        Some(missing) => {
            enrichment.disable(source, format!("{} not found", missing.display()));
            false
        }
        None => true,
    }
}

/// An output document written to a temporary file until persisted
struct PendingDocument {
    path: PathBuf,
    writer: PepXmlWriter<BufWriter<NamedTempFile>>,
}

impl PendingDocument {
    fn create(path: &Path, options: WriterOptions) -> Result<Self, DatasetError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(directory)?;

        let temp = NamedTempFile::new_in(directory)?;
        let mut writer = PepXmlWriter::new(BufWriter::new(temp), options);
        writer.start(&path.display().to_string())?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    fn write_run(&mut self, run: &AssembledRun) -> Result<(), DatasetError> {
        self.writer.write_run(run)?;
        Ok(())
    }

    fn persist(self) -> Result<PathBuf, DatasetError> {
        let temp = self
            .writer
            .finish()?
            .into_inner()
            .map_err(|e| e.into_error())?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        info!("Wrote {}", self.path.display());
        Ok(self.path)
    }
}

/// Datasets converted per round in combined mode
fn batch_size() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads().max(1)
    }

    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Apply `f` to every input, in parallel when enabled, keeping input order
fn map_inputs<T, F>(inputs: &[PathBuf], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Path) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        inputs.par_iter().map(|input| f(input.as_path())).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        inputs.iter().map(|input| f(input.as_path())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "ResultID\tScan\tCharge\tMH\tPeptide\tProtein\tRank\tDelM\tMSGFScore\tSpecEValue";

    fn write_table(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut content = String::from(HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_prepare_infers_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(
            dir.path(),
            "QC_msgfplus_syn.txt",
            &[
                "1\t100\t2\t1000.5\tK.AM[+15.9949]K.L\tProtA\t1\t0.001\t120\t1e-10",
                "2\t100\t2\t1000.5\tK.AMK.L\tProtB\t2\t0.002\t90\t1e-5",
                "3\t101\t3\t1200.5\tR.SPEK.-\tProtC\t1\t0\t70\t1e-3",
            ],
        );

        let converter = DatasetConverter::new(ConversionConfig::minimal());
        let paths = DatasetPaths::from_hit_table(&table).unwrap();
        let mut report = DatasetReport::new("QC", &table);
        let run = converter.prepare(&paths, &mut report).unwrap();

        assert_eq!(run.summary.base_name, "QC");
        assert_eq!(run.summary.modifications.len(), 1);
        assert_eq!(run.queries.len(), 2);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.hits_written, 3);
        assert_eq!(report.skipped_rows(), 0);
    }

    #[test]
    fn test_symbols_without_details_fail() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(
            dir.path(),
            "QC_syn.txt",
            &["1\t100\t2\t1000.5\tK.AM*K.L\tProtA\t1\t0\t120\t1e-10"],
        );

        let converter = DatasetConverter::new(ConversionConfig::minimal());
        let report = converter.convert(&table, None);
        let failure = report.failure.unwrap();
        assert!(failure.contains("QC_syn_ModDetails.txt"), "{}", failure);
        assert!(report.output.is_none());
        assert!(!dir.path().join("QC.pepXML").exists());
    }

    #[test]
    fn test_missing_enrichment_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(
            dir.path(),
            "QC_syn.txt",
            &["1\t100\t2\t1000.5\tK.AMK.L\tProtA\t1\t0\t120\t1e-10"],
        );

        let converter = DatasetConverter::new(ConversionConfig::default());
        let report = converter.convert(&table, None);
        assert!(report.is_success(), "{:?}", report.failure);
        assert!(report
            .disabled_enrichments
            .iter()
            .any(|d| d.source == EnrichmentSource::ScanStats));
        assert!(dir.path().join("QC.pepXML").is_file());
    }

    #[test]
    fn test_preview_requires_details() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(
            dir.path(),
            "QC_syn.txt",
            &["1\t100\t2\t1000.5\tK.AM*K.L\tProtA\t1\t0\t120\t1e-10"],
        );

        let converter = DatasetConverter::default();
        let preview = converter.preview(&table, None).unwrap();
        assert!(!preview.is_complete());
        let missing: Vec<_> = preview.missing().map(|e| e.name.as_str()).collect();
        assert_eq!(missing, vec!["modification details"]);

        fs::write(dir.path().join("QC_syn_ModDetails.txt"), "ResultID\tResidue\tPosition\tMass_Shift\n").unwrap();
        assert!(converter.preview(&table, None).unwrap().is_complete());
    }
}
