//! Streaming pepXML writer.
//!
//! The document header is written by [`PepXmlWriter::start`]; each
//! [`AssembledRun`] becomes one `msms_run_summary` written and flushed by
//! [`PepXmlWriter::write_run`]; [`PepXmlWriter::finish`] closes the root element.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::SerializationError;
use crate::document::{AssembledRun, PeptideHit, SearchSummary, SpectrumQuery};
use crate::modifications::{ModificationDefinition, ModificationTarget};

const PEPXML_NS: &str = "http://regis-web.systemsbiology.net/pepXML";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://regis-web.systemsbiology.net/pepXML http://sashimi.sourceforge.net/schema_revision/pepXML/pepXML_v122.xsd";

/// Default number of decimals for masses
pub const DEFAULT_MASS_DECIMALS: usize = 4;

/// Writer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// Fixed decimals for every mass attribute
    pub mass_decimals: usize,
    /// Document `date`; the current local time when unset
    pub date: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mass_decimals: DEFAULT_MASS_DECIMALS,
            date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Open,
}

/// Writes pepXML to any [`Write`] sink
pub struct PepXmlWriter<W: Write> {
    writer: Writer<W>,
    options: WriterOptions,
    state: State,
    runs_written: usize,
}

impl PepXmlWriter<BufWriter<File>> {
    /// Create a writer on a new file
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self, SerializationError> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file), options))
    }
}

impl<W: Write> PepXmlWriter<W> {
    /// Create a writer on a sink
    pub fn new(inner: W, options: WriterOptions) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
            options,
            state: State::Created,
            runs_written: 0,
        }
    }

    /// Number of runs written so far
    pub fn runs_written(&self) -> usize {
        self.runs_written
    }

    /// Write the XML declaration and open `msms_pipeline_analysis`
    pub fn start(&mut self, summary_xml: &str) -> Result<(), SerializationError> {
        if self.state != State::Created {
            return Err(SerializationError::InvalidState("document already started"));
        }
        let date = match &self.options.date {
            Some(date) => date.clone(),
            None => chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        };

        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut root = BytesStart::new("msms_pipeline_analysis");
        root.push_attribute(("date", date.as_str()));
        root.push_attribute(("xmlns", PEPXML_NS));
        root.push_attribute(("xmlns:xsi", XSI_NS));
        root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
        root.push_attribute(("summary_xml", summary_xml));
        self.writer.write_event(Event::Start(root))?;
        self.state = State::Open;
        Ok(())
    }

    /// Write one dataset and flush it
    pub fn write_run(&mut self, run: &AssembledRun) -> Result<(), SerializationError> {
        if self.state != State::Open {
            return Err(SerializationError::InvalidState("document not started"));
        }
        let summary = &run.summary;

        let mut element = BytesStart::new("msms_run_summary");
        element.push_attribute(("base_name", summary.base_name.as_str()));
        element.push_attribute(("raw_data_type", "raw"));
        element.push_attribute(("raw_data", ".raw"));
        self.writer.write_event(Event::Start(element))?;

        self.write_enzyme(summary)?;
        self.write_search_summary(summary)?;
        for query in &run.queries {
            self.write_query(query)?;
        }

        self.writer
            .write_event(Event::End(BytesEnd::new("msms_run_summary")))?;
        self.writer.get_mut().flush()?;
        self.runs_written += 1;
        Ok(())
    }

    /// Close the document and return the sink
    pub fn finish(mut self) -> Result<W, SerializationError> {
        if self.state != State::Open {
            return Err(SerializationError::InvalidState("document not started"));
        }
        self.writer
            .write_event(Event::End(BytesEnd::new("msms_pipeline_analysis")))?;
        let mut inner = self.writer.into_inner();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(inner)
    }

    fn mass(&self, value: f64) -> String {
        format_mass(value, self.options.mass_decimals)
    }

    fn write_enzyme(&mut self, summary: &SearchSummary) -> Result<(), SerializationError> {
        let enzyme = &summary.enzyme;
        let mut element = BytesStart::new("sample_enzyme");
        element.push_attribute(("name", enzyme.name.as_str()));
        self.writer.write_event(Event::Start(element))?;

        let mut specificity = BytesStart::new("specificity");
        specificity.push_attribute(("cut", enzyme.cut.as_str()));
        if !enzyme.no_cut.is_empty() {
            specificity.push_attribute(("no_cut", enzyme.no_cut.as_str()));
        }
        specificity.push_attribute(("sense", enzyme.sense.as_str()));
        self.writer.write_event(Event::Empty(specificity))?;

        self.writer.write_event(Event::End(BytesEnd::new("sample_enzyme")))?;
        Ok(())
    }

    fn write_search_summary(&mut self, summary: &SearchSummary) -> Result<(), SerializationError> {
        let mut element = BytesStart::new("search_summary");
        element.push_attribute(("base_name", summary.base_name.as_str()));
        element.push_attribute(("search_engine", summary.search_engine.as_str()));
        element.push_attribute(("precursor_mass_type", summary.precursor_mass_type.to_string().as_str()));
        element.push_attribute(("fragment_mass_type", summary.fragment_mass_type.to_string().as_str()));
        element.push_attribute(("search_id", "1"));
        self.writer.write_event(Event::Start(element))?;

        if let Some(database) = &summary.database {
            let mut db = BytesStart::new("search_database");
            db.push_attribute(("local_path", database.as_str()));
            db.push_attribute(("type", "AA"));
            self.writer.write_event(Event::Empty(db))?;
        }

        let mut constraint = BytesStart::new("enzymatic_search_constraint");
        constraint.push_attribute(("enzyme", summary.enzyme.name.as_str()));
        constraint.push_attribute((
            "max_num_internal_cleavages",
            summary.max_missed_cleavages.to_string().as_str(),
        ));
        constraint.push_attribute(("min_number_termini", summary.min_termini.to_string().as_str()));
        self.writer.write_event(Event::Empty(constraint))?;

        let (residues, termini): (Vec<_>, Vec<_>) = summary
            .modifications
            .iter()
            .partition(|d| matches!(d.target, ModificationTarget::Residue(_)));
        for definition in residues.into_iter().chain(termini) {
            self.write_definition(definition)?;
        }

        for (name, value) in &summary.parameters {
            let mut parameter = BytesStart::new("parameter");
            parameter.push_attribute(("name", name.as_str()));
            parameter.push_attribute(("value", value.as_str()));
            self.writer.write_event(Event::Empty(parameter))?;
        }

        self.writer.write_event(Event::End(BytesEnd::new("search_summary")))?;
        Ok(())
    }

    fn write_definition(&mut self, definition: &ModificationDefinition) -> Result<(), SerializationError> {
        let massdiff = self.mass(definition.mass_shift);
        let mass = self.mass(definition.total_mass);
        let variable = yes_no(definition.variable);
        let symbol = definition.symbol.to_string();

        let element = match definition.target {
            ModificationTarget::Residue(residue) => {
                let residue = (residue as char).to_string();
                let mut element = BytesStart::new("aminoacid_modification");
                element.push_attribute(("aminoacid", residue.as_str()));
                element.push_attribute(("massdiff", massdiff.as_str()));
                element.push_attribute(("mass", mass.as_str()));
                element.push_attribute(("variable", variable));
                if definition.variable {
                    element.push_attribute(("symbol", symbol.as_str()));
                }
                element
            }
            target => {
                let terminus = if target.is_n_terminal() { "n" } else { "c" };
                let mut element = BytesStart::new("terminal_modification");
                element.push_attribute(("terminus", terminus));
                element.push_attribute(("massdiff", massdiff.as_str()));
                element.push_attribute(("mass", mass.as_str()));
                element.push_attribute(("variable", variable));
                element.push_attribute(("protein_terminus", yes_no(target.is_protein_terminal())));
                if definition.variable {
                    element.push_attribute(("symbol", symbol.as_str()));
                }
                element
            }
        };
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn write_query(&mut self, query: &SpectrumQuery) -> Result<(), SerializationError> {
        let scan = query.scan.to_string();
        let mut element = BytesStart::new("spectrum_query");
        element.push_attribute(("spectrum", query.spectrum.as_str()));
        element.push_attribute(("start_scan", scan.as_str()));
        element.push_attribute(("end_scan", scan.as_str()));
        element.push_attribute(("precursor_neutral_mass", self.mass(query.precursor_neutral_mass).as_str()));
        element.push_attribute(("assumed_charge", query.charge.to_string().as_str()));
        element.push_attribute(("index", query.index.to_string().as_str()));
        if let Some(seconds) = query.retention_time_sec {
            element.push_attribute(("retention_time_sec", format_fixed(seconds, 2).as_str()));
        }
        self.writer.write_event(Event::Start(element))?;
        self.writer.write_event(Event::Start(BytesStart::new("search_result")))?;

        for hit in &query.hits {
            self.write_hit(hit)?;
        }

        self.writer.write_event(Event::End(BytesEnd::new("search_result")))?;
        self.writer.write_event(Event::End(BytesEnd::new("spectrum_query")))?;
        Ok(())
    }

    fn write_hit(&mut self, hit: &PeptideHit) -> Result<(), SerializationError> {
        let prev = hit.prev_aa.to_string();
        let next = hit.next_aa.to_string();
        let mut element = BytesStart::new("search_hit");
        element.push_attribute(("hit_rank", hit.rank.to_string().as_str()));
        element.push_attribute(("peptide", hit.peptide.as_str()));
        element.push_attribute(("peptide_prev_aa", prev.as_str()));
        element.push_attribute(("peptide_next_aa", next.as_str()));
        element.push_attribute(("protein", hit.protein.as_str()));
        if let Some(description) = &hit.protein_description {
            element.push_attribute(("protein_descr", description.as_str()));
        }
        element.push_attribute(("num_tot_proteins", hit.num_tot_proteins.to_string().as_str()));
        element.push_attribute(("num_matched_ions", hit.matched_ions.to_string().as_str()));
        element.push_attribute(("tot_num_ions", hit.total_ions.to_string().as_str()));
        element.push_attribute(("calc_neutral_pep_mass", self.mass(hit.calc_neutral_mass).as_str()));
        element.push_attribute(("massdiff", self.mass(hit.mass_diff).as_str()));
        element.push_attribute(("num_tol_term", hit.tolerable_termini.to_string().as_str()));
        element.push_attribute(("num_missed_cleavages", hit.missed_cleavages.to_string().as_str()));
        element.push_attribute(("is_rejected", if hit.rejected { "1" } else { "0" }));
        self.writer.write_event(Event::Start(element))?;

        for alternative in &hit.alternatives {
            let mut alt = BytesStart::new("alternative_protein");
            alt.push_attribute(("protein", alternative.protein.as_str()));
            if let Some(description) = &alternative.description {
                alt.push_attribute(("protein_descr", description.as_str()));
            }
            alt.push_attribute(("num_tol_term", alternative.tolerable_termini.to_string().as_str()));
            self.writer.write_event(Event::Empty(alt))?;
        }

        let modifications = &hit.modifications;
        if !modifications.is_empty() {
            let mut info = BytesStart::new("modification_info");
            if let Some(mass) = modifications.nterm_mass {
                info.push_attribute(("mod_nterm_mass", self.mass(mass).as_str()));
            }
            if let Some(mass) = modifications.cterm_mass {
                info.push_attribute(("mod_cterm_mass", self.mass(mass).as_str()));
            }
            if modifications.residues.is_empty() {
                self.writer.write_event(Event::Empty(info))?;
            } else {
                self.writer.write_event(Event::Start(info))?;
                for residue in &modifications.residues {
                    let mut aa = BytesStart::new("mod_aminoacid_mass");
                    aa.push_attribute(("position", residue.position.to_string().as_str()));
                    aa.push_attribute(("mass", self.mass(residue.mass).as_str()));
                    self.writer.write_event(Event::Empty(aa))?;
                }
                self.writer.write_event(Event::End(BytesEnd::new("modification_info")))?;
            }
        }

        for score in &hit.scores {
            let mut element = BytesStart::new("search_score");
            element.push_attribute(("name", score.name.as_str()));
            element.push_attribute(("value", format_score(score.value).as_str()));
            self.writer.write_event(Event::Empty(element))?;
        }

        self.writer.write_event(Event::End(BytesEnd::new("search_hit")))?;
        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

/// Fixed-point decimal without a negative zero
pub fn format_fixed(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    match text.strip_prefix('-') {
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => rest.to_string(),
        _ => text,
    }
}

/// Mass attribute value with a fixed number of decimals
pub fn format_mass(value: f64, decimals: usize) -> String {
    format_fixed(value, decimals)
}

/// Score attribute value: shortest decimal that reads back exactly, never exponent notation
pub fn format_score(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mass() {
        assert_eq!(format_mass(147.035399, 4), "147.0354");
        assert_eq!(format_mass(-0.00001, 4), "0.0000");
        assert_eq!(format_mass(-17.0265, 4), "-17.0265");
        assert_eq!(format_mass(1234567.0, 2), "1234567.00");
    }

    #[test]
    fn test_format_score_never_uses_exponent() {
        assert_eq!(format_score(3.512), "3.512");
        assert_eq!(format_score(1.5e-9), "0.0000000015");
        assert_eq!(format_score(-0.0), "0");
        assert_eq!(format_score(2.0), "2");
    }

    #[test]
    fn test_run_before_start_is_rejected() {
        let mut writer = PepXmlWriter::new(Vec::new(), WriterOptions::default());
        let run = AssembledRun {
            summary: SearchSummary {
                base_name: "x".to_string(),
                search_engine: "SEQUEST".to_string(),
                precursor_mass_type: Default::default(),
                fragment_mass_type: Default::default(),
                enzyme: Default::default(),
                max_missed_cleavages: 0,
                min_termini: 0,
                database: None,
                modifications: Vec::new(),
                parameters: Vec::new(),
            },
            queries: Vec::new(),
        };
        assert!(matches!(
            writer.write_run(&run),
            Err(SerializationError::InvalidState(_))
        ));
    }
}
