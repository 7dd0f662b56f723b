//! Read-back parser for pepXML documents.
//!
//! Recovers the run, query and hit structure (sequences, ranks, modification
//! masses and scores) from a document. Unknown elements are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::SerializationError;

/// A modification definition as declared in a search summary
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationRecord {
    /// Residue letter, or `n` / `c` for terminal modifications
    pub target: String,
    /// Declared mass shift
    pub massdiff: f64,
    /// Declared total mass
    pub mass: f64,
    /// Variable flag
    pub variable: bool,
    /// Protein-terminal flag (terminal modifications only)
    pub protein_terminus: bool,
    /// Symbol, when written
    pub symbol: Option<String>,
}

/// One search hit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitRecord {
    /// Hit rank
    pub rank: u32,
    /// Plain peptide sequence
    pub peptide: String,
    /// Primary protein
    pub protein: String,
    /// Primary protein description
    pub protein_description: Option<String>,
    /// Alternative protein accessions
    pub alternative_proteins: Vec<String>,
    /// Calculated neutral peptide mass
    pub calc_neutral_mass: f64,
    /// Rejection flag
    pub rejected: bool,
    /// Whether a `modification_info` element was present
    pub has_modification_info: bool,
    /// N-terminal total mass
    pub nterm_mass: Option<f64>,
    /// C-terminal total mass
    pub cterm_mass: Option<f64>,
    /// Modified residues as (1-based position, total mass)
    pub modified_residues: Vec<(usize, f64)>,
    /// Named scores
    pub scores: Vec<(String, f64)>,
}

/// One spectrum query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRecord {
    /// Spectrum name
    pub spectrum: String,
    /// Start scan
    pub scan: u32,
    /// Assumed charge
    pub charge: u8,
    /// 1-based index in the run
    pub index: u32,
    /// Elution time in seconds
    pub retention_time_sec: Option<f64>,
    /// Hits in document order
    pub hits: Vec<HitRecord>,
}

/// One `msms_run_summary`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    /// Run base name
    pub base_name: String,
    /// Search engine of the search summary
    pub search_engine: Option<String>,
    /// Enzyme name
    pub enzyme: Option<String>,
    /// Database path
    pub database: Option<String>,
    /// Declared modifications in document order
    pub modifications: Vec<ModificationRecord>,
    /// Spectrum queries in document order
    pub queries: Vec<QueryRecord>,
}

impl RunRecord {
    /// Number of hits across all queries
    pub fn hit_count(&self) -> usize {
        self.queries.iter().map(|q| q.hits.len()).sum()
    }
}

/// A parsed pepXML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PepXmlDocument {
    /// Document date attribute
    pub date: Option<String>,
    /// Runs in document order
    pub runs: Vec<RunRecord>,
}

impl PepXmlDocument {
    /// Parse a pepXML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse pepXML from a buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SerializationError> {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);

        let mut parser = Parser::default();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => parser.open(e)?,
                Event::Empty(ref e) => {
                    parser.open(e)?;
                    parser.close(e.name().as_ref())?;
                }
                Event::End(ref e) => parser.close(e.name().as_ref())?,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !parser.seen_root {
            return Err(SerializationError::InvalidDocument(
                "missing msms_pipeline_analysis".to_string(),
            ));
        }
        Ok(parser.document)
    }
}

#[derive(Default)]
struct Parser {
    document: PepXmlDocument,
    seen_root: bool,
    run: Option<RunRecord>,
    query: Option<QueryRecord>,
    hit: Option<HitRecord>,
}

impl Parser {
    fn open(&mut self, e: &BytesStart) -> Result<(), SerializationError> {
        match e.name().as_ref() {
            b"msms_pipeline_analysis" => {
                self.seen_root = true;
                self.document.date = get_attribute(e, "date")?;
            }
            b"msms_run_summary" => {
                self.run = Some(RunRecord {
                    base_name: get_attribute(e, "base_name")?.unwrap_or_default(),
                    ..Default::default()
                });
            }
            b"sample_enzyme" => {
                if let Some(run) = self.run.as_mut() {
                    run.enzyme = get_attribute(e, "name")?;
                }
            }
            b"search_summary" => {
                if let Some(run) = self.run.as_mut() {
                    run.search_engine = get_attribute(e, "search_engine")?;
                }
            }
            b"search_database" => {
                if let Some(run) = self.run.as_mut() {
                    run.database = get_attribute(e, "local_path")?;
                }
            }
            b"aminoacid_modification" | b"terminal_modification" => {
                let terminal = e.name().as_ref() == b"terminal_modification";
                let record = ModificationRecord {
                    target: required(e, if terminal { "terminus" } else { "aminoacid" })?,
                    massdiff: parse_required(e, "massdiff")?,
                    mass: parse_required(e, "mass")?,
                    variable: get_attribute(e, "variable")?.as_deref() == Some("Y"),
                    protein_terminus: get_attribute(e, "protein_terminus")?.as_deref() == Some("Y"),
                    symbol: get_attribute(e, "symbol")?,
                };
                self.current_run()?.modifications.push(record);
            }
            b"spectrum_query" => {
                self.current_run()?;
                self.query = Some(QueryRecord {
                    spectrum: required(e, "spectrum")?,
                    scan: parse_required(e, "start_scan")?,
                    charge: parse_required(e, "assumed_charge")?,
                    index: parse_required(e, "index")?,
                    retention_time_sec: parse_optional(e, "retention_time_sec")?,
                    hits: Vec::new(),
                });
            }
            b"search_hit" => {
                if self.query.is_none() {
                    return Err(SerializationError::InvalidDocument(
                        "search_hit outside spectrum_query".to_string(),
                    ));
                }
                self.hit = Some(HitRecord {
                    rank: parse_required(e, "hit_rank")?,
                    peptide: required(e, "peptide")?,
                    protein: required(e, "protein")?,
                    protein_description: get_attribute(e, "protein_descr")?,
                    calc_neutral_mass: parse_required(e, "calc_neutral_pep_mass")?,
                    rejected: get_attribute(e, "is_rejected")?.as_deref() == Some("1"),
                    ..Default::default()
                });
            }
            b"alternative_protein" => {
                let protein = required(e, "protein")?;
                self.current_hit()?.alternative_proteins.push(protein);
            }
            b"modification_info" => {
                let nterm = parse_optional(e, "mod_nterm_mass")?;
                let cterm = parse_optional(e, "mod_cterm_mass")?;
                let hit = self.current_hit()?;
                hit.has_modification_info = true;
                hit.nterm_mass = nterm;
                hit.cterm_mass = cterm;
            }
            b"mod_aminoacid_mass" => {
                let position = parse_required(e, "position")?;
                let mass = parse_required(e, "mass")?;
                self.current_hit()?.modified_residues.push((position, mass));
            }
            b"search_score" => {
                let name = required(e, "name")?;
                let value = parse_required(e, "value")?;
                self.current_hit()?.scores.push((name, value));
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), SerializationError> {
        match name {
            b"search_hit" => {
                if let (Some(hit), Some(query)) = (self.hit.take(), self.query.as_mut()) {
                    query.hits.push(hit);
                }
            }
            b"spectrum_query" => {
                if let Some(query) = self.query.take() {
                    self.current_run()?.queries.push(query);
                }
            }
            b"msms_run_summary" => {
                if let Some(run) = self.run.take() {
                    self.document.runs.push(run);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn current_run(&mut self) -> Result<&mut RunRecord, SerializationError> {
        self.run
            .as_mut()
            .ok_or_else(|| SerializationError::InvalidDocument("element outside msms_run_summary".to_string()))
    }

    fn current_hit(&mut self) -> Result<&mut HitRecord, SerializationError> {
        self.hit
            .as_mut()
            .ok_or_else(|| SerializationError::InvalidDocument("element outside search_hit".to_string()))
    }
}

/// Get an unescaped attribute value
fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>, SerializationError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required(e: &BytesStart, name: &str) -> Result<String, SerializationError> {
    get_attribute(e, name)?.ok_or_else(|| {
        SerializationError::InvalidDocument(format!(
            "{} lacks attribute {}",
            String::from_utf8_lossy(e.name().as_ref()),
            name
        ))
    })
}

fn parse_optional<T: FromStr>(e: &BytesStart, name: &str) -> Result<Option<T>, SerializationError> {
    match get_attribute(e, name)? {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            SerializationError::InvalidDocument(format!("invalid value '{}' for attribute {}", value, name))
        }),
        None => Ok(None),
    }
}

fn parse_required<T: FromStr>(e: &BytesStart, name: &str) -> Result<T, SerializationError> {
    let value = required(e, name)?;
    value
        .trim()
        .parse()
        .map_err(|_| SerializationError::InvalidDocument(format!("invalid value '{}' for attribute {}", value, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<msms_pipeline_analysis date="2024-01-01T00:00:00" summary_xml="QC.pepXML">
  <msms_run_summary base_name="QC" raw_data_type="raw" raw_data=".raw">
    <search_summary base_name="QC" search_engine="SEQUEST" precursor_mass_type="monoisotopic" fragment_mass_type="monoisotopic" search_id="1">
      <aminoacid_modification aminoacid="M" massdiff="15.9949" mass="147.0354" variable="Y" symbol="*"/>
      <terminal_modification terminus="n" massdiff="42.0106" mass="43.0184" variable="N" protein_terminus="N"/>
    </search_summary>
    <spectrum_query spectrum="QC.100.100.2" start_scan="100" end_scan="100" precursor_neutral_mass="1262.5800" assumed_charge="2" index="1">
      <search_result>
        <search_hit hit_rank="1" peptide="AVAAGMNPMDLK" peptide_prev_aa="K" peptide_next_aa="E" protein="SO_1234" protein_descr="a &lt;b&gt; &amp; c" num_tot_proteins="2" num_matched_ions="15" tot_num_ions="22" calc_neutral_pep_mass="1262.5761" massdiff="0.0032" num_tol_term="2" num_missed_cleavages="0" is_rejected="0">
          <alternative_protein protein="SO_4321" num_tol_term="2"/>
          <modification_info mod_nterm_mass="43.0184">
            <mod_aminoacid_mass position="6" mass="147.0354"/>
          </modification_info>
          <search_score name="xcorr" value="3.512"/>
        </search_hit>
      </search_result>
    </spectrum_query>
  </msms_run_summary>
</msms_pipeline_analysis>
"#;

    #[test]
    fn test_read_document() {
        let doc = PepXmlDocument::from_reader(Cursor::new(DOCUMENT)).unwrap();
        assert_eq!(doc.runs.len(), 1);
        let run = &doc.runs[0];
        assert_eq!(run.base_name, "QC");
        assert_eq!(run.search_engine.as_deref(), Some("SEQUEST"));
        assert_eq!(run.modifications.len(), 2);
        assert_eq!(run.modifications[1].target, "n");
        assert_eq!(run.modifications[0].symbol.as_deref(), Some("*"));

        let hit = &run.queries[0].hits[0];
        assert_eq!(hit.protein_description.as_deref(), Some("a <b> & c"));
        assert_eq!(hit.alternative_proteins, vec!["SO_4321".to_string()]);
        assert_eq!(hit.nterm_mass, Some(43.0184));
        assert_eq!(hit.modified_residues, vec![(6, 147.0354)]);
        assert_eq!(hit.scores, vec![("xcorr".to_string(), 3.512)]);
        assert_eq!(run.hit_count(), 1);
    }

    #[test]
    fn test_not_pepxml() {
        let err = PepXmlDocument::from_reader(Cursor::new("<mzML></mzML>")).unwrap_err();
        assert!(matches!(err, SerializationError::InvalidDocument(_)));
    }
}
