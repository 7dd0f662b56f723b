//! Annotated peptide strings.
//!
//! Accepted forms:
//!
//! ```text
//! K.AVAAGM*NPM*DLK.E          symbol annotations, resolved through the catalog
//! K.AVAAGM[+15.9949]NPMDLK.E  signed value: mass shift
//! AVAAGM[147.0354]NPMDLK      unsigned value: total residue mass, flanks default to '-'
//! -.n[+42.0106]MPEPTIDEc[+4.0085].-   terminal evidence
//! ```

use super::error::SequenceError;

/// Protein terminus marker used for flanking residues
pub const TERMINUS_MARKER: char = '-';

/// Where a piece of modification evidence applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    /// Peptide N-terminus
    NTerm,
    /// Peptide C-terminus
    CTerm,
    /// Residue, 0-based index into the sequence
    Residue(usize),
}

/// How the evidence states the modification
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvidenceKind {
    /// One-character symbol from the catalog
    Symbol(char),
    /// Mass shift relative to the unmodified residue or terminus
    Shift(f64),
    /// Total mass of the residue or terminus
    Total(f64),
}

/// One modification annotation observed on a peptide
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evidence {
    /// Annotated site
    pub site: Site,
    /// Annotation value
    pub kind: EvidenceKind,
}

/// A peptide with flanking residues and its inline modification evidence
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPeptide {
    /// Uppercase residue codes
    pub residues: Vec<u8>,
    /// Residue before the peptide, `-` at the protein N-terminus
    pub prev_aa: char,
    /// Residue after the peptide, `-` at the protein C-terminus
    pub next_aa: char,
    /// Annotations in order of appearance
    pub evidence: Vec<Evidence>,
}

impl AnnotatedPeptide {
    /// Parse an annotated peptide string
    pub fn parse(text: &str) -> Result<Self, SequenceError> {
        let text = text.trim();
        let (prev_aa, core, next_aa) = split_flanks(text);

        let bytes = core.as_bytes();
        let mut residues = Vec::with_capacity(bytes.len());
        let mut evidence = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'A'..=b'Z' => {
                    residues.push(c);
                    i += 1;
                }
                b'n' if i == 0 && bytes.get(1) == Some(&b'[') => {
                    let (kind, end) = parse_bracket(core, 1)?;
                    evidence.push(Evidence { site: Site::NTerm, kind });
                    i = end;
                }
                b'c' if bytes.get(i + 1) == Some(&b'[') => {
                    let (kind, end) = parse_bracket(core, i + 1)?;
                    if end != bytes.len() {
                        return Err(SequenceError::UnexpectedChar('c', i));
                    }
                    evidence.push(Evidence { site: Site::CTerm, kind });
                    i = end;
                }
                b'[' => {
                    let position = residues.len().checked_sub(1).ok_or(SequenceError::Dangling(i))?;
                    let (kind, end) = parse_bracket(core, i)?;
                    evidence.push(Evidence {
                        site: Site::Residue(position),
                        kind,
                    });
                    i = end;
                }
                _ if is_symbol(c) => {
                    let position = residues.len().checked_sub(1).ok_or(SequenceError::Dangling(i))?;
                    evidence.push(Evidence {
                        site: Site::Residue(position),
                        kind: EvidenceKind::Symbol(c as char),
                    });
                    i += 1;
                }
                _ => {
                    let ch = core[i..].chars().next().unwrap_or('?');
                    return Err(SequenceError::UnexpectedChar(ch, i));
                }
            }
        }

        if residues.is_empty() {
            return Err(SequenceError::Empty);
        }

        Ok(Self {
            residues,
            prev_aa,
            next_aa,
            evidence,
        })
    }

    /// Plain residue sequence without annotations
    pub fn sequence(&self) -> String {
        self.residues.iter().map(|&r| r as char).collect()
    }

    /// Number of residues
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    /// Whether the peptide has no residues (never true for a parsed peptide)
    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Whether any annotation is a catalog symbol
    pub fn has_symbols(&self) -> bool {
        self.evidence
            .iter()
            .any(|e| matches!(e.kind, EvidenceKind::Symbol(_)))
    }

    /// Residue codes present in `codes`, in order of first appearance
    pub fn residues_in(&self, codes: &[char]) -> Vec<char> {
        let mut found = Vec::new();
        for &r in &self.residues {
            let c = r as char;
            if codes.contains(&c) && !found.contains(&c) {
                found.push(c);
            }
        }
        found
    }
}

/// Characters that may be used as modification symbols
pub fn is_symbol(c: u8) -> bool {
    c.is_ascii_punctuation() && !matches!(c, b'[' | b']' | b'.' | b'-' | b'<' | b'>')
}

fn split_flanks(text: &str) -> (char, &str, char) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    if len >= 4 && bytes[1] == b'.' && bytes[len - 2] == b'.' {
        let prev = flank(bytes[0]);
        let next = flank(bytes[len - 1]);
        (prev, &text[2..len - 2], next)
    } else {
        (TERMINUS_MARKER, text, TERMINUS_MARKER)
    }
}

fn flank(b: u8) -> char {
    if b.is_ascii_uppercase() {
        b as char
    } else {
        TERMINUS_MARKER
    }
}

/// Parse `[value]` starting at `open`; returns the evidence kind and the offset after `]`
fn parse_bracket(core: &str, open: usize) -> Result<(EvidenceKind, usize), SequenceError> {
    let rest = &core[open + 1..];
    let close = rest.find(']').ok_or(SequenceError::Unterminated(open))?;
    let content = rest[..close].trim();
    let value: f64 = content
        .parse()
        .map_err(|_| SequenceError::InvalidMass(content.to_string()))?;
    if !value.is_finite() {
        return Err(SequenceError::InvalidMass(content.to_string()));
    }
    let kind = if content.starts_with('+') || content.starts_with('-') {
        EvidenceKind::Shift(value)
    } else {
        EvidenceKind::Total(value)
    };
    Ok((kind, open + 1 + close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_annotations() {
        let peptide = AnnotatedPeptide::parse("K.AVAAGM*NPM*DLK.E").unwrap();
        assert_eq!(peptide.sequence(), "AVAAGMNPMDLK");
        assert_eq!(peptide.prev_aa, 'K');
        assert_eq!(peptide.next_aa, 'E');
        assert_eq!(
            peptide.evidence,
            vec![
                Evidence { site: Site::Residue(5), kind: EvidenceKind::Symbol('*') },
                Evidence { site: Site::Residue(8), kind: EvidenceKind::Symbol('*') },
            ]
        );
        assert!(peptide.has_symbols());
    }

    #[test]
    fn test_bracket_annotations() {
        let peptide = AnnotatedPeptide::parse("R.AVAAGM[+15.9949]NPM[147.0354]DLK.-").unwrap();
        assert_eq!(peptide.next_aa, '-');
        assert_eq!(peptide.evidence[0].kind, EvidenceKind::Shift(15.9949));
        assert_eq!(peptide.evidence[1].kind, EvidenceKind::Total(147.0354));
        assert_eq!(peptide.evidence[1].site, Site::Residue(8));
    }

    #[test]
    fn test_terminal_annotations() {
        let peptide = AnnotatedPeptide::parse("-.n[+42.0106]MPEPTIDEc[+4.0085].A").unwrap();
        assert_eq!(peptide.sequence(), "MPEPTIDE");
        assert_eq!(peptide.evidence[0].site, Site::NTerm);
        assert_eq!(peptide.evidence[1].site, Site::CTerm);
        assert_eq!(peptide.evidence[1].kind, EvidenceKind::Shift(4.0085));
    }

    #[test]
    fn test_unflanked_with_decimal_in_last_bracket() {
        let peptide = AnnotatedPeptide::parse("PEPTIDEM[+15.99]").unwrap();
        assert_eq!(peptide.prev_aa, '-');
        assert_eq!(peptide.sequence(), "PEPTIDEM");
    }

    #[test]
    fn test_errors() {
        assert_eq!(AnnotatedPeptide::parse("K..E"), Err(SequenceError::Empty));
        assert_eq!(AnnotatedPeptide::parse("*PEPTIDE"), Err(SequenceError::Dangling(0)));
        assert!(matches!(
            AnnotatedPeptide::parse("PEPM[+abc]"),
            Err(SequenceError::InvalidMass(_))
        ));
        assert!(matches!(
            AnnotatedPeptide::parse("PEPM[+15.99"),
            Err(SequenceError::Unterminated(_))
        ));
        assert!(matches!(
            AnnotatedPeptide::parse("PEP1TIDE"),
            Err(SequenceError::UnexpectedChar('1', 3))
        ));
    }

    #[test]
    fn test_residues_in() {
        let peptide = AnnotatedPeptide::parse("PEPXBXIDE").unwrap();
        assert_eq!(peptide.residues_in(&['B', 'J', 'X', 'Z']), vec!['X', 'B']);
    }
}
