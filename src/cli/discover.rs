//! Input discovery: plain files, directories of hit tables, and wildcard
//! patterns in the final path component.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Hit table names picked up when a directory is given
pub const DIRECTORY_PATTERNS: [&str; 3] = ["*_syn.txt", "*_fht.txt", "*_xt.txt"];

/// Translate a `*` / `?` wildcard into an anchored, case-insensitive regex
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr).with_context(|| format!("Invalid wildcard pattern: {}", pattern))
}

/// Expand the command-line inputs into hit table paths.
///
/// Order follows the inputs; directory entries are visited in name order.
/// A path found twice is kept once.
pub fn discover(inputs: &[PathBuf], recurse: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for input in inputs {
        if input.is_file() {
            found.push(input.clone());
            continue;
        }

        if input.is_dir() {
            let patterns = DIRECTORY_PATTERNS
                .iter()
                .map(|p| wildcard_regex(p))
                .collect::<Result<Vec<_>>>()?;
            scan(input, &patterns, recurse, &mut found)?;
            continue;
        }

        let name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.contains(|c: char| c == '*' || c == '?') {
            let directory = match input.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            scan(directory, &[wildcard_regex(name)?], recurse, &mut found)?;
            continue;
        }

        bail!("Input does not exist: {}", input.display());
    }

    let mut seen = std::collections::HashSet::new();
    found.retain(|path| seen.insert(path.clone()));
    Ok(found)
}

fn scan(directory: &Path, patterns: &[Regex], recurse: bool, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if recurse {
                scan(&path, patterns, recurse, found)?;
            }
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if patterns.iter().any(|p| p.is_match(name)) {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_wildcard_regex() {
        let re = wildcard_regex("QC_?_syn.txt").unwrap();
        assert!(re.is_match("QC_1_syn.txt"));
        assert!(re.is_match("qc_2_SYN.TXT"));
        assert!(!re.is_match("QC_12_syn.txt"));
        assert!(!re.is_match("QC_1_synXtxt"));
    }

    #[test]
    fn test_directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("B_syn.txt"));
        touch(&dir.path().join("A_xt.txt"));
        touch(&dir.path().join("A_xt_ModSummary.txt"));
        touch(&dir.path().join("notes.txt"));
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub").join("C_fht.txt"));

        let flat = discover(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(
            flat,
            vec![dir.path().join("A_xt.txt"), dir.path().join("B_syn.txt")]
        );

        let deep = discover(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 3);
        assert_eq!(deep[2], dir.path().join("sub").join("C_fht.txt"));
    }

    #[test]
    fn test_wildcard_input() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("QC_1_syn.txt"));
        touch(&dir.path().join("QC_2_syn.txt"));
        touch(&dir.path().join("Other_syn.txt"));

        let inputs = vec![
            dir.path().join("QC_*_syn.txt"),
            dir.path().join("QC_1_syn.txt"),
        ];
        let found = discover(&inputs, false).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("QC_1_syn.txt"), dir.path().join("QC_2_syn.txt")]
        );
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&[dir.path().join("absent_syn.txt")], false).is_err());
    }
}
