#![no_main]

use libfuzzer_sys::fuzz_target;
use pepxml_convert::results::{AnnotatedPeptide, ParserOptions, ResultReader};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Malformed tables must be reported as errors, never panic
    if let Ok(reader) = ResultReader::new(Cursor::new(data), ParserOptions::default()) {
        for row in reader.take(1000) {
            let _ = row;
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = AnnotatedPeptide::parse(text);
    }
});
