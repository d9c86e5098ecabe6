// src/records.rs

use crate::error::LoadError;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Streams newline-delimited JSON documents from a file, one object per line.
///
/// Blank lines are skipped silently. A line that fails to parse as a JSON
/// object is skipped with a warning and counted; it never aborts the read.
/// The reader holds no state beyond the file handle — re-opening the same
/// path restarts the sequence from the top.
#[derive(Debug)]
pub struct RecordReader {
    lines: std::io::Lines<BufReader<File>>,
    skipped: usize,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::MissingFile {
                path: path.display().to_string(),
            });
        }
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            skipped: 0,
        })
    }

    /// Number of lines skipped so far because they were not valid JSON objects.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for RecordReader {
    type Item = Map<String, Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Read error — ending record stream");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(map)) => return Some(map),
                Ok(_) => {
                    self.skipped += 1;
                    warn!(line = excerpt(&line), "Skipping non-object record");
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, line = excerpt(&line), "Skipping malformed JSON line");
                }
            }
        }
    }
}

/// First 120 characters of a line, for warning output.
pub fn excerpt(line: &str) -> &str {
    match line.char_indices().nth(120) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ndjson_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn malformed_line_does_not_abort_the_read() {
        let file = ndjson_file(&[
            r#"{"numerofactura": "F1"}"#,
            r#"{"numerofactura": "F2", broken"#,
            r#"{"numerofactura": "F3"}"#,
        ]);
        let mut reader = RecordReader::open(file.path()).unwrap();
        let records: Vec<_> = reader.by_ref().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(reader.skipped(), 1);
        assert_eq!(records[0]["numerofactura"], "F1");
        assert_eq!(records[1]["numerofactura"], "F3");
    }

    #[test]
    fn blank_lines_are_skipped_silently() {
        let file = ndjson_file(&["", r#"{"numeronota": "N1"}"#, "   ", ""]);
        let mut reader = RecordReader::open(file.path()).unwrap();
        assert_eq!(reader.by_ref().count(), 1);
        assert_eq!(reader.skipped(), 0);
    }

    #[test]
    fn non_object_lines_count_as_skipped() {
        let file = ndjson_file(&["42", r#""just a string""#, r#"{"ok": true}"#]);
        let mut reader = RecordReader::open(file.path()).unwrap();
        assert_eq!(reader.by_ref().count(), 1);
        assert_eq!(reader.skipped(), 2);
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let err = RecordReader::open(Path::new("no/such/file.jsonl")).unwrap_err();
        assert!(matches!(err, LoadError::MissingFile { ref path } if path.contains("file.jsonl")));
    }
}
