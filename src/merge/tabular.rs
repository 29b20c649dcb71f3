use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::debug;

use super::Merger;
use crate::convert::Artifact;
use crate::error::MergeError;
use crate::record::Record;

/// Appends generated rows to an existing file under the same header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularMerger;

fn read_rows(text: &str) -> Result<Vec<StringRecord>, csv::Error> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
        .records()
        .collect()
}

/// Identity of a row: its first cell when that column is `id`, the whole
/// row otherwise.
fn row_key(header: &StringRecord, row: &StringRecord) -> Vec<String> {
    if header.get(0) == Some("id") {
        row.get(0).map(str::to_string).into_iter().collect()
    } else {
        row.iter().map(str::to_string).collect()
    }
}

impl Merger for TabularMerger {
    fn merge(
        &self,
        path: &Path,
        existing: &str,
        artifact: &Artifact,
        _record: &Record,
    ) -> Result<String, MergeError> {
        let Artifact::Tabular(payload) = artifact else {
            return Err(MergeError::new(path, artifact.render(), "expected a tabular artifact"));
        };
        let fail = |reason: String| MergeError::new(path, payload.as_str(), reason);

        let current = read_rows(existing).map_err(|e| fail(e.to_string()))?;
        let incoming = read_rows(payload).map_err(|e| fail(e.to_string()))?;
        let (Some(header), Some(incoming_header)) = (current.first(), incoming.first()) else {
            return Ok(if current.is_empty() {
                payload.clone()
            } else {
                existing.to_string()
            });
        };
        if header != incoming_header {
            return Err(fail(format!(
                "header mismatch: file has {:?}, generated rows have {:?}",
                header.iter().collect::<Vec<_>>(),
                incoming_header.iter().collect::<Vec<_>>()
            )));
        }

        let mut seen: HashSet<Vec<String>> = current[1..].iter().map(|row| row_key(header, row)).collect();
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(Vec::new());
        for row in &current {
            writer.write_record(row).map_err(|e| fail(e.to_string()))?;
        }
        let mut added = 0usize;
        for row in &incoming[1..] {
            if seen.insert(row_key(header, row)) {
                writer.write_record(row).map_err(|e| fail(e.to_string()))?;
                added += 1;
            }
        }
        debug!(file = %path.display(), added, "[MERGE] Appended rows");

        let bytes = writer.into_inner().map_err(|e| fail(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| fail(e.to_string()))
    }
}
