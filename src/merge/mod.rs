//! Splicing generated artifacts into files that already exist.
//!
//! A new file receives the artifact verbatim. An existing file goes through
//! the merger of its format, which must never duplicate a record already in
//! the file and must leave unrelated content alone, so that re-running an
//! export over its own output converges.

mod class;
mod markup;
mod tabular;

pub use class::ClassMerger;
pub use markup::MarkupMerger;
pub use tabular::TabularMerger;

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::{ModelConfig, OutputFormat};
use crate::convert::Artifact;
use crate::error::MergeError;
use crate::record::{is_truthy, python_str, Record};

pub trait Merger {
    /// Combines `existing` file content (read from `path`) with `artifact`.
    fn merge(
        &self,
        path: &Path,
        existing: &str,
        artifact: &Artifact,
        record: &Record,
    ) -> Result<String, MergeError>;
}

/// Merger handling `format`.
pub fn merger_for(format: OutputFormat) -> &'static dyn Merger {
    match format {
        OutputFormat::Py => &ClassMerger,
        OutputFormat::Xml => &MarkupMerger,
        OutputFormat::Csv => &TabularMerger,
    }
}

/// Final content of `path`: the artifact itself for a new file, the merge
/// result otherwise.
pub fn merge_content(
    format: OutputFormat,
    path: &Path,
    existing: Option<&str>,
    artifact: &Artifact,
    record: &Record,
) -> Result<String, MergeError> {
    match existing {
        None => Ok(artifact.render()),
        Some(existing) if existing.trim().is_empty() => Ok(artifact.render()),
        Some(existing) => {
            debug!(file = %path.display(), "[MERGE] Merging into existing file");
            merger_for(format).merge(path, existing, artifact, record)
        }
    }
}

/// `<destination>/<module>/<sub_folder>/<name>.<ext>` for `record`.
pub fn target_path(destination: &Path, module: &str, config: &ModelConfig, record: &Record) -> PathBuf {
    let mut path = destination.join(module);
    if !config.sub_folder.is_empty() {
        path.push(&config.sub_folder);
    }
    path.push(format!(
        "{}.{}",
        file_base_name(&config.file_name_field, record),
        config.format.extension()
    ));
    path
}

#[derive(Clone, Copy)]
enum Cursor<'a> {
    Record(&'a Record),
    Records(&'a [Record]),
    Value(&'a Value),
}

/// Walks the dash-separated key path `template` into `record` and returns
/// the first non-empty scalar found, or the template itself, normalized
/// into a file name.
pub fn file_base_name(template: &str, record: &Record) -> String {
    let mut cursor = Cursor::Record(record);
    let mut name: Option<String> = None;

    for key in template.split('-') {
        let next = match cursor {
            Cursor::Record(record) => match record.fields.get(key) {
                Some(value) => Some(Cursor::Value(value)),
                None => record.children.get(key).map(|c| Cursor::Records(c.as_slice())),
            },
            Cursor::Records(records) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| records.get(i))
                .map(Cursor::Record),
            Cursor::Value(Value::Array(items)) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .filter(|item| is_truthy(item))
                .map(Cursor::Value),
            Cursor::Value(Value::Object(map)) => map.get(key).map(Cursor::Value),
            Cursor::Value(_) => None,
        };
        match next {
            Some(Cursor::Value(value @ (Value::String(_) | Value::Bool(_) | Value::Number(_)))) => {
                if is_truthy(value) {
                    name = Some(python_str(value));
                    break;
                }
            }
            Some(next) => cursor = next,
            None => {}
        }
    }

    normalize_file_name(name.as_deref().unwrap_or(template))
}

fn normalize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '.' || c == '/' || c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_json(value)
    }

    #[test]
    fn walks_into_many2one_pairs() {
        let partner = record(json!({"id": 1, "model_id": [4, "Sale Order"]}));
        assert_eq!(file_base_name("model_id-1", &partner), "sale_order");
    }

    #[test]
    fn walks_into_children() {
        let model = record(json!({"id": 1})).with_children(
            "ir.model.fields",
            vec![record(json!({"name": "x_studio_code", "model": "res.partner"}))],
        );
        assert_eq!(file_base_name("ir.model.fields-0-model", &model), "res_partner");
    }

    #[test]
    fn falls_back_to_template() {
        let empty = record(json!({"id": 1, "name": false}));
        assert_eq!(file_base_name("res.partner", &empty), "res_partner");
        assert_eq!(file_base_name("name", &empty), "name");
    }

    #[test]
    fn normalizes_separators() {
        let view = record(json!({"name": "Sale Order/Form View"}));
        assert_eq!(file_base_name("name", &view), "sale_order_form_view");
    }
}
