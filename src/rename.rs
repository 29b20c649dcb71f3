//! Rewriting of legacy custom names (`x_foo`, `x_studio_foo`) into plain
//! python identifiers.

use serde_json::Value;

use crate::record::Record;
use crate::registry::IdentifierEntry;

const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Strips every `x_` / `x_studio_` prefix found at the start of `name` or
/// right after a non-alphanumeric character, then escapes python keywords
/// with a leading underscore.
///
/// `rename_field_base(rename_field_base(x)) == rename_field_base(x)`.
pub fn rename_field_base(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        let boundary = i == 0 || !chars[i - 1].is_alphanumeric();
        if boundary && chars[i] == 'x' && chars.get(i + 1) == Some(&'_') {
            i += 2;
            if starts_with(&chars[i..], "studio_") {
                i += "studio_".len();
            }
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    if PYTHON_KEYWORDS.contains(&out.as_str()) {
        out.insert(0, '_');
    }
    out
}

fn starts_with(chars: &[char], prefix: &str) -> bool {
    prefix.chars().enumerate().all(|(i, c)| chars.get(i) == Some(&c))
}

/// Applies [`rename_field_base`] to records, unless migration of custom
/// names is turned off for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renamer {
    enabled: bool,
}

impl Default for Renamer {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Renamer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn rename(&self, name: &str) -> String {
        if self.enabled {
            rename_field_base(name)
        } else {
            name.to_string()
        }
    }

    /// Renames the string values stored under `keys`, then the same keys of
    /// the children listed in `cascade` (one level deep).
    pub fn rename_record(&self, record: &mut Record, keys: &[&str], cascade: &[String]) {
        if !self.enabled {
            return;
        }
        for key in keys {
            if let Some(Value::String(value)) = record.fields.get_mut(*key) {
                if !value.is_empty() {
                    *value = rename_field_base(value);
                }
            }
        }
        for model in cascade {
            if let Some(children) = record.children.get_mut(model) {
                for child in children.iter_mut() {
                    self.rename_record(child, keys, &[]);
                }
            }
        }
    }

    pub fn rename_records(&self, records: &mut [Record], keys: &[&str], cascade: &[String]) {
        for record in records {
            self.rename_record(record, keys, cascade);
        }
    }

    pub fn rename_identifier(&self, entry: &mut IdentifierEntry) {
        if !self.enabled {
            return;
        }
        entry.name = rename_field_base(&entry.name);
        entry.module = rename_field_base(&entry.module);
    }
}
