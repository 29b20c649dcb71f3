#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use odoo_export::contract::{FieldDescriptor, Schema, SearchQuery};
use odoo_export::record::{relation_ids, Record};
use odoo_export::registry::IdentifierEntry;

pub fn record(value: Value) -> Record {
    Record::from_json(value)
}

pub fn entry(module: &str, name: &str, model: &str, res_id: i64, noupdate: bool) -> IdentifierEntry {
    IdentifierEntry {
        module: module.to_string(),
        name: name.to_string(),
        model: model.to_string(),
        res_id,
        noupdate,
    }
}

/// Schema from `(field, type, relation)` triples and default values.
pub fn schema(fields: &[(&str, &str, Option<&str>)], defaults: &[(&str, Value)]) -> Schema {
    let fields = fields
        .iter()
        .map(|(name, kind, relation)| {
            let mut descriptor = FieldDescriptor::new(*kind);
            if let Some(relation) = relation {
                descriptor = descriptor.with_relation(*relation);
            }
            (name.to_string(), descriptor)
        })
        .collect();
    let defaults = defaults
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect::<IndexMap<_, _>>();
    Schema { fields, defaults }
}

/// Ids of an `("id", "in", ids)` term in `query`, if any.
pub fn requested_ids(query: &SearchQuery) -> Option<Vec<i64>> {
    query.domain.iter().find_map(|term| match term.as_array() {
        Some(parts) if parts.len() == 3 && parts[0] == "id" && parts[1] == "in" => Some(relation_ids(&parts[2])),
        _ => None,
    })
}

/// Every file under `root` with its content, keyed by relative path.
pub fn snapshot(root: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).expect("readable dir") {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(relative, fs::read_to_string(&path).expect("utf-8 file"));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}
