//! Records as returned by the remote store, plus the value helpers every
//! converter needs.

use indexmap::IndexMap;
use serde_json::Value;

/// One row of a model: ordered field values plus the child rows attached
/// through configured include relations, keyed by child model name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: IndexMap<String, Value>,
    pub children: IndexMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(fields: IndexMap<String, Value>) -> Self {
        Self {
            fields,
            children: IndexMap::new(),
        }
    }

    /// Builds a record from a JSON object; anything else yields an empty record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map.into_iter().collect()),
            _ => Self::default(),
        }
    }

    pub fn with_children(mut self, model: impl Into<String>, children: Vec<Record>) -> Self {
        self.children.insert(model.into(), children);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.fields.get("id").and_then(Value::as_i64)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Non-empty string value of `field`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn flag(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(is_truthy)
    }

    pub fn children(&self, model: &str) -> &[Record] {
        self.children.get(model).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Python truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Target id of a many2one value: either a bare id or the `[id, display_name]`
/// pair the store returns.
pub fn relation_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Array(items) => items.first().and_then(Value::as_i64),
        _ => None,
    }
}

/// Target ids of any relational value.
pub fn relation_ids(value: &Value) -> Vec<i64> {
    match value {
        Value::Number(n) => n.as_i64().into_iter().collect(),
        Value::Array(items) if items.len() == 2 && items[1].is_string() => {
            items[0].as_i64().into_iter().collect()
        }
        Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
        _ => Vec::new(),
    }
}

/// Renders a value the way Python's `str()` would.
pub fn python_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => python_repr(other),
    }
}

fn python_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.is_finite() => format!("{f:.1}"),
            _ => n.to_string(),
        },
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", python_repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
