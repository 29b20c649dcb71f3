//! # contract: the remote store as seen by the exporter
//!
//! The pipeline never talks to a server directly. It goes through
//! [`RecordSource`], which bundles the three interfaces an export needs:
//!
//! - record retrieval (`search_read`)
//! - schema introspection (`fields_get`, `default_get`)
//! - the identifier catalog (`identifiers`)
//!
//! [`crate::rpc::JsonRpcSource`] is the production implementation. Tests use
//! the `mockall`-generated `MockRecordSource`, available under `cfg(test)` or
//! the default `test-export-mocks` feature.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::RetrievalError;
use crate::record::Record;
pub use crate::registry::IdentifierEntry;

/// Arguments of a `search_read` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Domain filter, already decoded into JSON terms.
    pub domain: Vec<Value>,
    /// Fields to read; empty means all fields.
    pub fields: Vec<String>,
    pub order: Option<String>,
}

/// Type tag of a field as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum FieldType {
    Boolean,
    #[default]
    Char,
    Text,
    Html,
    Integer,
    Float,
    Selection,
    Many2one,
    One2many,
    Many2many,
    Other(String),
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "boolean" => Self::Boolean,
            "char" => Self::Char,
            "text" => Self::Text,
            "html" => Self::Html,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "selection" => Self::Selection,
            "many2one" => Self::Many2one,
            "one2many" => Self::One2many,
            "many2many" => Self::Many2many,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl FieldType {
    pub fn is_x2many(&self) -> bool {
        matches!(self, Self::One2many | Self::Many2many)
    }
}

/// Per-field metadata from `fields_get`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default, rename = "string")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default = "stored_by_default")]
    pub store: bool,
    #[serde(default, deserialize_with = "related_path")]
    pub related: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
}

fn stored_by_default() -> bool {
    true
}

fn related_path<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(path) if !path.is_empty() => Some(path),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("."))
        }
        _ => None,
    })
}

impl FieldDescriptor {
    pub fn new(kind: impl Into<FieldType>) -> Self {
        Self {
            kind: kind.into(),
            relation: None,
            description: None,
            required: false,
            readonly: false,
            store: true,
            related: None,
            depends: Vec::new(),
        }
    }

    pub fn with_relation(mut self, model: impl Into<String>) -> Self {
        self.relation = Some(model.into());
        self
    }

    pub fn is_computed(&self) -> bool {
        !self.depends.is_empty()
    }
}

/// Field descriptors and default values of one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: IndexMap<String, FieldDescriptor>,
    pub defaults: IndexMap<String, Value>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }
}

/// Everything the exporter reads from the remote store.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Ordered records of `model` matching the query.
    async fn search_read(
        &self,
        model: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Record>, RetrievalError>;

    async fn fields_get(
        &self,
        model: &str,
    ) -> Result<IndexMap<String, FieldDescriptor>, RetrievalError>;

    async fn default_get(
        &self,
        model: &str,
        fields: &[String],
    ) -> Result<IndexMap<String, Value>, RetrievalError>;

    /// The full identifier catalog (`ir.model.data`).
    async fn identifiers(&self) -> Result<Vec<IdentifierEntry>, RetrievalError>;

    /// Server series such as `17.0`.
    async fn server_version(&self) -> Result<String, RetrievalError>;
}
