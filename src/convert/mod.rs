//! Record-to-artifact converters, one per [`OutputFormat`].

mod class;
mod markup;
mod tabular;

pub use class::{migration_script, ClassConverter, CLASS_KEYS};
pub use markup::{MarkupConverter, MARKUP_KEYS};
pub use tabular::{TabularConverter, TABULAR_KEYS};

use indexmap::IndexMap;

use crate::config::{ModelConfig, OutputFormat, SchemaVersion};
use crate::contract::Schema;
use crate::error::ConvertError;
use crate::record::Record;
use crate::registry::{IdentifierEntry, IdentifierRegistry, ModuleDependencies};
use crate::rename::Renamer;

/// Python source split in the four fragments the class merger splices
/// separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassArtifact {
    pub imports: String,
    pub header: String,
    /// Field statements, indented to class-body level.
    pub fields: String,
    /// Computed-method stubs, indented to class-body level.
    pub computes: String,
}

impl ClassArtifact {
    /// The artifact as the content of a new file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.imports.trim().is_empty() {
            out.push_str(self.imports.trim_end());
            out.push_str("\n\n\n");
        }
        out.push_str(self.header.trim_end());
        out.push('\n');
        for part in [&self.fields, &self.computes] {
            if !part.trim().is_empty() {
                out.push('\n');
                out.push_str(part.trim_end());
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Class(ClassArtifact),
    Markup(String),
    Tabular(String),
}

impl Artifact {
    /// Text written when the destination file does not exist yet.
    pub fn render(&self) -> String {
        match self {
            Artifact::Class(class) => class.render(),
            Artifact::Markup(text) | Artifact::Tabular(text) => text.clone(),
        }
    }
}

/// A record together with the artifact generated for it. The record carries
/// the renamed values, which drive file naming.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub record: Record,
    pub artifact: Artifact,
}

/// Everything a converter needs besides the records themselves.
pub struct ConvertContext<'a> {
    pub registry: &'a IdentifierRegistry,
    pub renamer: Renamer,
    pub version: SchemaVersion,
    /// Module currently being exported.
    pub module: &'a str,
    pub deps: &'a mut ModuleDependencies,
}

impl ConvertContext<'_> {
    /// Resolves and renames the identifiers of `ids`, in input order.
    pub fn identifiers(&mut self, model: &str, ids: &[i64]) -> IndexMap<i64, IdentifierEntry> {
        let mut resolved = self.registry.resolve(model, ids, self.deps);
        for entry in resolved.values_mut() {
            self.renamer.rename_identifier(entry);
        }
        resolved
    }

    pub fn identifier(&mut self, model: &str, id: i64) -> IdentifierEntry {
        self.identifiers(model, &[id])
            .swap_remove(&id)
            .unwrap_or_else(|| IdentifierEntry::synthesized(model, id))
    }

    /// Identifier of `model`/`id` as written from the current module.
    pub fn reference(&mut self, model: &str, id: i64) -> String {
        let module = self.module;
        self.identifier(model, id).reference(module)
    }

    pub fn references(&mut self, model: &str, ids: &[i64]) -> Vec<String> {
        let module = self.module;
        self.identifiers(model, ids)
            .values()
            .map(|entry| entry.reference(module))
            .collect()
    }
}

pub trait Converter {
    /// Turns a batch of records of `model` into artifacts.
    fn convert(
        &self,
        ctx: &mut ConvertContext<'_>,
        model: &str,
        records: Vec<Record>,
        schema: &Schema,
        config: &ModelConfig,
    ) -> Result<Vec<Converted>, ConvertError>;
}

/// Converter handling `format`.
pub fn converter_for(format: OutputFormat) -> &'static dyn Converter {
    match format {
        OutputFormat::Py => &ClassConverter,
        OutputFormat::Xml => &MarkupConverter,
        OutputFormat::Csv => &TabularConverter,
    }
}
