//! Resolution of numeric record ids into stable `module.name` identifiers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Module that owns every identifier synthesized during an export.
pub const EXPORT_MODULE: &str = "__export_module__";

/// Modules exported on every run, on top of the ones requested.
pub const DEFAULT_MODULES: [&str; 2] = [EXPORT_MODULE, "studio_customization"];

/// One row of the identifier catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierEntry {
    pub module: String,
    pub name: String,
    pub model: String,
    pub res_id: i64,
    #[serde(default)]
    pub noupdate: bool,
}

impl IdentifierEntry {
    /// Placeholder identifier for a record the catalog does not know.
    pub fn synthesized(model: &str, res_id: i64) -> Self {
        Self {
            module: EXPORT_MODULE.to_string(),
            name: format!("{}_{res_id}", model.replace('.', "_")),
            model: model.to_string(),
            res_id,
            noupdate: false,
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Reference as written from inside `current_module`: the module prefix
    /// is dropped for identifiers the module owns itself.
    pub fn reference(&self, current_module: &str) -> String {
        if self.module == current_module {
            self.name.clone()
        } else {
            self.qualified()
        }
    }
}

/// Modules referenced while exporting one module; feeds the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDependencies {
    modules: BTreeSet<String>,
}

impl ModuleDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, module: &str) {
        if !self.modules.contains(module) {
            self.modules.insert(module.to_string());
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    /// `depends` list for the manifest of `module`.
    pub fn manifest_depends(&self, module: &str) -> Vec<String> {
        let depends: Vec<String> = self
            .modules
            .iter()
            .filter(|m| m.as_str() != "base" && m.as_str() != module)
            .cloned()
            .collect();
        if depends.is_empty() {
            vec!["base".to_string()]
        } else {
            depends
        }
    }
}

/// Identifier catalog indexed by `(model, res_id)`.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    by_model: HashMap<String, BTreeMap<i64, IdentifierEntry>>,
}

impl IdentifierRegistry {
    /// Builds the registry from catalog rows, keeping only `models`.
    /// Later rows for the same `(model, res_id)` replace earlier ones.
    pub fn from_catalog<'a>(
        catalog: impl IntoIterator<Item = IdentifierEntry>,
        models: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let wanted: BTreeSet<&str> = models.into_iter().collect();
        let mut by_model: HashMap<String, BTreeMap<i64, IdentifierEntry>> = HashMap::new();
        let mut kept = 0usize;
        for entry in catalog {
            if !wanted.contains(entry.model.as_str()) {
                continue;
            }
            kept += 1;
            by_model
                .entry(entry.model.clone())
                .or_default()
                .insert(entry.res_id, entry);
        }
        debug!(entries = kept, models = wanted.len(), "[REGISTRY] Catalog indexed");
        Self { by_model }
    }

    /// Resolves `ids` of `model`, reusing catalog entries unchanged and
    /// synthesizing the missing ones. Every owning module is recorded in
    /// `deps`.
    pub fn resolve(
        &self,
        model: &str,
        ids: &[i64],
        deps: &mut ModuleDependencies,
    ) -> IndexMap<i64, IdentifierEntry> {
        let known = self.by_model.get(model);
        let mut resolved = IndexMap::with_capacity(ids.len());
        for &id in ids {
            let entry = known
                .and_then(|entries| entries.get(&id))
                .cloned()
                .unwrap_or_else(|| IdentifierEntry::synthesized(model, id));
            deps.record(&entry.module);
            resolved.insert(id, entry);
        }
        resolved
    }

    pub fn resolve_one(
        &self,
        model: &str,
        id: i64,
        deps: &mut ModuleDependencies,
    ) -> IdentifierEntry {
        self.resolve(model, &[id], deps)
            .swap_remove(&id)
            .unwrap_or_else(|| IdentifierEntry::synthesized(model, id))
    }

    pub fn lookup(&self, model: &str, id: i64) -> Option<&IdentifierEntry> {
        self.by_model.get(model).and_then(|entries| entries.get(&id))
    }

    /// Every catalogued id of `model`.
    pub fn known_ids(&self, model: &str) -> Vec<i64> {
        self.by_model
            .get(model)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Catalogued ids of `model` grouped by owning module.
    pub fn ids_by_module(&self, model: &str) -> BTreeMap<String, Vec<i64>> {
        let mut grouped: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        if let Some(entries) = self.by_model.get(model) {
            for entry in entries.values() {
                grouped.entry(entry.module.clone()).or_default().push(entry.res_id);
            }
        }
        grouped
    }
}
