//! Module → model → record orchestration of an export run.
//!
//! The run loads the identifier catalog once and decides which record ids
//! belong to which module. Then, per module and per model, it fetches the
//! records with their included children, converts them, and merges every
//! artifact into the destination tree. A model whose retrieval or
//! conversion fails is logged and skipped. A file that cannot absorb its
//! artifact is logged and left alone. Configuration and I/O errors abort
//! the run.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{ExportConfig, ModelConfig, SchemaVersion};
use crate::contract::{RecordSource, Schema, SearchQuery};
use crate::convert::{converter_for, migration_script, ConvertContext};
use crate::domain::{in_term, not_in_term, parse_domain};
use crate::error::{ConfigError, ExportError, RetrievalError};
use crate::merge::{merge_content, target_path};
use crate::record::{relation_ids, Record};
use crate::registry::{IdentifierRegistry, ModuleDependencies, DEFAULT_MODULES, EXPORT_MODULE};
use crate::rename::Renamer;
use crate::scaffold;

/// Schema-definition model, the only one with a python representation.
const CLASS_MODEL: &str = "ir.model";

/// Selection rows hang off fields and never identify a parent on their own.
const SELECTION_MODEL: &str = "ir.model.fields.selection";

/// Field rows are kept whatever module owns them.
const FIELD_MODEL: &str = "ir.model.fields";

/// Run-wide settings that do not come from the YAML configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub destination: PathBuf,
    /// Modules to export; the default modules are always added.
    pub modules: Vec<String>,
    /// Produce a data-only module without python files.
    pub importable: bool,
    pub version: SchemaVersion,
    /// Rewrite legacy custom names into plain identifiers.
    pub migrate_code: bool,
}

impl ExportOptions {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            modules: Vec::new(),
            importable: false,
            version: SchemaVersion::default(),
            migrate_code: true,
        }
    }

    /// Requested modules plus the default ones, deduplicated and sorted.
    pub fn module_set(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .map(String::as_str)
            .chain(DEFAULT_MODULES)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub modules: Vec<ModuleReport>,
    pub skipped: Vec<SkippedModel>,
}

#[derive(Debug, Default)]
pub struct ModuleReport {
    pub module: String,
    pub records: usize,
    /// Files written or confirmed up to date.
    pub files: Vec<PathBuf>,
    /// Files left untouched because the merge failed.
    pub rejected: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SkippedModel {
    pub module: String,
    pub model: String,
    pub reason: String,
}

/// Record ids to export, per module then per model (in configuration order).
pub type Selection = BTreeMap<String, IndexMap<String, Vec<i64>>>;

/// Parsed domain of every configured model.
pub type Domains = HashMap<String, Vec<Value>>;

pub fn parse_domains(config: &ExportConfig) -> Result<Domains, ConfigError> {
    config
        .iter()
        .map(|(model, settings)| Ok((model.to_string(), parse_domain(&settings.domain)?)))
        .collect()
}

fn push_unique(ids: &mut Vec<i64>, extra: impl IntoIterator<Item = i64>) {
    for id in extra {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

pub async fn export<S>(source: &S, config: &ExportConfig, options: &ExportOptions) -> Result<ExportReport, ExportError>
where
    S: RecordSource + ?Sized,
{
    config.validate()?;
    let domains = parse_domains(config)?;
    let modules = options.module_set();
    info!(
        destination = %options.destination.display(),
        modules = ?modules,
        version = ?options.version,
        importable = options.importable,
        migrate_code = options.migrate_code,
        "[EXPORT] Starting export"
    );
    std::fs::create_dir_all(&options.destination).map_err(|e| ExportError::io(&options.destination, e))?;

    let catalog = source.identifiers().await.map_err(|e| {
        error!(error = ?e, "[EXPORT] Failed to load the identifier catalog");
        e
    })?;
    let catalog_models: BTreeSet<String> = catalog.iter().map(|entry| entry.model.clone()).collect();
    info!(entries = catalog.len(), "[EXPORT] Identifier catalog loaded");
    let registry = IdentifierRegistry::from_catalog(catalog, catalog_models.iter().map(String::as_str));
    let series = source.server_version().await?;

    let selection = select(source, config, &domains, &registry, &modules).await;
    let renamer = Renamer::new(options.migrate_code);
    let mut report = ExportReport::default();

    for (module, models) in &selection {
        let module_dir = options.destination.join(module);
        let mut deps = ModuleDependencies::new();
        let mut module_report = ModuleReport {
            module: module.clone(),
            ..ModuleReport::default()
        };
        info!(module = %module, path = %module_dir.display(), "[EXPORT] Exporting module");

        for (model, ids) in models {
            let Some(settings) = config.get(model) else {
                continue;
            };
            if !settings.export || ids.is_empty() {
                continue;
            }
            let job = ModelJob {
                fetcher: RecordFetcher {
                    source,
                    config,
                    domains: &domains,
                    registry: &registry,
                    module,
                },
                model,
                settings,
            };
            match job.run(ids, renamer, options, &series, &mut deps, &mut module_report).await {
                Ok(()) => {}
                Err(e @ (ExportError::Io { .. } | ExportError::Config(_))) => return Err(e),
                Err(e) => {
                    error!(module = %module, model = %model, error = %e, "[EXPORT] Skipping model");
                    report.skipped.push(SkippedModel {
                        module: module.clone(),
                        model: model.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if module_dir.exists() {
            scaffold::write_init_files(&module_dir, options.importable)?;
            scaffold::write_manifest(&module_dir, module, &series, &deps)?;
        }
        report.modules.push(module_report);
    }

    info!(
        modules = report.modules.len(),
        skipped = report.skipped.len(),
        "[EXPORT] Export finished"
    );
    Ok(report)
}

/// Decides the ids each module exports.
///
/// Catalogued records go to the module owning their identifier, when that
/// module is requested. Records matching a model's domain without any
/// identifier go to the synthetic export module. Finally, a parent whose
/// included children were selected is pulled into the children's module.
pub async fn select<S>(
    source: &S,
    config: &ExportConfig,
    domains: &Domains,
    registry: &IdentifierRegistry,
    modules: &BTreeSet<String>,
) -> Selection
where
    S: RecordSource + ?Sized,
{
    let empty_module = || -> IndexMap<String, Vec<i64>> {
        config.model_names().map(|model| (model.to_string(), Vec::new())).collect()
    };
    let mut selection: Selection = BTreeMap::new();

    for model in config.model_names() {
        for (module, ids) in registry.ids_by_module(model) {
            if !modules.contains(&module) {
                continue;
            }
            let models = selection.entry(module).or_insert_with(empty_module);
            if let Some(selected) = models.get_mut(model) {
                push_unique(selected, ids);
            }
        }
    }

    for model in config.model_names() {
        let mut domain = domains.get(model).cloned().unwrap_or_default();
        let known = registry.known_ids(model);
        if !known.is_empty() {
            domain.push(not_in_term("id", &known));
        }
        let query = SearchQuery {
            domain,
            fields: vec!["id".to_string()],
            order: None,
        };
        match source.search_read(model, &query).await {
            Ok(records) => {
                let ids: Vec<i64> = records.iter().filter_map(Record::id).collect();
                if ids.is_empty() {
                    continue;
                }
                debug!(model = %model, count = ids.len(), "[EXPORT] Records without identifier");
                let models = selection
                    .entry(EXPORT_MODULE.to_string())
                    .or_insert_with(empty_module);
                if let Some(selected) = models.get_mut(model) {
                    push_unique(selected, ids);
                }
            }
            Err(e) => error!(model = %model, error = ?e, "[EXPORT] Failed to load records"),
        }
    }
    let direct: usize = selection.values().flat_map(|m| m.values()).map(Vec::len).sum();
    info!(count = direct, "[EXPORT] Records to export");

    for (module, models) in selection.iter_mut() {
        for (model, settings) in config.iter() {
            for (child_model, include) in &settings.includes {
                if child_model == SELECTION_MODEL || include.inverse_name.is_empty() {
                    continue;
                }
                let Some(child_ids) = models.get(child_model).filter(|ids| !ids.is_empty()) else {
                    continue;
                };
                let query = SearchQuery {
                    domain: vec![in_term("id", child_ids)],
                    fields: vec![include.inverse_name.clone()],
                    order: None,
                };
                match source.search_read(child_model, &query).await {
                    Ok(children) => {
                        let parents: Vec<i64> = children
                            .iter()
                            .filter_map(|child| child.get(&include.inverse_name))
                            .flat_map(relation_ids)
                            .collect();
                        if let Some(selected) = models.get_mut(model) {
                            push_unique(selected, parents);
                        }
                    }
                    Err(e) => {
                        error!(module = %module, model = %child_model, error = ?e, "[EXPORT] Failed to load parents of included records")
                    }
                }
            }
        }
    }
    let total: usize = selection.values().flat_map(|m| m.values()).map(Vec::len).sum();
    info!(count = total.saturating_sub(direct), "[EXPORT] Orphan records to export");

    selection
}

type RecordsFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Record>, RetrievalError>> + Send + 'a>>;

/// Everything record retrieval needs while exporting one module.
pub struct RecordFetcher<'a, S: ?Sized> {
    pub source: &'a S,
    pub config: &'a ExportConfig,
    pub domains: &'a Domains,
    pub registry: &'a IdentifierRegistry,
    pub module: &'a str,
}

impl<S> RecordFetcher<'_, S>
where
    S: RecordSource + ?Sized,
{
    /// Fetches records of `model` whose `key` is among `ids`, filtered by
    /// the model's domain, with configured includes attached as children.
    ///
    /// Included rows linked by something other than their id are restricted
    /// to those whose identifier belongs to the module, unless none does.
    /// Field rows are never restricted.
    pub fn get_records<'b>(&'b self, model: &'b str, ids: &'b [i64], key: &'b str) -> RecordsFuture<'b> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let default_settings = ModelConfig::default();
            let settings = self.config.get(model).unwrap_or(&default_settings);
            let mut domain = self.domains.get(model).cloned().unwrap_or_default();
            domain.push(in_term(key, ids));
            let query = SearchQuery {
                domain,
                fields: settings.fields.clone(),
                order: settings.order.clone(),
            };
            let mut records = self.source.search_read(model, &query).await?;

            for (child_model, include) in &settings.includes {
                let mut link_ids = Vec::new();
                for record in &records {
                    push_unique(&mut link_ids, record.get(&include.field).map(relation_ids).unwrap_or_default());
                }
                let children = match self.get_records(child_model, &link_ids, &include.inverse_name).await {
                    Ok(children) => children,
                    Err(e) => {
                        warn!(model = %child_model, error = ?e, "[EXPORT] Failed to load included records");
                        Vec::new()
                    }
                };
                self.attach(&mut records, child_model, &include.field, &include.inverse_name, children);
            }
            Ok(records)
        })
    }

    fn attach(&self, records: &mut [Record], child_model: &str, field: &str, inverse_name: &str, children: Vec<Record>) {
        let same_module: HashSet<i64> = if inverse_name != "id" {
            children
                .iter()
                .filter_map(Record::id)
                .filter(|id| {
                    self.registry
                        .lookup(child_model, *id)
                        .is_some_and(|entry| entry.module == self.module)
                })
                .collect()
        } else {
            HashSet::new()
        };

        let mut by_parent: HashMap<i64, Vec<Record>> = HashMap::new();
        for child in children {
            let keep = child_model == FIELD_MODEL
                || same_module.is_empty()
                || child.id().is_some_and(|id| same_module.contains(&id));
            if !keep {
                continue;
            }
            for parent in child.get(inverse_name).map(relation_ids).unwrap_or_default() {
                by_parent.entry(parent).or_default().push(child.clone());
            }
        }

        for record in records.iter_mut() {
            let links = record.get(field).map(relation_ids).unwrap_or_default();
            let attached: Vec<Record> = links
                .iter()
                .filter_map(|link| by_parent.get(link))
                .flatten()
                .cloned()
                .collect();
            if !attached.is_empty() {
                record.children.insert(child_model.to_string(), attached);
            }
        }
    }
}

/// One model of one module.
struct ModelJob<'a, S: ?Sized> {
    fetcher: RecordFetcher<'a, S>,
    model: &'a str,
    settings: &'a ModelConfig,
}

impl<S> ModelJob<'_, S>
where
    S: RecordSource + ?Sized,
{
    async fn schema(&self) -> Result<Schema, RetrievalError> {
        let source = self.fetcher.source;
        let fields = source.fields_get(self.model).await?;
        let names: Vec<String> = fields.keys().cloned().collect();
        let defaults = source.default_get(self.model, &names).await?;
        Ok(Schema { fields, defaults })
    }

    async fn run(
        &self,
        ids: &[i64],
        renamer: Renamer,
        options: &ExportOptions,
        series: &str,
        deps: &mut ModuleDependencies,
        report: &mut ModuleReport,
    ) -> Result<(), ExportError> {
        let module = self.fetcher.module;
        debug!(model = %self.model, count = ids.len(), "[EXPORT] Fetching records");
        let records = self.fetcher.get_records(self.model, ids, "id").await?;
        if records.is_empty() {
            debug!(module = %module, model = %self.model, "[EXPORT] Nothing to export");
            return Ok(());
        }
        let snapshot = (self.model == CLASS_MODEL).then(|| records.clone());
        let count = records.len();
        let schema = self.schema().await?;

        let mut ctx = ConvertContext {
            registry: self.fetcher.registry,
            renamer,
            version: options.version,
            module,
            deps,
        };
        let converted = converter_for(self.settings.format).convert(&mut ctx, self.model, records, &schema, self.settings)?;

        for item in converted {
            let path = target_path(&options.destination, module, self.settings, &item.record);
            let existing = scaffold::read_existing(&path)?;
            match merge_content(self.settings.format, &path, existing.as_deref(), &item.artifact, &item.record) {
                Ok(content) => {
                    if existing.as_deref() != Some(content.as_str()) {
                        scaffold::write_file(&path, &content)?;
                    } else {
                        debug!(file = %path.display(), "[EXPORT] File already up to date");
                    }
                    if !report.files.contains(&path) {
                        report.files.push(path);
                    }
                }
                Err(e) => {
                    error!(file = %e.file.display(), reason = %e.reason, "[MERGE] Leaving file untouched");
                    debug!(payload = %e.payload, "[MERGE] Rejected payload");
                    report.rejected.push(path);
                }
            }
        }
        report.records += count;
        info!(module = %module, model = %self.model, records = count, "[EXPORT] Exported records");

        if let Some(snapshot) = snapshot {
            if let Some(script) = migration_script(&snapshot, renamer, self.settings) {
                let path = scaffold::write_migration_script(&options.destination, module, series, &script)?;
                report.files.push(path);
            }
        }
        Ok(())
    }
}

