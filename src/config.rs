// odoo-export/src/config.rs

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Output representation of a model, and thereby its converter and merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Python model classes.
    Py,
    /// XML data records.
    #[default]
    Xml,
    /// CSV data rows.
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Py => "py",
            OutputFormat::Xml => "xml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "py" => Ok(OutputFormat::Py),
            "xml" => Ok(OutputFormat::Xml),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// How child rows of another model are nested under a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    /// Field of the parent holding the link value(s).
    #[serde(default = "default_link_field")]
    pub field: String,
    /// Field of the child pointing back at the parent.
    pub inverse_name: String,
}

fn default_link_field() -> String {
    "id".to_string()
}

/// Export settings of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Domain filter as a python literal, e.g. `[('state', '=', 'manual')]`.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Fields to read, in output order. Empty reads every field.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub format: OutputFormat,
    /// Dash-separated key path into the record naming its file.
    #[serde(default)]
    pub file_name_field: String,
    #[serde(default)]
    pub sub_folder: String,
    #[serde(default)]
    pub includes: IndexMap<String, Include>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default = "enabled")]
    pub export: bool,
}

fn default_domain() -> String {
    "[]".to_string()
}

fn enabled() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            fields: Vec::new(),
            format: OutputFormat::default(),
            file_name_field: String::new(),
            sub_folder: String::new(),
            includes: IndexMap::new(),
            priority: None,
            order: None,
            export: true,
        }
    }
}

impl ModelConfig {
    /// Child models that renaming cascades into.
    pub fn include_models(&self) -> Vec<String> {
        self.includes.keys().cloned().collect()
    }
}

/// Per-model settings of a run, ordered by priority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportConfig {
    models: Vec<(String, ModelConfig)>,
}

impl ExportConfig {
    /// Orders models by ascending priority; models without one come last,
    /// ties keep their declaration order.
    pub fn new(models: impl IntoIterator<Item = (String, ModelConfig)>) -> Self {
        let mut models: Vec<(String, ModelConfig)> = models.into_iter().collect();
        models.sort_by_key(|(_, config)| config.priority.unwrap_or(i64::MAX));
        Self { models }
    }

    pub fn get(&self, model: &str) -> Option<&ModelConfig> {
        self.models
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, config)| config)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelConfig)> {
        self.models.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Restricts the run to a single ad-hoc model: every other model is
    /// disabled, and a model missing from the configuration is added with
    /// the given domain and fields, which are then mandatory.
    pub fn restrict_to(&mut self, request: &AdHocModel) -> Result<(), ConfigError> {
        for (name, config) in self.models.iter_mut() {
            if name != &request.model {
                config.export = false;
            }
        }

        match self.models.iter_mut().find(|(name, _)| name == &request.model) {
            Some((_, config)) => {
                config.export = true;
                if let Some(domain) = &request.domain {
                    config.domain = domain.clone();
                }
                if !request.fields.is_empty() {
                    config.fields = request.fields.clone();
                }
                if let Some(format) = request.format {
                    config.format = format;
                }
            }
            None => {
                if request.fields.is_empty() {
                    return Err(ConfigError::MissingFields(request.model.clone()));
                }
                let config = ModelConfig {
                    domain: request.domain.clone().unwrap_or_else(default_domain),
                    fields: request.fields.clone(),
                    format: request.format.unwrap_or_default(),
                    file_name_field: request.model.replace('.', "_"),
                    ..ModelConfig::default()
                };
                info!(model = %request.model, "Added ad-hoc model to export config");
                self.models.push((request.model.clone(), config));
            }
        }
        Ok(())
    }

    /// Rejects combinations no converter can handle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (model, config) in self.iter() {
            if config.format == OutputFormat::Py && model != "ir.model" {
                return Err(ConfigError::UnsupportedClassModel(model.to_string()));
            }
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(models = self.models.len(), "Loaded export config");
        for (model, config) in self.iter() {
            debug!(
                model = %model,
                format = %config.format,
                export = config.export,
                priority = ?config.priority,
                "Model export settings"
            );
        }
    }
}

/// Where the remote store lives and who to log in as. The password never
/// comes from the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    #[serde(skip)]
    pub password: String,
}

/// Single model requested from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdHocModel {
    pub model: String,
    pub domain: Option<String>,
    pub fields: Vec<String>,
    pub format: Option<OutputFormat>,
}

/// Target schema version; decides between link-command syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    /// Stand-in for the development branch, newer than any release.
    pub const MASTER: SchemaVersion = SchemaVersion {
        major: u32::MAX,
        minor: 0,
    };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether `Command.link(...)` is available instead of `(4, ...)`.
    pub fn has_link_commands(&self) -> bool {
        self.major >= 14
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::MASTER
    }
}

impl FromStr for SchemaVersion {
    type Err = ConfigError;

    /// Accepts `17.0`, `16`, `saas~17.2`, `saas-17.2` and `master`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "master" {
            return Ok(Self::MASTER);
        }
        let numeric = trimmed
            .trim_start_matches("saas")
            .trim_start_matches(['~', '-']);
        let mut parts = numeric.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| ConfigError::Version(s.to_string()))?;
        let minor = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| ConfigError::Version(s.to_string()))?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versions() {
        assert_eq!("17.0".parse::<SchemaVersion>().unwrap(), SchemaVersion::new(17, 0));
        assert_eq!("saas~16.3".parse::<SchemaVersion>().unwrap(), SchemaVersion::new(16, 3));
        assert_eq!("13".parse::<SchemaVersion>().unwrap(), SchemaVersion::new(13, 0));
        assert!("master".parse::<SchemaVersion>().unwrap().has_link_commands());
        assert!("banana".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn priority_orders_models_and_missing_priority_goes_last() {
        let config = ExportConfig::new(vec![
            ("b".to_string(), ModelConfig::default()),
            ("a".to_string(), ModelConfig { priority: Some(2), ..ModelConfig::default() }),
            ("c".to_string(), ModelConfig { priority: Some(1), ..ModelConfig::default() }),
        ]);
        let names: Vec<&str> = config.model_names().collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
