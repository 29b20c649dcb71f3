use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{error, info};

use crate::config::{ConnectionConfig, ExportConfig, ModelConfig};
use crate::error::ConfigError;

/// Configuration used when no `--config` file is given.
pub const DEFAULT_CONFIG: &str = include_str!("../config/export.yaml");

/// Environment variable holding the password of the connection user.
pub const PASSWORD_ENV: &str = "ODOO_PASSWORD";

#[derive(Deserialize)]
struct StaticConfig {
    connection: ConnectionConfig,
    models: Mapping,
    /// Per-model overrides applied on top of `models` for importable exports.
    #[serde(default)]
    importable: Mapping,
}

/// Everything read from the YAML file plus the secrets from the environment.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub connection: ConnectionConfig,
    pub export: ExportConfig,
}

/// Loads a static YAML config file (no secrets) and injects the password
/// from the environment.
pub fn load_config<P: AsRef<Path>>(path: P, importable: bool) -> Result<LoadedConfig, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(ConfigError::Read {
                path: path_ref.to_path_buf(),
                source: e,
            });
        }
    };
    parse_config(&config_content, importable)
}

/// Loads the bundled default configuration.
pub fn load_default_config(importable: bool) -> Result<LoadedConfig, ConfigError> {
    info!("Loading bundled default configuration");
    parse_config(DEFAULT_CONFIG, importable)
}

pub fn parse_config(content: &str, importable: bool) -> Result<LoadedConfig, ConfigError> {
    let static_conf: StaticConfig = match serde_yaml::from_str(content) {
        Ok(conf) => {
            info!("Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, "Failed to parse config YAML");
            return Err(ConfigError::Parse(e));
        }
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => {
            info!("{PASSWORD_ENV} found in env");
            password
        }
        Err(e) => {
            error!(error = ?e, "{PASSWORD_ENV} environment variable not set");
            return Err(ConfigError::MissingEnv(PASSWORD_ENV));
        }
    };

    let mut models = static_conf.models;
    if importable {
        overlay(&mut models, &static_conf.importable);
        info!(overrides = static_conf.importable.len(), "Applied importable overrides");
    }

    let mut entries = Vec::with_capacity(models.len());
    for (name, settings) in models {
        let Some(name) = name.as_str().map(str::to_string) else {
            error!(key = ?name, "Model names must be strings");
            return Err(ConfigError::Parse(serde::de::Error::custom(format!(
                "model name {name:?} is not a string"
            ))));
        };
        let settings: ModelConfig = match serde_yaml::from_value(settings) {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = ?e, model = %name, "Invalid model settings");
                return Err(ConfigError::Parse(e));
            }
        };
        entries.push((name, settings));
    }
    let export = ExportConfig::new(entries);
    export.trace_loaded();

    let mut connection = static_conf.connection;
    connection.password = password;
    info!(
        url = %connection.url,
        database = %connection.database,
        user = %connection.user,
        "Config loaded and merged successfully"
    );
    Ok(LoadedConfig { connection, export })
}

/// Copies every key of every `overrides` model onto the same model of
/// `models`, adding models that are missing.
fn overlay(models: &mut Mapping, overrides: &Mapping) {
    for (model, settings) in overrides {
        let Value::Mapping(settings) = settings else {
            continue;
        };
        if !matches!(models.get(model), Some(Value::Mapping(_))) {
            models.insert(model.clone(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(target)) = models.get_mut(model) {
            for (key, value) in settings {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_keys_and_keeps_the_rest() {
        let mut models: Mapping = serde_yaml::from_str(
            "ir.ui.view:\n  format: xml\n  sub_folder: views\nir.model:\n  format: py\n",
        )
        .unwrap();
        let overrides: Mapping =
            serde_yaml::from_str("ir.model:\n  format: xml\n  sub_folder: data\n").unwrap();
        overlay(&mut models, &overrides);

        let model = models.get("ir.model").unwrap();
        assert_eq!(model.get("format").and_then(Value::as_str), Some("xml"));
        assert_eq!(model.get("sub_folder").and_then(Value::as_str), Some("data"));
        let view = models.get("ir.ui.view").unwrap();
        assert_eq!(view.get("sub_folder").and_then(Value::as_str), Some("views"));
    }
}
