//! Module boilerplate around the exported files: `__init__.py` indexes,
//! `__manifest__.py`, and the upgrade script with its requirements file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::python::{prettify, unparse, Expr, Stmt};
use crate::registry::ModuleDependencies;

/// Folders whose files are loaded through the manifest `data` list.
pub const DATA_FOLDERS: [&str; 3] = ["data", "views", "security"];

/// Sub-packages imported by the module root when they exist.
pub const PACKAGES: [&str; 2] = ["models", "controllers"];

pub const UPGRADE_REQUIREMENT: &str = "odoo_upgrade @ git+https://github.com/odoo/upgrade-util@master";

/// Replaces `path` with `content` through a temporary file in the same
/// directory, creating parent directories as needed.
pub fn write_file(path: &Path, content: &str) -> Result<(), ExportError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| ExportError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ExportError::io(path, e))?;
    file.persist(path).map_err(|e| ExportError::io(path, e.error))?;
    debug!(file = %path.display(), bytes = content.len(), "[EXPORT] Wrote file");
    Ok(())
}

/// Reads `path`, `None` when it does not exist yet.
pub fn read_existing(path: &Path) -> Result<Option<String>, ExportError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ExportError::io(path, e)),
    }
}

fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>, ExportError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ExportError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ExportError::io(dir, e))?.path();
        if keep(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Writes the root `__init__.py` (skipped for importable modules, which
/// carry no python) and `models/__init__.py` when the module has model
/// files.
pub fn write_init_files(module_dir: &Path, importable: bool) -> Result<(), ExportError> {
    if !importable {
        let imports: String = PACKAGES
            .iter()
            .filter(|package| module_dir.join(package).exists())
            .map(|package| format!("from . import {package}\n"))
            .collect();
        write_file(&module_dir.join("__init__.py"), &imports)?;
    }

    let models_dir = module_dir.join("models");
    let models = sorted_entries(&models_dir, |path| {
        path.is_file()
            && path.extension().is_some_and(|ext| ext == "py")
            && path.file_name().is_some_and(|name| name != "__init__.py")
    })?;
    if !models.is_empty() {
        let imports: String = models
            .iter()
            .map(|file| format!("from . import {}\n", file.trim_end_matches(".py")))
            .collect();
        write_file(&models_dir.join("__init__.py"), &imports)?;
    }
    Ok(())
}

/// Renders the manifest of `module` for a server of the given `series`.
pub fn manifest(module_dir: &Path, module: &str, series: &str, deps: &ModuleDependencies) -> Result<String, ExportError> {
    let mut data = Vec::new();
    for folder in DATA_FOLDERS {
        for file in sorted_entries(&module_dir.join(folder), |_| true)? {
            data.push(Expr::str(format!("{folder}/{file}")));
        }
    }
    let depends = deps
        .manifest_depends(module)
        .into_iter()
        .map(Expr::Str)
        .collect();

    let manifest = Expr::Dict(vec![
        (Expr::str("name"), Expr::str(format!("{module} export"))),
        (Expr::str("version"), Expr::str(format!("{series}.1.0.0"))),
        (Expr::str("depends"), Expr::List(depends)),
        (Expr::str("data"), Expr::List(data)),
    ]);
    Ok(prettify(&unparse(&[Stmt::Expr(manifest)])))
}

pub fn write_manifest(module_dir: &Path, module: &str, series: &str, deps: &ModuleDependencies) -> Result<(), ExportError> {
    let content = manifest(module_dir, module, series, deps)?;
    write_file(&module_dir.join("__manifest__.py"), &content)?;
    info!(module = %module, depends = ?deps.manifest_depends(module), "[EXPORT] Wrote manifest");
    Ok(())
}

/// Writes `migrations/<series>.1.0.0/pre-10.py` under the module and the
/// upgrade utility requirement at the destination root.
pub fn write_migration_script(
    destination: &Path,
    module: &str,
    series: &str,
    script: &str,
) -> Result<PathBuf, ExportError> {
    let path = destination
        .join(module)
        .join("migrations")
        .join(format!("{series}.1.0.0"))
        .join("pre-10.py");
    write_file(&path, script)?;
    write_file(&destination.join("requirements.txt"), &format!("{UPGRADE_REQUIREMENT}\n"))?;
    info!(file = %path.display(), "[EXPORT] Wrote pre-10 migration script");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_data_files_and_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("views")).unwrap();
        fs::write(dir.path().join("views/ir_ui_view.xml"), "").unwrap();

        let mut deps = ModuleDependencies::new();
        deps.record("base");
        deps.record("my_module");
        let text = manifest(dir.path(), "my_module", "17.0", &deps).unwrap();
        assert_eq!(
            text,
            "{\"name\": \"my_module export\", \"version\": \"17.0.1.0.0\", \"depends\": [\"base\"], \"data\": [\"views/ir_ui_view.xml\"]}\n"
        );
    }

    #[test]
    fn long_manifests_are_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        for name in ["ir_cron.xml", "ir_actions_server.xml", "ir_ui_menu.xml"] {
            fs::write(dir.path().join("data").join(name), "").unwrap();
        }
        let text = manifest(dir.path(), "studio_customization", "17.0", &ModuleDependencies::new()).unwrap();
        assert!(text.starts_with("{\n    \"name\": \"studio_customization export\",\n"));
        assert!(text.ends_with("}\n"));
        assert!(text.lines().all(|line| line.len() <= 120));
    }

    #[test]
    fn init_files_skip_the_index_itself() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();
        fs::write(models.join("sale_order.py"), "").unwrap();
        fs::write(models.join("__init__.py"), "stale").unwrap();

        write_init_files(dir.path(), false).unwrap();
        assert_eq!(fs::read_to_string(models.join("__init__.py")).unwrap(), "from . import sale_order\n");
        assert_eq!(fs::read_to_string(dir.path().join("__init__.py")).unwrap(), "from . import models\n");
    }
}
