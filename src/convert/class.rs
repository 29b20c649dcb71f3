use tracing::debug;

use super::{Artifact, ClassArtifact, ConvertContext, Converted, Converter};
use crate::config::ModelConfig;
use crate::contract::Schema;
use crate::error::ConvertError;
use crate::python::{prettify, sort_imports, unparse, unparse_at, Expr, Stmt};
use crate::record::Record;
use crate::rename::Renamer;

/// Keys rewritten on model and field rows before generating code.
pub const CLASS_KEYS: [&str; 6] = ["model", "name", "relation", "related", "depends", "compute"];

const FIELD_ROWS: &str = "ir.model.fields";
const SELECTION_ROWS: &str = "ir.model.fields.selection";
const FLAG_ATTRIBUTES: [&str; 4] = ["required", "index", "copy", "translate"];

/// Generates python model classes from `ir.model` rows and their nested
/// `ir.model.fields` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassConverter;

impl Converter for ClassConverter {
    fn convert(
        &self,
        ctx: &mut ConvertContext<'_>,
        model: &str,
        mut records: Vec<Record>,
        _schema: &Schema,
        config: &ModelConfig,
    ) -> Result<Vec<Converted>, ConvertError> {
        if model != "ir.model" {
            return Err(ConvertError::UnsupportedModel(model.to_string()));
        }
        ctx.renamer
            .rename_records(&mut records, &CLASS_KEYS, &config.include_models());

        let imports = prettify(&sort_imports("from odoo import models, fields, api\n"));
        let converted = records
            .into_iter()
            .map(|record| {
                let artifact = ClassArtifact {
                    imports: imports.clone(),
                    header: prettify(&unparse(&[class_definition(&record)])),
                    fields: prettify(&unparse_at(&field_definitions(&record), 1)),
                    computes: prettify(&unparse_at(&compute_definitions(&record), 1)),
                };
                debug!(model = record.text("model").unwrap_or_default(), "[CONVERT] Generated class");
                Converted {
                    record,
                    artifact: Artifact::Class(artifact),
                }
            })
            .collect();
        Ok(converted)
    }
}

/// `my.custom_model` becomes `MyCustomModel`.
pub fn class_name(model: &str) -> String {
    let mut out = String::with_capacity(model.len());
    let mut previous_is_letter = false;
    for c in model.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            previous_is_letter = false;
            if c != '.' && c != '_' {
                out.push(c);
            }
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn class_definition(record: &Record) -> Stmt {
    let model = record.text("model").unwrap_or_default();
    let mut body = Vec::new();
    if !model.is_empty() {
        let identity = if record.text("state") == Some("manual") {
            "_name"
        } else {
            "_inherit"
        };
        body.push(Stmt::assign(identity, Expr::str(model)));
    }
    if let Some(description) = record.text("name") {
        body.push(Stmt::assign("_description", Expr::str(description)));
    }
    Stmt::ClassDef {
        name: class_name(model),
        bases: vec![Expr::name("models.Model")],
        body,
    }
}

/// Whether the label says more than the field name does.
fn label_differs(name: &str, label: &str) -> bool {
    label.replace(' ', "_").to_lowercase() != name.to_lowercase()
}

fn field_definitions(record: &Record) -> Vec<Stmt> {
    record
        .children(FIELD_ROWS)
        .iter()
        .filter_map(|field| {
            let name = field.text("name")?;
            Some(Stmt::assign(name, field_call(name, field)))
        })
        .collect()
}

fn field_call(name: &str, field: &Record) -> Expr {
    let kind = field.text("ttype").unwrap_or("char");
    let mut call = Expr::call(format!("fields.{}", capitalize(kind)), Vec::new());

    let label = field
        .text("field_description")
        .filter(|label| label_differs(name, label));
    match field.text("relation") {
        Some(relation) => {
            call.push_arg(Expr::str(relation));
            if let Some(label) = label {
                call.push_keyword("string", Expr::str(label));
            }
        }
        None => {
            if let Some(label) = label {
                call.push_arg(Expr::str(label));
            }
        }
    }

    let options = field.children(SELECTION_ROWS);
    if field.flag("selection_ids") || !options.is_empty() {
        let options = options
            .iter()
            .map(|option| {
                let value = option.text("value").unwrap_or_default();
                let label = option
                    .text("display_name")
                    .or_else(|| option.text("name"))
                    .unwrap_or(value);
                Expr::Tuple(vec![Expr::str(value), Expr::str(label)])
            })
            .collect();
        call.push_keyword("selection", Expr::List(options));
    }

    for attribute in FLAG_ATTRIBUTES {
        if field.flag(attribute) {
            call.push_keyword(attribute, Expr::Bool(true));
        }
    }

    let related = field.text("related");
    if field.flag("depends") || related.is_some() {
        match related {
            Some(path) => call.push_keyword("related", Expr::str(path)),
            None => {
                call.push_keyword("compute", Expr::str(format!("_compute_{name}")));
                if field.flag("relation_field") {
                    call.push_keyword("inverse", Expr::str(format!("_inverse_{name}")));
                }
            }
        }
        if field.flag("store") {
            call.push_keyword("store", Expr::Bool(true));
        }
        if !field.flag("readonly") {
            call.push_keyword("readonly", Expr::Bool(false));
        }
    } else if field.flag("readonly") {
        call.push_keyword("readonly", Expr::Bool(true));
    }
    call
}

fn compute_definitions(record: &Record) -> Vec<Stmt> {
    let mut methods = Vec::new();
    for field in record.children(FIELD_ROWS) {
        let (Some(name), Some(depends)) = (field.text("name"), field.text("depends")) else {
            continue;
        };
        let body = match field.text("compute") {
            Some(code) => vec![Stmt::Verbatim(code.to_string())],
            None => vec![Stmt::for_each(
                &["record"],
                "self",
                vec![Stmt::assign(format!("record.{name}"), Expr::Bool(false))],
            )],
        };
        let dependencies = depends
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| Expr::str(d))
            .collect();
        methods.push(Stmt::FunctionDef {
            name: format!("_compute_{name}"),
            args: vec!["self".to_string()],
            decorators: vec![Expr::call("api.depends", dependencies)],
            body,
        });

        if field.flag("relation_field") {
            methods.push(Stmt::method(
                format!("_inverse_{name}"),
                vec![Stmt::for_each(&["record"], "self", vec![Stmt::Pass])],
            ));
        }
    }
    methods
}

/// Upgrade script renaming the custom models and fields of `models` (the
/// `ir.model` rows as read, before renaming) to their migrated names.
/// Returns `None` when nothing gets renamed.
pub fn migration_script(models: &[Record], renamer: Renamer, config: &ModelConfig) -> Option<String> {
    let mut renamed = models.to_vec();
    renamer.rename_records(&mut renamed, &CLASS_KEYS, &config.include_models());

    let mut model_renames = Vec::new();
    let mut field_renames = Vec::new();
    for (old, new) in models.iter().zip(&renamed) {
        let old_model = old.text("model").unwrap_or_default();
        let new_model = new.text("model").unwrap_or_default();
        if old_model != new_model {
            model_renames.push(vec![old_model, new_model]);
        }
        for (old_field, new_field) in old.children(FIELD_ROWS).iter().zip(new.children(FIELD_ROWS)) {
            let old_name = old_field.text("name").unwrap_or_default();
            let new_name = new_field.text("name").unwrap_or_default();
            if old_name != new_name {
                field_renames.push(vec![old_model, old_name, new_name]);
            }
        }
    }
    if model_renames.is_empty() && field_renames.is_empty() {
        return None;
    }
    debug!(
        models = model_renames.len(),
        fields = field_renames.len(),
        "[CONVERT] Generated migration script"
    );

    let imports = sort_imports("import logging\nfrom odoo.upgrade import util\n");
    let mut body = vec![
        Stmt::assign("env", Expr::call("util.env", vec![Expr::name("cr")])),
        Stmt::Blank,
    ];
    body.extend(FIELD_RENAMES.statements(&field_renames));
    body.push(Stmt::Blank);
    body.extend(MODEL_RENAMES.statements(&model_renames));

    let script = vec![
        Stmt::assign(
            "_logger",
            Expr::call("logging.getLogger", vec![Expr::name("__name__")]),
        ),
        Stmt::FunctionDef {
            name: "migrate".to_string(),
            args: vec!["cr".to_string(), "version".to_string()],
            decorators: Vec::new(),
            body,
        },
    ];
    Some(format!("{imports}\n\n{}", prettify(&unparse(&script))))
}

fn names(names: &[&str]) -> Vec<Expr> {
    names.iter().map(|n| Expr::name(*n)).collect()
}

/// Shape of one rename loop of the upgrade script: log, mark the row as
/// base so the upgrade utility accepts it, then rename.
struct RenameLoop {
    kind: &'static str,
    targets: &'static [&'static str],
    message: &'static str,
    message_args: &'static [&'static str],
    mark_query: &'static str,
    mark_args: &'static [&'static str],
    rename_args: &'static [&'static str],
}

const FIELD_RENAMES: RenameLoop = RenameLoop {
    kind: "field",
    targets: &["model", "old_field", "new_field"],
    message: "rename field : %s -> %s on %s",
    message_args: &["old_field", "new_field", "model"],
    mark_query: "UPDATE ir_model_fields SET state='base' WHERE model LIKE %s AND name LIKE %s",
    mark_args: &["model", "old_field"],
    rename_args: &["cr", "model", "old_field", "new_field"],
};

const MODEL_RENAMES: RenameLoop = RenameLoop {
    kind: "model",
    targets: &["old_model", "new_model"],
    message: "rename model : %s -> %s",
    message_args: &["old_model", "new_model"],
    mark_query: "UPDATE ir_model SET state='base' WHERE model LIKE %s",
    mark_args: &["old_model"],
    rename_args: &["cr", "old_model", "new_model"],
};

impl RenameLoop {
    fn statements(&self, table: &[Vec<&str>]) -> Vec<Stmt> {
        let table_name = format!("to_rename_{}s", self.kind);
        let rows = table
            .iter()
            .map(|row| Expr::Tuple(row.iter().map(|v| Expr::str(*v)).collect()))
            .collect();
        vec![
            Stmt::Expr(Expr::call(
                "_logger.info",
                vec![Expr::str(format!("Renaming {}s", self.kind))],
            )),
            Stmt::Blank,
            Stmt::assign(table_name.clone(), Expr::Tuple(rows)),
            Stmt::Blank,
            Stmt::for_each(
                self.targets,
                table_name,
                vec![
                    Stmt::Expr(Expr::call(
                        "_logger.info",
                        vec![Expr::binop(
                            Expr::str(self.message),
                            "%",
                            Expr::Tuple(names(self.message_args)),
                        )],
                    )),
                    Stmt::Expr(Expr::call(
                        "cr.execute",
                        vec![Expr::str(self.mark_query), Expr::List(names(self.mark_args))],
                    )),
                    Stmt::Expr(Expr::call(
                        format!("util.rename_{}", self.kind),
                        names(self.rename_args),
                    )),
                ],
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_follow_title_case() {
        assert_eq!(class_name("res.partner"), "ResPartner");
        assert_eq!(class_name("my_custom.model2x"), "MyCustomModel2X");
    }

    #[test]
    fn label_comparison_ignores_case_and_spaces() {
        assert!(!label_differs("partner_code", "Partner Code"));
        assert!(label_differs("partner_code", "Partner Code Ext"));
        assert!(label_differs("code", "Code Ext"));
    }
}
