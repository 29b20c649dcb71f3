use serde_json::Value;
use tracing::{debug, warn};

use super::{Artifact, ConvertContext, Converted, Converter};
use crate::config::ModelConfig;
use crate::contract::{FieldDescriptor, FieldType, Schema};
use crate::error::ConvertError;
use crate::record::{is_truthy, python_str, relation_id, relation_ids, Record};
use crate::xml::{parse_fragment, Element, Node};

/// Keys rewritten on records before they are serialized.
pub const MARKUP_KEYS: [&str; 15] = [
    "module",
    "name",
    "model_name",
    "model",
    "model_id",
    "res_model",
    "report_name",
    "filter_domain",
    "domain",
    "code",
    "sort",
    "context",
    "domain_force",
    "arch",
    "xml_id",
];

/// Generates one `<odoo>` document per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupConverter;

impl Converter for MarkupConverter {
    fn convert(
        &self,
        ctx: &mut ConvertContext<'_>,
        model: &str,
        mut records: Vec<Record>,
        schema: &Schema,
        config: &ModelConfig,
    ) -> Result<Vec<Converted>, ConvertError> {
        ctx.renamer
            .rename_records(&mut records, &MARKUP_KEYS, &config.include_models());

        let ids: Vec<i64> = records.iter().filter_map(Record::id).collect();
        let mut identifiers = ctx.identifiers(model, &ids);

        let mut converted = Vec::with_capacity(records.len());
        for record in records {
            let Some(id) = record.id() else {
                warn!(model = %model, "[CONVERT] Skipping record without id");
                continue;
            };
            let entry = identifiers
                .swap_remove(&id)
                .unwrap_or_else(|| ctx.identifier(model, id));

            let mut element = Element::new("record")
                .with_attr("id", entry.reference(ctx.module))
                .with_attr("model", model);
            for (name, value) in ordered_fields(&record, &config.fields) {
                let Some(descriptor) = schema.field(name) else {
                    continue;
                };
                let is_boolean = descriptor.kind == FieldType::Boolean;
                if !is_boolean && schema.default_for(name) == Some(value) {
                    continue;
                }
                element.push(field_element(ctx, model, name, value, descriptor));
            }

            let mut root = Element::new("odoo");
            if entry.noupdate {
                let mut data = Element::new("data").with_attr("noupdate", "1");
                data.push(element);
                root.push(data);
            } else {
                root.push(element);
            }
            debug!(model = %model, id, "[CONVERT] Generated markup record");
            converted.push(Converted {
                record,
                artifact: Artifact::Markup(root.to_document()),
            });
        }
        Ok(converted)
    }
}

/// Fields in configured order, then the others in encounter order. The
/// primary key never appears.
fn ordered_fields<'a>(record: &'a Record, order: &[String]) -> Vec<(&'a str, &'a Value)> {
    let mut fields: Vec<(&str, &Value)> = record
        .fields
        .iter()
        .filter(|(name, _)| name.as_str() != "id")
        .map(|(name, value)| (name.as_str(), value))
        .collect();
    fields.sort_by_key(|(name, _)| {
        order
            .iter()
            .position(|configured| configured == name)
            .unwrap_or(usize::MAX)
    });
    fields
}

fn field_element(
    ctx: &mut ConvertContext<'_>,
    model: &str,
    name: &str,
    value: &Value,
    descriptor: &FieldDescriptor,
) -> Element {
    let element = Element::new("field").with_attr("name", name);
    let relation = descriptor.relation.as_deref();

    match (&descriptor.kind, relation) {
        (FieldType::Many2one, Some(relation)) => match relation_id(value) {
            Some(id) if is_truthy(value) => element.with_attr("ref", ctx.reference(relation, id)),
            _ => element.with_attr("eval", "False"),
        },
        (kind, Some(relation)) if kind.is_x2many() => {
            let ids = relation_ids(value);
            let links: Vec<String> = ctx
                .references(relation, &ids)
                .into_iter()
                .map(|reference| link_command(ctx, &reference))
                .collect();
            element.with_attr("eval", format!("[{}]", links.join(", ")))
        }
        (FieldType::Boolean, _) => {
            element.with_attr("eval", if is_truthy(value) { "True" } else { "False" })
        }
        _ => scalar_element(element, model, name, value, descriptor),
    }
}

fn link_command(ctx: &ConvertContext<'_>, reference: &str) -> String {
    if ctx.version.has_link_commands() {
        format!("Command.link(ref('{reference}'))")
    } else {
        format!("(4, ref('{reference}'))")
    }
}

fn scalar_element(
    mut element: Element,
    model: &str,
    name: &str,
    value: &Value,
    descriptor: &FieldDescriptor,
) -> Element {
    match value {
        Value::Bool(flag) => element.with_attr("eval", if *flag { "True" } else { "False" }),
        Value::Null => element.with_attr("eval", "False"),
        Value::String(arch) if model == "ir.ui.view" && name == "arch" => {
            match parse_fragment(arch) {
                Ok(nodes) => {
                    element.children.extend(unwrap_data(nodes));
                    element
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "[CONVERT] Keeping unparsable view architecture as text");
                    element.with_text(arch.clone())
                }
            }
        }
        Value::String(code) if name == "code" && descriptor.kind == FieldType::Text => {
            element.children.push(Node::CData(code.clone()));
            element
        }
        other => element.with_text(python_str(other)),
    }
}

/// Children of a lone `<data>` wrapper, or the nodes themselves.
fn unwrap_data(nodes: Vec<Node>) -> Vec<Node> {
    let element_count = nodes.iter().filter(|n| matches!(n, Node::Element(_))).count();
    if element_count == 1 {
        if let Some(Node::Element(data)) = nodes.iter().find(|n| matches!(n, Node::Element(_))) {
            if data.tag == "data" {
                return data.children.clone();
            }
        }
    }
    nodes
}
