use csv::{Terminator, WriterBuilder};
use serde_json::Value;
use tracing::debug;

use super::{Artifact, ConvertContext, Converted, Converter};
use crate::config::ModelConfig;
use crate::contract::Schema;
use crate::error::ConvertError;
use crate::record::{is_truthy, python_str, relation_ids, Record};

/// Keys rewritten on records before they are serialized.
pub const TABULAR_KEYS: [&str; 3] = ["name", "model_id", "group_id"];

/// Generates a single header-plus-rows block for a whole batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularConverter;

impl Converter for TabularConverter {
    fn convert(
        &self,
        ctx: &mut ConvertContext<'_>,
        model: &str,
        mut records: Vec<Record>,
        schema: &Schema,
        config: &ModelConfig,
    ) -> Result<Vec<Converted>, ConvertError> {
        ctx.renamer
            .rename_records(&mut records, &TABULAR_KEYS, &config.include_models());

        let header: Vec<String> = if config.fields.is_empty() {
            records
                .first()
                .map(|r| r.fields.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            config.fields.clone()
        };

        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        let encode = |e: csv::Error| ConvertError::Encode {
            model: model.to_string(),
            message: e.to_string(),
        };
        writer.write_record(&header).map_err(encode)?;

        for record in &records {
            let row: Vec<String> = header
                .iter()
                .map(|field| cell(ctx, model, record, field, schema))
                .collect();
            writer.write_record(&row).map_err(encode)?;
        }

        let bytes = writer.into_inner().map_err(|e| ConvertError::Encode {
            model: model.to_string(),
            message: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| ConvertError::Encode {
            model: model.to_string(),
            message: e.to_string(),
        })?;
        debug!(model = %model, rows = records.len(), "[CONVERT] Generated tabular block");

        Ok(vec![Converted {
            record: Record::default(),
            artifact: Artifact::Tabular(text),
        }])
    }
}

fn cell(
    ctx: &mut ConvertContext<'_>,
    model: &str,
    record: &Record,
    field: &str,
    schema: &Schema,
) -> String {
    let value = record.get(field);
    if let Some(relation) = schema.field(field).and_then(|d| d.relation.as_deref()) {
        return match value {
            Some(value) if is_truthy(value) => ctx.references(relation, &relation_ids(value)).join(","),
            _ => String::new(),
        };
    }
    if field == "id" {
        return match record.id() {
            Some(id) => ctx.reference(model, id),
            None => String::new(),
        };
    }
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => python_str(value),
    }
}
