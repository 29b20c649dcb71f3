mod common;

use std::fs;

use common::{entry, record, schema};

use odoo_export::config::{ModelConfig, OutputFormat, SchemaVersion};
use odoo_export::contract::Schema;
use odoo_export::convert::{Artifact, ConvertContext, Converter, MarkupConverter};
use odoo_export::merge::merge_content;
use odoo_export::record::Record;
use odoo_export::registry::{IdentifierRegistry, ModuleDependencies};
use odoo_export::rename::Renamer;
use odoo_export::scaffold;
use odoo_export::xml::Element;
use serde_json::{json, Value};

fn registry(noupdate: bool) -> IdentifierRegistry {
    IdentifierRegistry::from_catalog(
        vec![
            entry("studio_customization", "partner_rule", "ir.rule", 5, noupdate),
            entry("base", "group_user", "res.groups", 1, false),
        ],
        ["ir.rule", "res.groups"],
    )
}

fn rule_schema(defaults: &[(&str, Value)]) -> Schema {
    schema(
        &[
            ("name", "char", None),
            ("active", "boolean", None),
            ("groups", "many2many", Some("res.groups")),
            ("model_id", "many2one", Some("ir.model")),
            ("domain_force", "text", None),
        ],
        defaults,
    )
}

fn rule_config() -> ModelConfig {
    ModelConfig {
        fields: ["name", "model_id", "domain_force", "groups", "active"]
            .map(String::from)
            .to_vec(),
        file_name_field: "ir.rule".to_string(),
        sub_folder: "security".to_string(),
        ..ModelConfig::default()
    }
}

fn rule() -> Record {
    record(json!({
        "id": 5,
        "name": "Partner rule",
        "active": false,
        "groups": [1],
        "model_id": [80, "Contact"],
        "domain_force": "[('x_studio_flag','=',True)]",
    }))
}

fn convert(
    registry: &IdentifierRegistry,
    version: SchemaVersion,
    model: &str,
    records: Vec<Record>,
    schema: &Schema,
    config: &ModelConfig,
) -> (Vec<String>, ModuleDependencies) {
    let mut deps = ModuleDependencies::new();
    let mut ctx = ConvertContext {
        registry,
        renamer: Renamer::default(),
        version,
        module: "studio_customization",
        deps: &mut deps,
    };
    let converted = MarkupConverter
        .convert(&mut ctx, model, records, schema, config)
        .unwrap();
    let documents = converted
        .into_iter()
        .map(|c| match c.artifact {
            Artifact::Markup(text) => text,
            other => panic!("expected markup, got {other:?}"),
        })
        .collect();
    (documents, deps)
}

#[test]
fn generates_a_record_document() {
    let (documents, deps) = convert(
        &registry(false),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![rule()],
        &rule_schema(&[("active", json!(true))]),
        &rule_config(),
    );

    assert_eq!(
        documents,
        vec![concat!(
            "<?xml version='1.0' encoding='utf-8'?>\n",
            "<odoo>\n",
            "    <record id=\"partner_rule\" model=\"ir.rule\">\n",
            "        <field name=\"name\">Partner rule</field>\n",
            "        <field name=\"model_id\" ref=\"__export_module__.ir_model_80\"/>\n",
            "        <field name=\"domain_force\">[('flag','=',True)]</field>\n",
            "        <field name=\"groups\" eval=\"[Command.link(ref('base.group_user'))]\"/>\n",
            "        <field name=\"active\" eval=\"False\"/>\n",
            "    </record>\n",
            "</odoo>\n",
        )
        .to_string()]
    );
    assert!(deps.contains("base"));
    assert!(deps.contains("__export_module__"));
}

#[test]
fn older_versions_use_tuple_link_commands() {
    let (documents, _) = convert(
        &registry(false),
        SchemaVersion::new(13, 0),
        "ir.rule",
        vec![rule()],
        &rule_schema(&[]),
        &rule_config(),
    );
    assert!(documents[0].contains("eval=\"[(4, ref('base.group_user'))]\""));
    assert!(!documents[0].contains("Command.link"));
}

#[test]
fn values_equal_to_defaults_are_omitted_except_booleans() {
    let (documents, _) = convert(
        &registry(false),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![record(json!({"id": 5, "name": "Partner rule", "active": true}))],
        &rule_schema(&[("name", json!("Partner rule")), ("active", json!(true))]),
        &rule_config(),
    );
    assert!(!documents[0].contains("name=\"name\""));
    assert!(documents[0].contains("<field name=\"active\" eval=\"True\"/>"));
}

#[test]
fn fields_missing_from_the_schema_are_skipped() {
    let (documents, _) = convert(
        &registry(false),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![record(json!({"id": 5, "name": "Partner rule", "display_name": "Partner rule"}))],
        &rule_schema(&[]),
        &rule_config(),
    );
    assert!(!documents[0].contains("display_name"));
}

#[test]
fn noupdate_records_are_wrapped_in_a_data_partition() {
    let (documents, _) = convert(
        &registry(true),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![rule()],
        &rule_schema(&[]),
        &rule_config(),
    );

    let root = Element::parse(&documents[0]).unwrap();
    let data = root.find("data").expect("noupdate partition");
    assert_eq!(data.attr("noupdate"), Some("1"));
    let records = data.descendants("record");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attr("id"), Some("partner_rule"));
}

#[test]
fn empty_relations_evaluate_to_false() {
    let (documents, _) = convert(
        &registry(false),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![record(json!({"id": 5, "model_id": false, "groups": []}))],
        &rule_schema(&[]),
        &rule_config(),
    );
    assert!(documents[0].contains("<field name=\"model_id\" eval=\"False\"/>"));
    assert!(documents[0].contains("<field name=\"groups\" eval=\"[]\"/>"));
}

#[test]
fn view_architecture_is_embedded_as_markup() {
    let registry = IdentifierRegistry::from_catalog(
        vec![entry("studio_customization", "partner_form", "ir.ui.view", 12, false)],
        ["ir.ui.view"],
    );
    let view = record(json!({
        "id": 12,
        "arch": "<data><xpath expr=\"//field[@name='x_studio_a']\" position=\"after\"><field name=\"x_studio_b\"/></xpath></data>",
    }));
    let config = ModelConfig {
        fields: vec!["arch".to_string()],
        ..ModelConfig::default()
    };

    let (documents, _) = convert(
        &registry,
        SchemaVersion::new(17, 0),
        "ir.ui.view",
        vec![view],
        &schema(&[("arch", "text", None)], &[]),
        &config,
    );

    assert!(documents[0].contains(concat!(
        "        <field name=\"arch\">\n",
        "            <xpath expr=\"//field[@name='a']\" position=\"after\">\n",
        "                <field name=\"b\"/>\n",
        "            </xpath>\n",
        "        </field>\n",
    )));
}

#[test]
fn written_documents_read_back_to_the_record_fields() {
    let (documents, _) = convert(
        &registry(false),
        SchemaVersion::new(17, 0),
        "ir.rule",
        vec![rule()],
        &rule_schema(&[("name", json!("Partner rule"))]),
        &rule_config(),
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("security/ir_rule.xml");
    let content = merge_content(
        OutputFormat::Xml,
        &path,
        None,
        &Artifact::Markup(documents[0].clone()),
        &rule(),
    )
    .unwrap();
    scaffold::write_file(&path, &content).unwrap();

    let root = Element::parse(&fs::read_to_string(&path).unwrap()).unwrap();
    let records = root.descendants("record");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attr("id"), Some("partner_rule"));
    let fields: Vec<(&str, String)> = records[0]
        .elements()
        .map(|field| {
            let value = field
                .attr("ref")
                .or_else(|| field.attr("eval"))
                .map_or_else(|| field.text(), str::to_string);
            (field.attr("name").unwrap_or_default(), value)
        })
        .collect();
    assert_eq!(
        fields,
        vec![
            ("model_id", "__export_module__.ir_model_80".to_string()),
            ("domain_force", "[('flag','=',True)]".to_string()),
            ("groups", "[Command.link(ref('base.group_user'))]".to_string()),
            ("active", "False".to_string()),
        ]
    );
    assert_eq!(root.to_document(), content);
}
