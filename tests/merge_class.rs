use std::path::Path;

use odoo_export::convert::{Artifact, ClassArtifact};
use odoo_export::merge::{ClassMerger, Merger};
use odoo_export::record::Record;
use serde_json::json;

const EXISTING: &str = r#"from odoo import fields, models


class Car(models.Model):
    _name = "car"
    _description = "Car"

    plate = fields.Char(required=True)

    def action_print(self):
        return True
"#;

fn artifact() -> Artifact {
    Artifact::Class(ClassArtifact {
        imports: "from odoo import api, fields, models\n".to_string(),
        header: "class Car(models.Model):\n    _name = \"car\"\n    _description = \"Car\"\n".to_string(),
        fields: concat!(
            "    plate = fields.Char(required=True)\n",
            "    owner_id = fields.Many2one(\"res.partner\", string=\"Owner\")\n",
        )
        .to_string(),
        computes: concat!(
            "    @api.depends(\"plate\")\n",
            "    def _compute_total(self):\n",
            "        for record in self:\n",
            "            record.total = False\n",
        )
        .to_string(),
    })
}

fn car() -> Record {
    Record::from_json(json!({"model": "car"}))
}

fn merge(existing: &str, record: &Record) -> String {
    ClassMerger
        .merge(Path::new("models/car.py"), existing, &artifact(), record)
        .unwrap()
}

#[test]
fn inserts_new_members_after_the_last_field() {
    assert_eq!(
        merge(EXISTING, &car()),
        r#"from odoo import api, fields, models


class Car(models.Model):
    _name = "car"
    _description = "Car"

    plate = fields.Char(required=True)
    owner_id = fields.Many2one("res.partner", string="Owner")

    @api.depends("plate")
    def _compute_total(self):
        for record in self:
            record.total = False

    def action_print(self):
        return True
"#
    );
}

#[test]
fn merging_twice_changes_nothing() {
    let once = merge(EXISTING, &car());
    assert_eq!(merge(&once, &car()), once);
}

#[test]
fn members_already_defined_are_skipped() {
    let merged = merge(EXISTING, &car());
    assert_eq!(merged.matches("plate = fields.Char").count(), 1);
    assert_eq!(merged.matches("def _compute_total").count(), 1);
}

#[test]
fn class_without_fields_receives_members_at_its_end() {
    let existing = "from odoo import models\n\n\nclass Car(models.Model):\n    _inherit = \"car\"\n";
    let merged = merge(existing, &car());
    assert!(merged.starts_with("from odoo import api, fields, models\n"));
    assert!(merged.contains(concat!(
        "    _inherit = \"car\"\n",
        "\n",
        "    plate = fields.Char(required=True)\n",
        "    owner_id = fields.Many2one(\"res.partner\", string=\"Owner\")\n",
    )));
    assert!(merged.ends_with("            record.total = False\n"));
}

#[test]
fn missing_class_is_appended_as_a_new_class() {
    let existing = "from odoo import models\n\n\nclass Other(models.Model):\n    _inherit = \"res.partner\"\n\n";
    let merged = merge(existing, &car());

    assert!(merged.contains(concat!(
        "    _inherit = \"res.partner\"\n",
        "\n",
        "\n",
        "class Car(models.Model):\n",
        "    _name = \"car\"\n",
        "    _description = \"Car\"\n",
        "\n",
        "    plate = fields.Char(required=True)\n",
    )));
    assert!(merged.ends_with("            record.total = False\n"));
}

#[test]
fn merging_twice_without_the_class_changes_nothing() {
    let existing = "from odoo import models\n\n\nclass Other(models.Model):\n    _inherit = \"res.partner\"\n";
    let once = merge(existing, &car());
    assert_eq!(merge(&once, &car()), once);
    assert_eq!(once.matches("owner_id = fields.Many2one").count(), 1);
}

#[test]
fn parenthesized_imports_are_merged_whole() {
    let existing = EXISTING.replacen(
        "from odoo import fields, models\n",
        "from odoo import (\n    fields,\n    models,\n)\n",
        1,
    );
    let merged = merge(&existing, &car());

    assert!(merged.starts_with("from odoo import api, fields, models\n\n\nclass Car(models.Model):\n"));
    assert!(!merged.contains("    models,\n)"));
    assert_eq!(merged, merge(EXISTING, &car()));
}

#[test]
fn rejects_foreign_artifacts() {
    let err = ClassMerger
        .merge(Path::new("models/car.py"), EXISTING, &Artifact::Markup("<odoo/>".to_string()), &car())
        .unwrap_err();
    assert_eq!(err.reason, "expected a python artifact");
}
