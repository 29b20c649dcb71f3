use std::path::Path;

use odoo_export::convert::Artifact;
use odoo_export::merge::{merge_content, Merger, MarkupMerger};
use odoo_export::config::OutputFormat;
use odoo_export::record::Record;
use odoo_export::xml::Element;

fn document(body: &str) -> String {
    format!("<?xml version='1.0' encoding='utf-8'?>\n<odoo>\n{body}</odoo>\n")
}

fn generated(id: &str, field: &str, noupdate: bool) -> Artifact {
    let record = format!(
        "<record id=\"{id}\" model=\"m\"><field name=\"{field}\">1</field></record>"
    );
    let body = if noupdate {
        format!("<data noupdate=\"1\">{record}</data>")
    } else {
        record
    };
    let root = Element::parse(&format!("<odoo>{body}</odoo>")).unwrap();
    Artifact::Markup(root.to_document())
}

fn merge(existing: &str, artifact: &Artifact) -> String {
    MarkupMerger
        .merge(Path::new("views/m.xml"), existing, artifact, &Record::default())
        .unwrap()
}

#[test]
fn new_files_receive_the_generated_document() {
    let artifact = generated("a", "x", false);
    let content = merge_content(OutputFormat::Xml, Path::new("m.xml"), None, &artifact, &Record::default()).unwrap();
    assert_eq!(content, artifact.render());
}

#[test]
fn merging_is_idempotent() {
    for noupdate in [false, true] {
        let artifact = generated("a", "x", noupdate);
        let once = artifact.render();
        assert_eq!(merge(&once, &artifact), once);
    }
}

#[test]
fn appends_updatable_records_to_the_root() {
    let existing = document(concat!(
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"x\">1</field>\n",
        "    </record>\n",
    ));
    let merged = merge(&existing, &generated("b", "y", false));
    assert_eq!(
        merged,
        document(concat!(
            "    <record id=\"a\" model=\"m\">\n",
            "        <field name=\"x\">1</field>\n",
            "    </record>\n",
            "    <record id=\"b\" model=\"m\">\n",
            "        <field name=\"y\">1</field>\n",
            "    </record>\n",
        ))
    );
}

#[test]
fn creates_a_partition_for_the_first_noupdate_record() {
    let existing = document(concat!(
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"x\">1</field>\n",
        "    </record>\n",
    ));
    let merged = merge(&existing, &generated("b", "y", true));
    assert_eq!(
        merged,
        document(concat!(
            "    <data noupdate=\"1\">\n",
            "        <record id=\"b\" model=\"m\">\n",
            "            <field name=\"y\">1</field>\n",
            "        </record>\n",
            "    </data>\n",
            "    <record id=\"a\" model=\"m\">\n",
            "        <field name=\"x\">1</field>\n",
            "    </record>\n",
        ))
    );
}

#[test]
fn relocates_records_under_a_legacy_noupdate_root() {
    let existing = concat!(
        "<?xml version='1.0' encoding='utf-8'?>\n",
        "<odoo noupdate=\"1\">\n",
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"x\">1</field>\n",
        "    </record>\n",
        "</odoo>\n",
    );
    let merged = merge(existing, &generated("b", "y", false));
    assert_eq!(
        merged,
        document(concat!(
            "    <data noupdate=\"1\">\n",
            "        <record id=\"a\" model=\"m\">\n",
            "            <field name=\"x\">1</field>\n",
            "        </record>\n",
            "    </data>\n",
            "    <record id=\"b\" model=\"m\">\n",
            "        <field name=\"y\">1</field>\n",
            "    </record>\n",
        ))
    );
}

#[test]
fn moves_records_between_partitions_without_duplicating() {
    let existing = document(concat!(
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"x\">1</field>\n",
        "    </record>\n",
    ));
    let to_noupdate = merge(&existing, &generated("a", "x", true));
    let root = Element::parse(&to_noupdate).unwrap();
    assert_eq!(root.descendants("record").len(), 1);
    assert_eq!(root.find("data").unwrap().descendants("record").len(), 1);

    let back = merge(&to_noupdate, &generated("a", "x", false));
    let root = Element::parse(&back).unwrap();
    assert_eq!(root.descendants("record").len(), 1);
    assert_eq!(root.find("record").and_then(|r| r.attr("id")), Some("a"));
}

#[test]
fn mixed_content_of_other_records_survives_a_merge() {
    let existing = document(concat!(
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"arch\" type=\"xml\">\n",
        "            <p>Hello <b>you</b> <i>there</i></p>\n",
        "        </field>\n",
        "    </record>\n",
    ));
    let merged = merge(&existing, &generated("b", "y", false));

    assert!(merged.contains("            <p>Hello <b>you</b> <i>there</i></p>\n"));
    assert_eq!(merge(&merged, &generated("b", "y", false)), merged);
}

#[test]
fn existing_record_content_is_left_alone() {
    let existing = document(concat!(
        "    <record id=\"a\" model=\"m\">\n",
        "        <field name=\"x\">hand edited</field>\n",
        "    </record>\n",
    ));
    assert_eq!(merge(&existing, &generated("a", "x", false)), existing);
}

#[test]
fn unparsable_files_are_reported_with_the_payload() {
    let artifact = generated("a", "x", false);
    let err = MarkupMerger
        .merge(Path::new("views/m.xml"), "<odoo><record>", &artifact, &Record::default())
        .unwrap_err();
    assert_eq!(err.file, Path::new("views/m.xml"));
    assert_eq!(err.payload, artifact.render());
}

#[test]
fn payloads_without_a_record_are_rejected() {
    let err = MarkupMerger
        .merge(
            Path::new("m.xml"),
            &document(""),
            &Artifact::Markup("<odoo/>".to_string()),
            &Record::default(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("no <record>"));
}
