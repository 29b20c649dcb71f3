use std::path::Path;

use odoo_export::convert::Artifact;
use odoo_export::merge::{Merger, TabularMerger};
use odoo_export::record::Record;

fn merge(existing: &str, incoming: &str) -> Result<String, odoo_export::error::MergeError> {
    TabularMerger.merge(
        Path::new("security/ir_model_access.csv"),
        existing,
        &Artifact::Tabular(incoming.to_string()),
        &Record::default(),
    )
}

#[test]
fn appends_only_unseen_rows_under_a_single_header() {
    let existing = "id,name\na,A\nb,B\nc,C\n";
    let incoming = "id,name\nc,C\nd,D\ne,E\n";

    let merged = merge(existing, incoming).unwrap();

    assert_eq!(merged, "id,name\na,A\nb,B\nc,C\nd,D\ne,E\n");
    assert_eq!(merged.lines().filter(|l| l.starts_with("id,")).count(), 1);
}

#[test]
fn rows_are_keyed_by_identifier_not_content() {
    let merged = merge("id,name\na,Old label\n", "id,name\na,New label\n").unwrap();
    assert_eq!(merged, "id,name\na,Old label\n");
}

#[test]
fn duplicates_within_the_payload_are_written_once() {
    let merged = merge("id,name\na,A\n", "id,name\nb,B\nb,B\n").unwrap();
    assert_eq!(merged, "id,name\na,A\nb,B\n");
}

#[test]
fn merging_the_same_block_twice_converges() {
    let incoming = "id,name\nd,D\n";
    let once = merge("id,name\na,A\n", incoming).unwrap();
    assert_eq!(merge(&once, incoming).unwrap(), once);
}

#[test]
fn header_mismatch_is_a_merge_error() {
    let err = merge("id,name\na,A\n", "id,label\nb,B\n").unwrap_err();
    assert!(err.reason.starts_with("header mismatch"));
    assert_eq!(err.payload, "id,label\nb,B\n");
}

#[test]
fn quoted_cells_survive_the_merge() {
    let merged = merge("id,name\na,\"A, first\"\n", "id,name\nb,\"B, second\"\n").unwrap();
    assert_eq!(merged, "id,name\na,\"A, first\"\nb,\"B, second\"\n");
}
