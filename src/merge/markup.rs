use std::path::Path;

use tracing::debug;

use super::Merger;
use crate::convert::Artifact;
use crate::error::MergeError;
use crate::record::Record;
use crate::xml::{Element, Node};

/// Adds the record of a generated `<odoo>` document to an existing one,
/// keeping updatable and non-updatable records in their own partitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupMerger;

/// Where a record sits in a file: directly under the root, or inside the
/// root child at the given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Root(usize),
    Nested { data: usize, child: usize },
}

fn is_noupdate(element: &Element) -> bool {
    element
        .attr("noupdate")
        .is_some_and(|v| matches!(v.trim(), "1" | "True" | "true"))
}

fn is_partition(node: &Node) -> bool {
    matches!(node, Node::Element(e) if e.tag == "data" && is_noupdate(e))
}

impl Merger for MarkupMerger {
    fn merge(
        &self,
        path: &Path,
        existing: &str,
        artifact: &Artifact,
        _record: &Record,
    ) -> Result<String, MergeError> {
        let Artifact::Markup(payload) = artifact else {
            return Err(MergeError::new(path, artifact.render(), "expected a markup artifact"));
        };
        let fail = |reason: String| MergeError::new(path, payload.as_str(), reason);

        let mut file_root = Element::parse(existing).map_err(|e| fail(e.to_string()))?;
        let incoming = Element::parse(payload).map_err(|e| fail(e.to_string()))?;
        let incoming_noupdate = incoming.find("data").is_some_and(is_noupdate);
        let record = incoming
            .descendants("record")
            .into_iter()
            .next()
            .cloned()
            .ok_or_else(|| fail("no <record> element in generated markup".to_string()))?;
        let record_id = record.attr("id").unwrap_or_default().to_string();

        relocate_legacy_noupdate(&mut file_root);
        if incoming_noupdate {
            ensure_partition(&mut file_root);
        }

        match locate(&file_root, &record_id) {
            Some(location) => {
                let in_partition = match location {
                    Location::Nested { data, .. } => is_partition(&file_root.children[data]),
                    Location::Root(_) => false,
                };
                if in_partition != incoming_noupdate {
                    debug!(id = %record_id, noupdate = incoming_noupdate, "[MERGE] Moving record between partitions");
                    if let Some(existing_record) = take(&mut file_root, location) {
                        place(&mut file_root, existing_record, incoming_noupdate);
                    }
                } else {
                    debug!(id = %record_id, "[MERGE] Record already present");
                }
            }
            None => place(&mut file_root, record, incoming_noupdate),
        }

        Ok(file_root.to_document())
    }
}

/// A `noupdate` attribute on the root itself covers every record placed
/// directly under it: those move into a partition and the attribute goes.
fn relocate_legacy_noupdate(root: &mut Element) {
    let Some(flag) = root.remove_attr("noupdate") else {
        return;
    };
    if !matches!(flag.trim(), "1" | "True" | "true") {
        return;
    }
    let index = ensure_partition(root);
    let mut moved = Vec::new();
    let mut kept = Vec::new();
    for (i, node) in std::mem::take(&mut root.children).into_iter().enumerate() {
        let is_data = matches!(&node, Node::Element(e) if e.tag == "data");
        if i != index && !is_data && matches!(node, Node::Element(_)) {
            moved.push(node);
        } else {
            kept.push(node);
        }
    }
    root.children = kept;
    if let Some(Node::Element(partition)) = root.children.iter_mut().find(|n| is_partition(n)) {
        partition.children.extend(moved);
    }
}

/// Index of the root's noupdate partition, created first if missing.
fn ensure_partition(root: &mut Element) -> usize {
    if let Some(index) = root.children.iter().position(is_partition) {
        return index;
    }
    root.children
        .insert(0, Node::Element(Element::new("data").with_attr("noupdate", "1")));
    0
}

fn locate(root: &Element, id: &str) -> Option<Location> {
    for (i, node) in root.children.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };
        if element.attr("id") == Some(id) {
            return Some(Location::Root(i));
        }
        if element.tag == "data" {
            let found = element
                .children
                .iter()
                .position(|n| matches!(n, Node::Element(e) if e.attr("id") == Some(id)));
            if let Some(child) = found {
                return Some(Location::Nested { data: i, child });
            }
        }
    }
    None
}

fn take(root: &mut Element, location: Location) -> Option<Node> {
    match location {
        Location::Root(i) => Some(root.children.remove(i)),
        Location::Nested { data, child } => match root.children.get_mut(data) {
            Some(Node::Element(parent)) => Some(parent.children.remove(child)),
            _ => None,
        },
    }
}

fn place(root: &mut Element, record: impl Into<Node>, noupdate: bool) {
    let node = record.into();
    if noupdate {
        let index = ensure_partition(root);
        if let Node::Element(partition) = &mut root.children[index] {
            partition.children.push(node);
        }
    } else {
        root.children.push(node);
    }
}
