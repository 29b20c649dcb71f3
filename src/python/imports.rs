use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const STDLIB: [&str; 24] = [
    "abc", "ast", "base64", "collections", "contextlib", "copy", "csv", "datetime", "decimal",
    "functools", "hashlib", "io", "itertools", "json", "logging", "math", "os", "random", "re",
    "string", "sys", "time", "typing", "uuid",
];

/// Imports of one python file, grouped the way isort groups them:
/// standard library, third party, then relative imports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBlock {
    plain: BTreeSet<String>,
    from: BTreeMap<String, BTreeSet<String>>,
}

impl ImportBlock {
    /// Collects the import statements of `text`; other lines are ignored.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut block = Self::default();
        let mut i = 0;
        while i < lines.len() {
            let end = statement_end(&lines, i);
            block.add_line(&joined(&lines[i..=end]));
            i = end + 1;
        }
        block
    }

    /// Adds one statement; returns false if the line is not an import.
    pub fn add_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if let Some(modules) = line.strip_prefix("import ") {
            for module in modules.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                self.plain.insert(module.to_string());
            }
            return true;
        }
        if let Some(rest) = line.strip_prefix("from ") {
            let Some((module, names)) = rest.split_once(" import ") else {
                return false;
            };
            let names = names.trim().trim_start_matches('(').trim_end_matches(')');
            let entry = self.from.entry(module.trim().to_string()).or_default();
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                entry.insert(name.to_string());
            }
            return true;
        }
        false
    }

    pub fn extend(&mut self, other: ImportBlock) {
        self.plain.extend(other.plain);
        for (module, names) in other.from {
            self.from.entry(module).or_default().extend(names);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.from.is_empty()
    }

    /// Sorted statements, sections separated by one blank line.
    pub fn render(&self) -> String {
        let mut sections: [Vec<String>; 3] = Default::default();
        for module in &self.plain {
            sections[section(module)].push(format!("import {module}"));
        }
        for (module, names) in &self.from {
            let mut names: Vec<&String> = names.iter().collect();
            names.sort_by(|a, b| name_order(a, b));
            let names: Vec<&str> = names.into_iter().map(String::as_str).collect();
            sections[section(module)].push(format!("from {module} import {}", names.join(", ")));
        }
        sections
            .iter()
            .filter(|lines| !lines.is_empty())
            .map(|lines| {
                let mut text = lines.join("\n");
                text.push('\n');
                text
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn section(module: &str) -> usize {
    let root = module.split('.').next().unwrap_or(module);
    if module.starts_with('.') {
        2
    } else if STDLIB.contains(&root) {
        0
    } else {
        1
    }
}

/// Constants, then classes, then everything else, case-insensitively.
fn name_order(a: &str, b: &str) -> Ordering {
    fn kind(name: &str) -> u8 {
        let bare = name.split(" as ").next().unwrap_or(name);
        if bare.len() > 1 && bare.chars().all(|c| !c.is_lowercase()) {
            0
        } else if bare.starts_with(|c: char| c.is_uppercase()) {
            1
        } else {
            2
        }
    }
    kind(a)
        .cmp(&kind(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Sorts and de-duplicates the import statements in `text`.
pub fn sort_imports(text: &str) -> String {
    ImportBlock::parse(text).render()
}

/// Merges the imports of `incoming` into the leading import block of
/// `existing`, keeping everything else of `existing` untouched.
pub fn merge_imports(existing: &str, incoming: &str) -> String {
    let lines: Vec<&str> = existing.lines().collect();
    let first = lines.iter().position(|l| is_import(l));
    let Some(first) = first else {
        let block = sort_imports(incoming);
        if block.is_empty() {
            return existing.to_string();
        }
        let mut merged = block;
        if !existing.trim().is_empty() {
            merged.push_str("\n\n");
            merged.push_str(existing);
        }
        return merged;
    };

    let mut block = ImportBlock::default();
    let mut last = first;
    let mut i = first;
    while i < lines.len() {
        if is_import(lines[i]) {
            last = statement_end(&lines, i);
            block.add_line(&joined(&lines[i..=last]));
            i = last + 1;
        } else if lines[i].trim().is_empty() {
            i += 1;
        } else {
            break;
        }
    }
    block.extend(ImportBlock::parse(incoming));

    let mut merged = String::with_capacity(existing.len() + incoming.len());
    for line in &lines[..first] {
        merged.push_str(line);
        merged.push('\n');
    }
    merged.push_str(&block.render());
    for line in &lines[last + 1..] {
        merged.push_str(line);
        merged.push('\n');
    }
    if !existing.ends_with('\n') && merged.ends_with('\n') {
        merged.pop();
    }
    merged
}

/// Last line of the import starting at `first`, following an open
/// parenthesis through its closing line.
fn statement_end(lines: &[&str], first: usize) -> usize {
    let opens = |line: &str| code(line).contains('(') && !code(line).contains(')');
    if !(is_import(lines[first]) && opens(lines[first])) {
        return first;
    }
    lines[first + 1..]
        .iter()
        .position(|line| code(line).contains(')'))
        .map_or(lines.len() - 1, |offset| first + 1 + offset)
}

/// `line` without its trailing comment.
fn code(line: &str) -> &str {
    line.split_once('#').map_or(line, |(code, _)| code)
}

fn joined(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| code(line).trim())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_import(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_sections_and_orders_names() {
        let sorted = sort_imports("from odoo import models, fields, api\nimport logging\nfrom odoo import SUPERUSER_ID, Command\n");
        assert_eq!(
            sorted,
            "import logging\n\nfrom odoo import SUPERUSER_ID, Command, api, fields, models\n"
        );
    }

    #[test]
    fn reads_parenthesized_imports_across_lines() {
        let block = ImportBlock::parse("from odoo import (\n    api,  # decorators\n    fields,\n)\nimport logging\n");
        assert_eq!(block.render(), "import logging\n\nfrom odoo import api, fields\n");
    }

    #[test]
    fn merges_into_existing_block_without_touching_the_rest() {
        let existing = "# -*- coding: utf-8 -*-\nfrom odoo import fields, models\n\n\nclass A(models.Model):\n    _inherit = \"a\"\n";
        let merged = merge_imports(existing, "from odoo import models, fields, api\n");
        assert_eq!(
            merged,
            "# -*- coding: utf-8 -*-\nfrom odoo import api, fields, models\n\n\nclass A(models.Model):\n    _inherit = \"a\"\n"
        );
    }
}
