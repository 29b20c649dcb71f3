use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::warn;

use super::Merger;
use crate::convert::Artifact;
use crate::error::MergeError;
use crate::python::merge_imports;
use crate::record::Record;

/// Splices fields and methods into the class extending the record's model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassMerger;

impl Merger for ClassMerger {
    fn merge(
        &self,
        path: &Path,
        existing: &str,
        artifact: &Artifact,
        record: &Record,
    ) -> Result<String, MergeError> {
        let Artifact::Class(class) = artifact else {
            return Err(MergeError::new(path, artifact.render(), "expected a python artifact"));
        };
        let model = record.text("model").unwrap_or_default();

        let text = merge_imports(existing, &class.imports);
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

        let located = locate_class(&lines, model);
        let (defined_fields, defined_methods) = match located {
            Some(ref found) => found.defined_names(&lines),
            None => (HashSet::new(), HashSet::new()),
        };

        let fields: Vec<Vec<String>> = members(&class.fields)
            .into_iter()
            .filter(|member| !member.name.as_deref().is_some_and(|n| defined_fields.contains(n)))
            .map(|member| member.lines)
            .collect();
        let computes: Vec<Vec<String>> = members(&class.computes)
            .into_iter()
            .filter(|member| !member.name.as_deref().is_some_and(|n| defined_methods.contains(n)))
            .map(|member| member.lines)
            .collect();

        if fields.is_empty() && computes.is_empty() {
            return Ok(with_trailing_newline(lines.join("\n")));
        }

        let has_methods = !computes.is_empty();
        let mut block: Vec<String> = fields.into_iter().flatten().collect();
        for method in computes {
            if !block.is_empty() {
                block.push(String::new());
            }
            block.extend(method);
        }

        let insert_at = match &located {
            Some(LocatedClass {
                after_last_field: Some(index),
                ..
            }) => *index,
            Some(found) => {
                block.insert(0, String::new());
                lines[found.start..found.end]
                    .iter()
                    .rposition(|l| !l.trim().is_empty())
                    .map_or(found.end, |offset| found.start + offset + 1)
            }
            None => {
                warn!(file = %path.display(), model = %model, "[MERGE] Class not found, appending a new class");
                while lines.last().is_some_and(|l| l.trim().is_empty()) {
                    lines.pop();
                }
                let mut class_block: Vec<String> = Vec::new();
                if !lines.is_empty() {
                    class_block.extend([String::new(), String::new()]);
                }
                class_block.extend(class.header.lines().map(str::to_string));
                class_block.push(String::new());
                block.splice(0..0, class_block);
                lines.len()
            }
        };
        if has_methods && lines.get(insert_at).is_some_and(|l| !l.trim().is_empty()) {
            block.push(String::new());
        }
        lines.splice(insert_at..insert_at, block);
        Ok(with_trailing_newline(lines.join("\n")))
    }
}

fn with_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Line span of the class declaring or extending a model.
struct LocatedClass {
    start: usize,
    end: usize,
    /// Line index right after the last field statement of the class.
    after_last_field: Option<usize>,
}

impl LocatedClass {
    fn defined_names(&self, lines: &[String]) -> (HashSet<String>, HashSet<String>) {
        let mut fields = HashSet::new();
        let mut methods = HashSet::new();
        for line in &lines[self.start..self.end] {
            if let Some(name) = field_name(line) {
                fields.insert(name);
            } else if let Some(name) = method_name(line) {
                methods.insert(name);
            }
        }
        (fields, methods)
    }
}

fn identity_pattern(model: &str) -> Option<Regex> {
    Regex::new(&format!(
        r#"^\s+_(?:name|inherit)\s*=\s*['"]{}['"]"#,
        regex::escape(model)
    ))
    .ok()
}

fn field_name(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let (name, rest) = trimmed.split_once('=')?;
    let name = name.trim();
    let is_identifier = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    (is_identifier && rest.trim_start().starts_with("fields.")).then(|| name.to_string())
}

fn method_name(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix("def ")?;
    let name: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
    (!name.is_empty()).then_some(name)
}

fn locate_class(lines: &[String], model: &str) -> Option<LocatedClass> {
    let pattern = identity_pattern(model)?;
    let identity = lines.iter().position(|l| pattern.is_match(l))?;
    let start = lines[..identity]
        .iter()
        .rposition(|l| l.starts_with("class "))
        .unwrap_or(0);
    let end = lines[identity..]
        .iter()
        .position(|l| l.starts_with("class "))
        .map_or(lines.len(), |offset| identity + offset);

    let mut after_last_field = None;
    let mut i = start;
    while i < end {
        if field_name(&lines[i]).is_some() {
            let last = statement_end(lines, i, end);
            after_last_field = Some(last + 1);
            i = last + 1;
        } else {
            i += 1;
        }
    }
    Some(LocatedClass {
        start,
        end,
        after_last_field,
    })
}

/// Index of the last line of the statement starting at `first`.
fn statement_end(lines: &[String], first: usize, end: usize) -> usize {
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    for (index, line) in lines.iter().enumerate().take(end).skip(first) {
        let mut escaped = false;
        for c in line.chars() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '#' => break,
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        quote = None;
        if depth <= 0 {
            return index;
        }
    }
    end.saturating_sub(1).max(first)
}

/// One class-level statement of generated code, with its name.
struct Member {
    name: Option<String>,
    lines: Vec<String>,
}

/// Splits class-body text (four-space indented) into its statements:
/// decorators stay with their method, continuation lines with their start.
fn members(text: &str) -> Vec<Member> {
    let mut members: Vec<Member> = Vec::new();
    let mut pending_decorators: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if let (true, Some(current)) = (pending_decorators.is_empty(), members.last_mut()) {
                current.lines.push(String::new());
            }
            continue;
        }
        let top_level = line.starts_with("    ") && !line.starts_with("     ");
        let closing = line.trim_start().starts_with([')', ']', '}']);
        if top_level && !closing {
            if line.trim_start().starts_with('@') {
                pending_decorators.push(line.to_string());
                continue;
            }
            let name = method_name(line).or_else(|| field_name(line));
            let mut lines = std::mem::take(&mut pending_decorators);
            lines.push(line.to_string());
            members.push(Member { name, lines });
        } else if !pending_decorators.is_empty() {
            pending_decorators.push(line.to_string());
        } else if let Some(current) = members.last_mut() {
            current.lines.push(line.to_string());
        } else {
            pending_decorators.push(line.to_string());
        }
    }
    for member in &mut members {
        while member.lines.last().is_some_and(|l| l.is_empty()) {
            member.lines.pop();
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_members_with_decorators_and_continuations() {
        let text = "    @api.depends(\n        \"a\",\n    )\n    def _compute_x(self):\n        for record in self:\n            record.x = False\n";
        let members = members(text);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name.as_deref(), Some("_compute_x"));
        assert_eq!(members[0].lines.len(), 6);
    }

    #[test]
    fn finds_the_end_of_multiline_fields() {
        let lines: Vec<String> = "class A(models.Model):\n    _inherit = \"a\"\n\n    x = fields.Char(\n        \"X\",\n    )\n\n    def f(self):\n        pass"
            .lines()
            .map(str::to_string)
            .collect();
        let class = locate_class(&lines, "a").unwrap();
        assert_eq!(class.after_last_field, Some(6));
    }
}
