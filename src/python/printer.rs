use std::fmt::Write;

use super::{Expr, Stmt};

const INDENT: &str = "    ";

/// Prints statements as module-level python source.
///
/// Top-level definitions are separated by two blank lines, nested ones by a
/// single blank line. The result always ends with a newline unless empty.
pub fn unparse(stmts: &[Stmt]) -> String {
    unparse_at(stmts, 0)
}

/// Prints statements as the body of a block nested `depth` levels deep.
pub fn unparse_at(stmts: &[Stmt], depth: usize) -> String {
    let mut out = String::new();
    write_block(&mut out, stmts, depth);
    out
}

fn write_block(out: &mut String, stmts: &[Stmt], depth: usize) {
    let gap = if depth == 0 { 2 } else { 1 };
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 {
            let prev = &stmts[i - 1];
            let wants_gap = (stmt.is_definition() || prev.is_definition())
                && !matches!(stmt, Stmt::Blank)
                && !matches!(prev, Stmt::Blank);
            if wants_gap {
                for _ in 0..gap {
                    out.push('\n');
                }
            }
        }
        write_stmt(out, stmt, depth);
    }
}

fn write_body(out: &mut String, body: &[Stmt], depth: usize) {
    if body.iter().all(|s| matches!(s, Stmt::Blank)) {
        write_stmt(out, &Stmt::Pass, depth);
    } else {
        write_block(out, body, depth);
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    let pad = INDENT.repeat(depth);
    match stmt {
        Stmt::Assign { target, value } => {
            let _ = writeln!(out, "{pad}{} = {}", expr(target), expr(value));
        }
        Stmt::Expr(e) => {
            let _ = writeln!(out, "{pad}{}", expr(e));
        }
        Stmt::ClassDef { name, bases, body } => {
            if bases.is_empty() {
                let _ = writeln!(out, "{pad}class {name}:");
            } else {
                let bases: Vec<String> = bases.iter().map(expr).collect();
                let _ = writeln!(out, "{pad}class {name}({}):", bases.join(", "));
            }
            write_body(out, body, depth + 1);
        }
        Stmt::FunctionDef {
            name,
            args,
            decorators,
            body,
        } => {
            for decorator in decorators {
                let _ = writeln!(out, "{pad}@{}", expr(decorator));
            }
            let _ = writeln!(out, "{pad}def {name}({}):", args.join(", "));
            write_body(out, body, depth + 1);
        }
        Stmt::For {
            targets,
            iter,
            body,
        } => {
            let _ = writeln!(out, "{pad}for {} in {}:", targets.join(", "), expr(iter));
            write_body(out, body, depth + 1);
        }
        Stmt::Pass => {
            let _ = writeln!(out, "{pad}pass");
        }
        Stmt::Verbatim(code) => write_verbatim(out, code, &pad),
        Stmt::Blank => out.push('\n'),
    }
}

/// Dedents `code` and re-indents it under `pad`.
fn write_verbatim(out: &mut String, code: &str, pad: &str) {
    let lines: Vec<&str> = code.lines().collect();
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| &l[..l.len() - l.trim_start().len()])
        .reduce(common_prefix)
        .unwrap_or("");
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    if start >= end {
        let _ = writeln!(out, "{pad}pass");
        return;
    }
    for line in &lines[start..end] {
        let line = line.trim_end();
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{pad}{}", line.strip_prefix(common).unwrap_or(line));
        }
    }
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8());
    &a[..len]
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Name(name) => name.clone(),
        Expr::Str(value) => quote(value),
        Expr::Bool(true) => "True".to_string(),
        Expr::Bool(false) => "False".to_string(),
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            let mut parts: Vec<String> = args.iter().map(expr).collect();
            parts.extend(keywords.iter().map(|(k, v)| format!("{k}={}", expr(v))));
            format!("{}({})", expr(func), parts.join(", "))
        }
        Expr::List(items) => {
            let items: Vec<String> = items.iter().map(expr).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::Tuple(items) => match items.as_slice() {
            [] => "()".to_string(),
            [single] => format!("({},)", expr(single)),
            _ => {
                let items: Vec<String> = items.iter().map(expr).collect();
                format!("({})", items.join(", "))
            }
        },
        Expr::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", expr(k), expr(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Expr::BinOp { left, op, right } => format!("{} {op} {}", expr(left), expr(right)),
    }
}

/// Python string literal, double quoted unless that needs more escapes.
pub fn quote(value: &str) -> String {
    let delimiter = if value.contains('"') && !value.contains('\'') {
        '\''
    } else {
        '"'
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(delimiter);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_decorated_method_with_loop() {
        let method = Stmt::FunctionDef {
            name: "_compute_total".to_string(),
            args: vec!["self".to_string()],
            decorators: vec![Expr::call("api.depends", vec![Expr::str("line_ids")])],
            body: vec![Stmt::for_each(
                &["record"],
                "self",
                vec![Stmt::assign("record.total", Expr::Bool(false))],
            )],
        };
        assert_eq!(
            unparse(&[method]),
            "@api.depends(\"line_ids\")\ndef _compute_total(self):\n    for record in self:\n        record.total = False\n"
        );
    }

    #[test]
    fn tuples_and_quotes() {
        let value = Expr::Tuple(vec![Expr::Tuple(vec![Expr::str("a"), Expr::str("say \"hi\"")])]);
        assert_eq!(unparse(&[Stmt::assign("t", value)]), "t = ((\"a\", 'say \"hi\"'),)\n");
    }

    #[test]
    fn verbatim_is_reindented() {
        let body = vec![Stmt::Verbatim("\n  for r in self:\n      r.x = 1\n".to_string())];
        assert_eq!(
            unparse(&[Stmt::method("_compute_x", body)]),
            "def _compute_x(self):\n    for r in self:\n        r.x = 1\n"
        );
    }

    #[test]
    fn verbatim_with_mismatched_wide_indents_is_kept_intact() {
        let body = vec![Stmt::Verbatim("\u{3000}x = 1\n  y = 2\n".to_string())];
        assert_eq!(
            unparse(&[Stmt::method("_compute_x", body)]),
            "def _compute_x(self):\n    \u{3000}x = 1\n      y = 2\n"
        );
    }
}
