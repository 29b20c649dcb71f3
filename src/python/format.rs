use crate::error::FormatError;

/// Column limit before a statement gets wrapped.
pub const LINE_LENGTH: usize = 120;

/// Per-line facts gathered by [`scan`].
#[derive(Debug, Clone, Copy)]
struct LineState {
    /// Bracket depth before the first character of the line.
    depth: usize,
    /// Whether the line starts inside a triple-quoted string.
    in_string: bool,
}

/// Checks bracket and string balance, strips trailing whitespace and wraps
/// over-long self-contained statements by exploding their outermost bracket.
pub fn format_source(code: &str) -> Result<String, FormatError> {
    let states = scan(code)?;
    let mut out = String::with_capacity(code.len());
    for (line, state) in code.lines().zip(states) {
        if state.in_string {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let line = line.trim_end();
        if state.depth == 0 && line.chars().count() > LINE_LENGTH {
            for wrapped in wrap(line) {
                out.push_str(&wrapped);
                out.push('\n');
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Formats `code`, keeping the raw text when it does not format.
pub fn prettify(code: &str) -> String {
    match format_source(code) {
        Ok(formatted) => formatted,
        Err(e) => {
            tracing::warn!(error = %e, "[FORMAT] Keeping unformatted code");
            code.to_string()
        }
    }
}

fn scan(code: &str) -> Result<Vec<LineState>, FormatError> {
    let mut states = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    // (quote, triple, starting line)
    let mut string: Option<(char, bool, usize)> = None;

    for (number, line) in code.lines().enumerate() {
        let number = number + 1;
        states.push(LineState {
            depth: stack.len(),
            in_string: string.is_some(),
        });
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if let Some((quote, triple, _)) = string {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    if !triple {
                        string = None;
                    } else if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                        string = None;
                        i += 2;
                    }
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    string = Some((c, triple, number));
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(FormatError::Unbalanced { found: c, line: number });
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if let Some((_, false, start)) = string {
            let continued = line.ends_with('\\');
            if !continued {
                return Err(FormatError::UnterminatedString { line: start });
            }
        }
    }

    if let Some((_, _, start)) = string {
        return Err(FormatError::UnterminatedString { line: start });
    }
    if !stack.is_empty() {
        return Err(FormatError::Unclosed { count: stack.len() });
    }
    Ok(states)
}

/// Splits `line` on its outermost bracket, one argument per line with a
/// trailing comma, recursing into arguments that are still too long.
fn wrap(line: &str) -> Vec<String> {
    let Some(parts) = explode(line) else {
        return vec![line.to_string()];
    };
    let mut out = Vec::new();
    for part in parts {
        if part.chars().count() > LINE_LENGTH {
            out.extend(wrap(&part));
        } else {
            out.push(part);
        }
    }
    out
}

fn explode(line: &str) -> Option<Vec<String>> {
    let indent_len = line.len() - line.trim_start().len();
    let (pad, content) = line.split_at(indent_len);
    let chars: Vec<(usize, char)> = content.char_indices().collect();

    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut open: Option<usize> = None;
    let mut commas = Vec::new();
    let mut close: Option<usize> = None;
    let mut k = 0;
    while k < chars.len() {
        let (pos, c) = chars[k];
        if let Some(q) = quote {
            if c == '\\' {
                k += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            k += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return None,
            '(' | '[' | '{' => {
                if depth == 0 && open.is_none() {
                    open = Some(pos);
                }
                depth += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && open.is_some() && close.is_none() {
                    close = Some(pos);
                }
            }
            ',' if depth == 1 && open.is_some() && close.is_none() => commas.push(pos),
            _ => {}
        }
        k += 1;
    }
    let open = open?;
    let close = close?;

    let rest = content[close + 1..].trim();
    if !matches!(rest, "" | ":" | ",") {
        return None;
    }

    let head = &content[..=open];
    let opener = content[open..].chars().next()?;
    let preceding = content[..open].trim_end().chars().last();
    let is_call_or_index = preceding.is_some_and(|p| p.is_alphanumeric() || matches!(p, '_' | ')' | ']'));
    // Subscripts change meaning with a trailing comma.
    if opener == '[' && is_call_or_index {
        return None;
    }

    let mut args = Vec::new();
    let mut start = open + 1;
    for &comma in &commas {
        args.push(content[start..comma].trim().to_string());
        start = comma + 1;
    }
    args.push(content[start..close].trim().to_string());
    let had_trailing_comma = args.last().is_some_and(String::is_empty);
    args.retain(|a| !a.is_empty());
    if args.is_empty() {
        return None;
    }
    // Parenthesised grouping of one expression: no trailing comma.
    let grouping = opener == '(' && !is_call_or_index && args.len() == 1 && !had_trailing_comma;

    let inner_pad = format!("{pad}    ");
    let mut out = vec![format!("{pad}{head}")];
    for arg in args {
        if grouping {
            out.push(format!("{inner_pad}{arg}"));
        } else {
            out.push(format!("{inner_pad}{arg},"));
        }
    }
    out.push(format!("{pad}{}", &content[close..]));
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_long_field_declaration() {
        let long = format!(
            "partner_code = fields.Char(string=\"{}\", required=True, readonly=True)\n",
            "A".repeat(90)
        );
        let formatted = format_source(&long).unwrap();
        assert_eq!(
            formatted,
            format!(
                "partner_code = fields.Char(\n    string=\"{}\",\n    required=True,\n    readonly=True,\n)\n",
                "A".repeat(90)
            )
        );
    }

    #[test]
    fn short_lines_only_lose_trailing_whitespace() {
        assert_eq!(format_source("x = 1   \n\ny = (2, 3)\n").unwrap(), "x = 1\n\ny = (2, 3)\n");
    }

    #[test]
    fn reports_imbalance() {
        assert_eq!(
            format_source("x = (1, 2]\n"),
            Err(FormatError::Unbalanced { found: ']', line: 1 })
        );
        assert_eq!(format_source("x = (1,\n"), Err(FormatError::Unclosed { count: 1 }));
        assert_eq!(
            format_source("x = 'abc\n"),
            Err(FormatError::UnterminatedString { line: 1 })
        );
    }

    #[test]
    fn brackets_inside_strings_and_comments_are_ignored() {
        let code = "x = \"(\"  # )\ny = \"\"\"\n]\n\"\"\"\n";
        assert_eq!(format_source(code).unwrap(), "x = \"(\"  # )\ny = \"\"\"\n]\n\"\"\"\n");
    }

    #[test]
    fn prettify_falls_back_to_raw_text() {
        assert_eq!(prettify("    x = (\n"), "    x = (\n");
    }
}
