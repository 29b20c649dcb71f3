//! Decoding of domain filters written as python literals in the export
//! configuration (`[('state', '=', 'manual'), ('id', 'in', [1, 2])]`).

use serde_json::{json, Value};

use crate::error::ConfigError;

/// Parses a python literal domain into JSON terms.
pub fn parse_domain(source: &str) -> Result<Vec<Value>, ConfigError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let json_text = python_literal_to_json(trimmed).map_err(|reason| ConfigError::Domain {
        domain: source.to_string(),
        reason,
    })?;
    match serde_json::from_str::<Value>(&json_text) {
        Ok(Value::Array(terms)) => Ok(terms),
        Ok(_) => Err(ConfigError::Domain {
            domain: source.to_string(),
            reason: "a domain must be a list".to_string(),
        }),
        Err(e) => Err(ConfigError::Domain {
            domain: source.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// `(field, "in", ids)` term.
pub fn in_term(field: &str, ids: &[i64]) -> Value {
    json!([field, "in", ids])
}

/// `(field, "not in", ids)` term.
pub fn not_in_term(field: &str, ids: &[i64]) -> Value {
    json!([field, "not in", ids])
}

/// Rewrites tuples into lists, single-quoted strings into double-quoted
/// ones and `True`/`False`/`None` into their JSON spelling.
fn python_literal_to_json(source: &str) -> Result<String, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err("unterminated string".to_string());
                    };
                    match ch {
                        '\\' => {
                            let next = chars.get(i + 1).copied().ok_or("dangling escape")?;
                            if next == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(next);
                            }
                            i += 2;
                        }
                        '"' if quote == '\'' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        ch if ch == quote => {
                            out.push('"');
                            i += 1;
                            break;
                        }
                        ch => {
                            out.push(ch);
                            i += 1;
                        }
                    }
                }
            }
            '(' => {
                out.push('[');
                i += 1;
            }
            ')' => {
                trim_trailing_comma(&mut out);
                out.push(']');
                i += 1;
            }
            ']' | '}' => {
                trim_trailing_comma(&mut out);
                out.push(c);
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    other => return Err(format!("unsupported name '{other}'")),
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tuples_and_constants() {
        let domain = parse_domain("[('state', '=', 'manual'), ('active', '!=', False)]").unwrap();
        assert_eq!(domain, vec![json!(["state", "=", "manual"]), json!(["active", "!=", false])]);
    }

    #[test]
    fn single_element_tuple_and_nested_quotes() {
        let domain = parse_domain("[('name', 'ilike', \"it's\",), ('id', 'in', (1, 2,))]").unwrap();
        assert_eq!(domain, vec![json!(["name", "ilike", "it's"]), json!(["id", "in", [1, 2]])]);
    }

    #[test]
    fn empty_and_invalid() {
        assert!(parse_domain("").unwrap().is_empty());
        assert!(parse_domain("[]").unwrap().is_empty());
        assert!(parse_domain("[('a', '=', foo)]").is_err());
        assert!(parse_domain("{'a': 1}").is_err());
    }
}
