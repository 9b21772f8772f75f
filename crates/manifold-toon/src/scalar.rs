//! Scalar rendering and parsing shared by the encoder and decoder

use serde_json::{Number, Value};

/// Render a string, quoting only when the bare form would be ambiguous
pub(crate) fn render_string(s: &str) -> String {
    if needs_quoting(s) { quote(s) } else { s.to_string() }
}

/// Render an object key, bare where the identifier form allows
pub(crate) fn render_key(key: &str) -> String {
    if is_bare_key(key) { key.to_string() } else { quote(key) }
}

pub(crate) fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else { return false };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn needs_quoting(s: &str) -> bool {
    if s.is_empty() || s != s.trim() {
        return true;
    }
    if matches!(s, "true" | "false" | "null") || looks_numeric(s) {
        return true;
    }
    if s.starts_with('-') || s.starts_with('[') || s.starts_with('{') || s.starts_with('"') {
        return true;
    }
    s.chars().any(|c| matches!(c, ',' | ':') || c.is_control())
}

/// Matches the number grammar the decoder accepts: optional sign, digits,
/// optional fraction, optional exponent. Anything looser (inf, nan, hex)
/// stays a string.
pub(crate) fn looks_numeric(s: &str) -> bool {
    let rest = s.strip_prefix('-').unwrap_or(s);
    let mut chars = rest.char_indices().peekable();
    let mut digits = 0;
    while let Some((_, c)) = chars.peek() {
        if c.is_ascii_digit() {
            digits += 1;
            chars.next();
        } else {
            break;
        }
    }
    if digits == 0 {
        return false;
    }
    if let Some((_, '.')) = chars.peek() {
        chars.next();
        let mut frac = 0;
        while let Some((_, c)) = chars.peek() {
            if c.is_ascii_digit() {
                frac += 1;
                chars.next();
            } else {
                break;
            }
        }
        if frac == 0 {
            return false;
        }
    }
    if let Some((_, 'e' | 'E')) = chars.peek() {
        chars.next();
        if let Some((_, '+' | '-')) = chars.peek() {
            chars.next();
        }
        let mut exp = 0;
        while let Some((_, c)) = chars.peek() {
            if c.is_ascii_digit() {
                exp += 1;
                chars.next();
            } else {
                break;
            }
        }
        if exp == 0 {
            return false;
        }
    }
    chars.next().is_none()
}

pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parse a leading quoted string, returning the content and the remainder
/// after the closing quote.
pub(crate) fn parse_quoted(s: &str) -> Result<(String, &str), String> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => return Err("expected opening quote".to_string()),
    }
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &s[idx + 1..])),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'u')) => {
                    let start = idx + 2;
                    let hex = s.get(start..start + 4).ok_or("truncated \\u escape")?;
                    let code = u32::from_str_radix(hex, 16).map_err(|_| "invalid \\u escape")?;
                    let c = char::from_u32(code).ok_or("invalid \\u escape")?;
                    out.push(c);
                    for _ in 0..4 {
                        chars.next();
                    }
                }
                _ => return Err("invalid escape".to_string()),
            },
            c => out.push(c),
        }
    }
    Err("unterminated string".to_string())
}

/// Parse one complete scalar token
pub(crate) fn parse_scalar(token: &str) -> Result<Value, String> {
    if token.starts_with('"') {
        let (content, rest) = parse_quoted(token)?;
        if !rest.trim().is_empty() {
            return Err("unexpected content after closing quote".to_string());
        }
        return Ok(Value::String(content));
    }
    match token {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if looks_numeric(token) {
        return parse_number(token);
    }
    Ok(Value::String(token.to_string()))
}

fn parse_number(token: &str) -> Result<Value, String> {
    if !token.contains(['.', 'e', 'E']) {
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Value::Number(Number::from(n)));
        }
        if let Ok(n) = token.parse::<u64>() {
            return Ok(Value::Number(Number::from(n)));
        }
    }
    let parsed: f64 = token.parse().map_err(|_| format!("invalid number `{token}`"))?;
    Number::from_f64(parsed)
        .map(Value::Number)
        .ok_or_else(|| format!("number out of range `{token}`"))
}

/// Split a comma-separated cell list, honoring quoted cells
pub(crate) fn split_cells(s: &str) -> Result<Vec<String>, String> {
    let mut cells = Vec::new();
    let mut rest = s;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with('"') {
            let (content, after) = parse_quoted(trimmed)?;
            // re-wrap so parse_scalar still sees a quoted token and
            // "true" does not collapse into the boolean
            cells.push(quote(&content));
            let after = after.trim_start();
            if after.is_empty() {
                return Ok(cells);
            }
            rest = after
                .strip_prefix(',')
                .ok_or("expected comma after quoted cell")?;
        } else if let Some(idx) = trimmed.find(',') {
            cells.push(trimmed[..idx].trim().to_string());
            rest = &trimmed[idx + 1..];
        } else {
            cells.push(trimmed.trim().to_string());
            return Ok(cells);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_detection_is_strict() {
        assert!(looks_numeric("0"));
        assert!(looks_numeric("-12"));
        assert!(looks_numeric("3.5"));
        assert!(looks_numeric("1e9"));
        assert!(looks_numeric("2.5E-3"));
        assert!(!looks_numeric("1."));
        assert!(!looks_numeric(".5"));
        assert!(!looks_numeric("1e"));
        assert!(!looks_numeric("inf"));
        assert!(!looks_numeric("nan"));
        assert!(!looks_numeric("0x10"));
        assert!(!looks_numeric("+5"));
        assert!(!looks_numeric(""));
    }

    #[test]
    fn quoting_escapes_and_restores() {
        let original = "a \"b\"\nc\\d\te";
        let quoted = quote(original);
        let (parsed, rest) = parse_quoted(&quoted).unwrap();
        assert_eq!(parsed, original);
        assert!(rest.is_empty());
    }

    #[test]
    fn split_cells_honors_quotes() {
        let cells = split_cells("1,\"a,b\",c").unwrap();
        assert_eq!(cells, vec!["1", "\"a,b\"", "c"]);
        assert_eq!(parse_scalar(&cells[1]).unwrap(), serde_json::json!("a,b"));
    }

    #[test]
    fn scalar_parsing_distinguishes_quoted_keywords() {
        assert_eq!(parse_scalar("true").unwrap(), serde_json::json!(true));
        assert_eq!(parse_scalar("\"true\"").unwrap(), serde_json::json!("true"));
        assert_eq!(parse_scalar("42").unwrap(), serde_json::json!(42));
        assert_eq!(parse_scalar("\"42\"").unwrap(), serde_json::json!("42"));
        assert_eq!(parse_scalar("plain").unwrap(), serde_json::json!("plain"));
    }
}
