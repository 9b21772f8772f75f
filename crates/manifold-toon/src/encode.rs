//! JSON → TOON rendering

use serde_json::{Map, Value};

use crate::scalar::{is_bare_key, render_key, render_string};

/// Render a JSON value as TOON text
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(map) => encode_fields(&mut out, map, 0),
        Value::Array(items) => encode_array(&mut out, None, items, 0),
        primitive => {
            if let Some(text) = primitive_text(primitive) {
                push_line(&mut out, 0, &text);
            }
        }
    }
    out
}

fn push_line(out: &mut String, level: usize, text: &str) {
    for _ in 0..level {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}

fn primitive_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(render_string(s)),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn encode_fields(out: &mut String, map: &Map<String, Value>, level: usize) {
    for (key, value) in map {
        encode_field(out, key, value, level);
    }
}

fn encode_field(out: &mut String, key: &str, value: &Value, level: usize) {
    match value {
        Value::Array(items) => encode_array(out, Some(key), items, level),
        Value::Object(map) => {
            push_line(out, level, &format!("{}:", render_key(key)));
            encode_fields(out, map, level + 1);
        }
        primitive => {
            if let Some(text) = primitive_text(primitive) {
                push_line(out, level, &format!("{}: {text}", render_key(key)));
            }
        }
    }
}

fn encode_array(out: &mut String, key: Option<&str>, items: &[Value], level: usize) {
    let head = key.map(render_key).unwrap_or_default();
    if items.is_empty() {
        push_line(out, level, &format!("{head}[0]:"));
        return;
    }
    if let Some(cells) = items.iter().map(primitive_text).collect::<Option<Vec<_>>>() {
        push_line(out, level, &format!("{head}[{}]: {}", items.len(), cells.join(",")));
        return;
    }
    if let Some((fields, rows)) = tabular(items) {
        push_line(out, level, &format!("{head}[{}]{{{fields}}}:", items.len()));
        for row in rows {
            push_line(out, level + 1, &row);
        }
        return;
    }
    push_line(out, level, &format!("{head}[{}]:", items.len()));
    for item in items {
        encode_list_item(out, item, level + 1);
    }
}

/// Uniform arrays of flat objects collapse into header + rows. Returns
/// `None` unless every element is an object with the same bare-named keys
/// and only primitive values.
fn tabular(items: &[Value]) -> Option<(String, Vec<String>)> {
    let first = items.first()?.as_object()?;
    if first.is_empty() || !first.keys().all(|k| is_bare_key(k)) {
        return None;
    }
    let keys: Vec<&String> = first.keys().collect();
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        if obj.len() != keys.len() {
            return None;
        }
        let mut cells = Vec::with_capacity(keys.len());
        for key in &keys {
            cells.push(primitive_text(obj.get(*key)?)?);
        }
        rows.push(cells.join(","));
    }
    let header = keys.iter().map(|k| render_key(k)).collect::<Vec<_>>().join(",");
    Some((header, rows))
}

fn encode_list_item(out: &mut String, item: &Value, level: usize) {
    match item {
        Value::Array(items) => {
            // the array header rides on the hyphen line; its body nests
            // one level deeper than the hyphen
            let mut inner = String::new();
            encode_array(&mut inner, None, items, 0);
            splice_item(out, &inner, level);
        }
        Value::Object(map) if map.is_empty() => push_line(out, level, "-"),
        Value::Object(map) => {
            let mut inner = String::new();
            encode_fields(&mut inner, map, 0);
            splice_item(out, &inner, level);
        }
        primitive => {
            if let Some(text) = primitive_text(primitive) {
                push_line(out, level, &format!("- {text}"));
            }
        }
    }
}

/// Prefix a rendered block with `- `, shifting every line one level so the
/// item content sits at `level + 1`.
fn splice_item(out: &mut String, inner: &str, level: usize) {
    for (idx, line) in inner.lines().enumerate() {
        if idx == 0 {
            push_line(out, level, &format!("- {line}"));
        } else {
            push_line(out, level + 1, line);
        }
    }
}
