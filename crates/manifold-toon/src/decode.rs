//! TOON → JSON parsing
//!
//! Recursive descent over an indentation-structured line list. Two spaces
//! per level; a `- ` item prefix counts as one level for the content it
//! introduces.

use serde_json::{Map, Value};

use crate::ToonError;
use crate::scalar::{parse_quoted, parse_scalar, split_cells};

/// Parse TOON text back into a JSON value
pub fn decode(input: &str) -> Result<Value, ToonError> {
    let lines = scan_lines(input)?;
    let mut parser = Parser { lines, pos: 0 };
    parser.parse_root()
}

struct Line<'a> {
    number: usize,
    level: usize,
    text: &'a str,
}

fn scan_lines(input: &str) -> Result<Vec<Line<'_>>, ToonError> {
    let mut lines = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let stripped = raw.trim_start_matches(' ');
        let indent = raw.len() - stripped.len();
        if stripped.starts_with('\t') {
            return Err(err_at(idx + 1, "tab in indentation"));
        }
        if indent % 2 != 0 {
            return Err(err_at(idx + 1, "indentation is not a multiple of two spaces"));
        }
        lines.push(Line {
            number: idx + 1,
            level: indent / 2,
            text: stripped.trim_end(),
        });
    }
    Ok(lines)
}

fn err_at(line: usize, message: impl Into<String>) -> ToonError {
    ToonError::Parse {
        line,
        message: message.into(),
    }
}

/// Parsed shape of a `key…:` line
struct FieldHead<'a> {
    key: String,
    header: Option<ArrayHeader>,
    rest: &'a str,
}

/// The `[N]` and optional `{fields}` part of an array header
struct ArrayHeader {
    len: usize,
    fields: Option<Vec<String>>,
}

struct Parser<'input> {
    lines: Vec<Line<'input>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn peek(&self) -> Option<&Line<'input>> {
        self.lines.get(self.pos)
    }

    fn parse_root(&mut self) -> Result<Value, ToonError> {
        let Some(first) = self.peek() else {
            return Ok(Value::Object(Map::new()));
        };
        let (number, level, text) = (first.number, first.level, first.text);
        if level != 0 {
            return Err(err_at(number, "unexpected indentation at top level"));
        }
        let value = if text.starts_with('[') {
            let (header, rest) = parse_array_header(text).map_err(|m| err_at(number, m))?;
            self.pos += 1;
            self.parse_array_body(0, &header, rest, number)?
        } else if matches!(parse_field_head(text), Ok(Some(_))) {
            Value::Object(self.parse_object(0)?)
        } else {
            self.pos += 1;
            parse_scalar(text).map_err(|m| err_at(number, m))?
        };
        if let Some(line) = self.peek() {
            return Err(err_at(line.number, "unexpected trailing content"));
        }
        Ok(value)
    }

    fn parse_object(&mut self, level: usize) -> Result<Map<String, Value>, ToonError> {
        let mut map = Map::new();
        while let Some(line) = self.peek() {
            if line.level < level {
                break;
            }
            let (number, text) = (line.number, line.text);
            if line.level > level {
                return Err(err_at(number, "unexpected indentation"));
            }
            let head = parse_field_head(text)
                .map_err(|m| err_at(number, m))?
                .ok_or_else(|| err_at(number, "expected a key"))?;
            self.pos += 1;
            let value = self.parse_field_value(level, &head, number)?;
            map.insert(head.key, value);
        }
        Ok(map)
    }

    fn parse_field_value(&mut self, level: usize, head: &FieldHead<'_>, number: usize) -> Result<Value, ToonError> {
        if let Some(header) = &head.header {
            return self.parse_array_body(level, header, head.rest, number);
        }
        if !head.rest.is_empty() {
            return parse_scalar(head.rest).map_err(|m| err_at(number, m));
        }
        // bare `key:` opens a nested object, or stands for an empty one
        if self.peek().is_some_and(|l| l.level == level + 1) {
            return Ok(Value::Object(self.parse_object(level + 1)?));
        }
        Ok(Value::Object(Map::new()))
    }

    fn parse_array_body(
        &mut self,
        level: usize,
        header: &ArrayHeader,
        rest: &str,
        number: usize,
    ) -> Result<Value, ToonError> {
        if let Some(fields) = &header.fields {
            return self.parse_table_rows(level, header.len, fields, number);
        }
        if !rest.is_empty() {
            let cells = split_cells(rest).map_err(|m| err_at(number, m))?;
            if cells.len() != header.len {
                return Err(ToonError::LengthMismatch {
                    line: number,
                    declared: header.len,
                    found: cells.len(),
                });
            }
            let mut items = Vec::with_capacity(cells.len());
            for cell in &cells {
                items.push(parse_scalar(cell).map_err(|m| err_at(number, m))?);
            }
            return Ok(Value::Array(items));
        }
        if header.len == 0 {
            return Ok(Value::Array(Vec::new()));
        }
        let mut items = Vec::with_capacity(header.len);
        for found in 0..header.len {
            if !self.peek().is_some_and(|l| l.level == level + 1) {
                return Err(ToonError::LengthMismatch {
                    line: number,
                    declared: header.len,
                    found,
                });
            }
            items.push(self.parse_list_item(level + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn parse_table_rows(
        &mut self,
        level: usize,
        len: usize,
        fields: &[String],
        number: usize,
    ) -> Result<Value, ToonError> {
        let mut items = Vec::with_capacity(len);
        for found in 0..len {
            let mismatch = ToonError::LengthMismatch {
                line: number,
                declared: len,
                found,
            };
            let Some(line) = self.peek() else {
                return Err(mismatch);
            };
            if line.level != level + 1 {
                return Err(mismatch);
            }
            let (row_number, text) = (line.number, line.text);
            let cells = split_cells(text).map_err(|m| err_at(row_number, m))?;
            if cells.len() != fields.len() {
                return Err(err_at(
                    row_number,
                    format!("row has {} cells, header declares {}", cells.len(), fields.len()),
                ));
            }
            let mut obj = Map::new();
            for (field, cell) in fields.iter().zip(&cells) {
                obj.insert(field.clone(), parse_scalar(cell).map_err(|m| err_at(row_number, m))?);
            }
            self.pos += 1;
            items.push(Value::Object(obj));
        }
        Ok(Value::Array(items))
    }

    fn parse_list_item(&mut self, level: usize) -> Result<Value, ToonError> {
        let Some(line) = self.peek() else {
            let last = self.lines.last().map_or(0, |l| l.number);
            return Err(err_at(last, "unexpected end of input in list"));
        };
        let (number, text) = (line.number, line.text);
        if !text.starts_with('-') {
            return Err(err_at(number, "expected `-` list item"));
        }
        let content_level = level + 1;
        if text == "-" {
            self.pos += 1;
            // bare hyphen: object fields nested below, or an empty object
            if self.peek().is_some_and(|l| l.level == content_level) {
                return Ok(Value::Object(self.parse_object(content_level)?));
            }
            return Ok(Value::Object(Map::new()));
        }
        let Some(rest) = text.strip_prefix("- ") else {
            return Err(err_at(number, "malformed list item"));
        };
        if rest.starts_with('[') {
            let (header, inline) = parse_array_header(rest).map_err(|m| err_at(number, m))?;
            self.pos += 1;
            return self.parse_array_body(content_level, &header, inline, number);
        }
        // a field head opens an object item; anything else is a scalar
        if let Ok(Some(head)) = parse_field_head(rest) {
            self.pos += 1;
            let first = self.parse_field_value(content_level, &head, number)?;
            let mut map = Map::new();
            map.insert(head.key, first);
            while let Some(line) = self.peek() {
                if line.level != content_level {
                    break;
                }
                let (field_number, field_text) = (line.number, line.text);
                let head = parse_field_head(field_text)
                    .map_err(|m| err_at(field_number, m))?
                    .ok_or_else(|| err_at(field_number, "expected a key"))?;
                self.pos += 1;
                let value = self.parse_field_value(content_level, &head, field_number)?;
                map.insert(head.key, value);
            }
            return Ok(Value::Object(map));
        }
        self.pos += 1;
        parse_scalar(rest).map_err(|m| err_at(number, m))
    }
}

/// Parse the `key` / `key[N]` / `key[N]{a,b}` prefix of a field line.
/// Returns `Ok(None)` when the line cannot be a field at all.
fn parse_field_head(text: &str) -> Result<Option<FieldHead<'_>>, String> {
    let (key, after_key) = if text.starts_with('"') {
        let (key, rest) = parse_quoted(text)?;
        (key, rest)
    } else {
        let Some(idx) = text.find(['[', ':']) else {
            return Ok(None);
        };
        let key = text[..idx].trim_end();
        if key.is_empty() && text[idx..].starts_with('[') {
            // keyless array headers are not fields
            return Ok(None);
        }
        (key.to_string(), &text[idx..])
    };
    if let Some(rest) = after_key.strip_prefix(':') {
        return Ok(Some(FieldHead {
            key,
            header: None,
            rest: rest.trim_start(),
        }));
    }
    if after_key.starts_with('[') {
        let (header, rest) = parse_array_header(after_key)?;
        return Ok(Some(FieldHead {
            key,
            header: Some(header),
            rest,
        }));
    }
    Ok(None)
}

/// Parse a `[N]` or `[N]{a,b}` header plus the trailing `:`, returning the
/// header and whatever follows the colon.
fn parse_array_header(text: &str) -> Result<(ArrayHeader, &str), String> {
    let inner = text.strip_prefix('[').ok_or("expected `[`")?;
    let close = inner.find(']').ok_or("unterminated array length")?;
    let len: usize = inner[..close]
        .parse()
        .map_err(|_| format!("invalid array length `{}`", &inner[..close]))?;
    let mut rest = &inner[close + 1..];
    let mut fields = None;
    if let Some(body) = rest.strip_prefix('{') {
        let close = body.find('}').ok_or("unterminated field list")?;
        let mut names = Vec::new();
        for cell in split_cells(&body[..close])? {
            if cell.starts_with('"') {
                let (name, leftover) = parse_quoted(&cell)?;
                if !leftover.is_empty() {
                    return Err("malformed field name".to_string());
                }
                names.push(name);
            } else {
                names.push(cell);
            }
        }
        fields = Some(names);
        rest = &body[close + 1..];
    }
    let rest = rest.strip_prefix(':').ok_or("expected `:` after array header")?;
    Ok((ArrayHeader { len, fields }, rest.trim_start()))
}
