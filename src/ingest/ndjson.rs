//! JSON array <-> newline-delimited records
//!
//! Schema-on-read engines reject one large JSON array per object, so each
//! page is stored with one record per line.

use serde_json::value::RawValue;

/// Parse a page body. Elements stay as raw JSON text.
pub fn parse_page(body: &str) -> Result<Vec<Box<RawValue>>, serde_json::Error> {
    serde_json::from_str(body)
}

/// Join records into NDJSON, preserving order. No trailing newline.
pub fn records_to_ndjson(records: &[Box<RawValue>]) -> String {
    let mut out = String::with_capacity(records.iter().map(|r| r.get().len() + 1).sum());
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let raw = record.get();
        if raw.contains(['\n', '\r']) {
            out.push_str(&compact(raw));
        } else {
            out.push_str(raw);
        }
    }
    out
}

/// Split stored NDJSON back into records, skipping blank lines
pub fn ndjson_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Drop insignificant whitespace from a valid JSON text. String contents
/// are copied verbatim, escapes included.
fn compact(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in raw.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ' ' | '\t' | '\n' | '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}
