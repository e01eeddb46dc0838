//! Line-oriented recognizer for the few KiCad forms this crate edits.
//!
//! KiCad writes one form head per line, so tables, schematics and boards are
//! processed line by line. A line is recognized only if it opens one of:
//!
//! - `(lib (name "N")(type "K")(uri "U")(options "O")(descr "D"))`
//! - `(symbol (lib_id "Lib:Name")`
//! - `(property "Key" "Value" (id N) (at X Y A)`
//! - `(pin "Name" (`
//!
//! Anything else, including truncated or malformed forms, is skipped.

use super::sexp::{SExp, SExpParser};

#[derive(Debug, Clone, PartialEq)]
pub enum LineForm {
    Library(TableRecord),
    Instance { lib_id: String },
    Property(PropertyLine),
    Pin { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub name: String,
    pub kind: String,
    pub uri: String,
    pub options: String,
    pub descr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLine {
    pub key: String,
    pub value: String,
    pub id: Option<u32>,
    pub at: Option<Placement>,
}

/// Coordinates kept as written so rewritten lines reproduce them exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub x: String,
    pub y: String,
}

/// Parses the form opened on `line`, closing any lists left open.
pub fn scan_sexp(line: &str) -> Option<SExp> {
    let start = line.find('(')?;
    SExpParser::new(&line[start..]).parse_open().ok()
}

pub fn scan_line(line: &str) -> Option<LineForm> {
    if !line.trim_start().starts_with('(') {
        return None;
    }
    let sexp = scan_sexp(line)?;
    match sexp.head()? {
        "lib" => table_record(&sexp).map(LineForm::Library),
        "symbol" => {
            let lib_id = sexp.as_list()?.get(1)?;
            if lib_id.head() != Some("lib_id") {
                return None;
            }
            Some(LineForm::Instance {
                lib_id: lib_id.atom_at(1)?.to_string(),
            })
        }
        "property" => property_line(&sexp).map(LineForm::Property),
        "pin" => {
            let items = sexp.as_list()?;
            items.get(2)?.as_list()?;
            Some(LineForm::Pin {
                name: items.get(1)?.as_atom()?.to_string(),
            })
        }
        _ => None,
    }
}

fn table_record(sexp: &SExp) -> Option<TableRecord> {
    let name = sexp.string_value("name").filter(|s| !s.is_empty())?;
    let kind = sexp.string_value("type").filter(|s| !s.is_empty())?;
    let uri = sexp.string_value("uri").filter(|s| !s.is_empty())?;
    Some(TableRecord {
        name,
        kind,
        uri,
        options: sexp.string_value("options").unwrap_or_default(),
        descr: sexp.string_value("descr").unwrap_or_default(),
    })
}

fn property_line(sexp: &SExp) -> Option<PropertyLine> {
    let key = sexp.atom_at(1)?.to_string();
    let value = sexp.atom_at(2)?.to_string();
    let id = sexp.string_value("id").and_then(|id| id.parse().ok());
    let at = sexp.get("at").and_then(|at| {
        Some(Placement {
            x: at.atom_at(1)?.to_string(),
            y: at.atom_at(2)?.to_string(),
        })
    });
    Some(PropertyLine { key, value, id, at })
}

/// Quotes `value` the way KiCad writes string atoms.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Byte range of the `n`th quoted string on `line`, quotes included.
fn quoted_span(line: &str, n: usize) -> Option<(usize, usize)> {
    let mut seen = 0;
    let mut start = None;
    let mut escaped = false;
    for (i, ch) in line.char_indices() {
        match start {
            None if ch == '"' => start = Some(i),
            None => {}
            Some(_) if escaped => escaped = false,
            Some(_) if ch == '\\' => escaped = true,
            Some(open) if ch == '"' => {
                if seen == n {
                    return Some((open, i + 1));
                }
                seen += 1;
                start = None;
            }
            Some(_) => {}
        }
    }
    None
}

/// Replaces the value of a property line, leaving everything else as is.
pub fn replace_property_value(line: &str, value: &str) -> Option<String> {
    let (start, end) = quoted_span(line, 1)?;
    Some(format!("{}{}{}", &line[..start], quote(value), &line[end..]))
}

/// Leading whitespace of `line`.
pub fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
