// src/extract.rs

use serde_json::{Map, Value};
use tracing::warn;

/// The two document kinds sharing one shape. They differ only in the
/// natural-key field and the target tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Invoice,
    CreditNote,
}

impl DocKind {
    /// JSON field holding the document's natural key.
    pub fn key_field(self) -> &'static str {
        match self {
            DocKind::Invoice => "numerofactura",
            DocKind::CreditNote => "numeronota",
        }
    }

    pub fn header_table(self) -> &'static str {
        match self {
            DocKind::Invoice => "invoices",
            DocKind::CreditNote => "credit_notes",
        }
    }

    pub fn line_table(self) -> &'static str {
        match self {
            DocKind::Invoice => "invoice_lines",
            DocKind::CreditNote => "credit_note_lines",
        }
    }
}

/// Fields that may hold the nested line-item array, in preference order.
const LINE_FIELDS: [&str; 2] = ["lineas", "items"];

/// One parent document split into its header and its line items.
#[derive(Debug)]
pub struct SplitDocument {
    /// The parent document with the line-item field removed.
    pub header: Map<String, Value>,
    /// Nested line-item mappings, each stamped with `parent_id` and a
    /// 1-based `position`.
    pub lines: Vec<Map<String, Value>>,
}

/// Split a parent document into a header record and positioned line items.
///
/// The first non-empty field among `lineas`/`items` supplies the line array.
/// Nested entries that are not JSON objects are dropped and do not consume
/// a position number; numbering is dense over the accepted entries, in
/// their original relative order.
pub fn split_document(kind: DocKind, mut doc: Map<String, Value>) -> SplitDocument {
    let entries = take_line_entries(&mut doc);

    let parent = doc
        .get(kind.key_field())
        .and_then(raw_key)
        .map(str::to_owned)
        .or_else(|| doc.get(kind.key_field()).and_then(numeric_key));

    let mut lines = Vec::new();
    match parent {
        Some(parent) => {
            for entry in entries {
                let Value::Object(mut item) = entry else {
                    warn!(kind = ?kind, parent = %parent, "Dropping non-object line entry");
                    continue;
                };
                item.insert("parent_id".to_string(), Value::String(parent.clone()));
                item.insert("position".to_string(), Value::from(lines.len() as i64 + 1));
                lines.push(item);
            }
        }
        None if !entries.is_empty() => {
            warn!(kind = ?kind, "Document has line items but no natural key — dropping lines");
        }
        None => {}
    }

    SplitDocument { header: doc, lines }
}

/// Remove and return the first non-empty line-item array; strips all line
/// fields from the header either way.
fn take_line_entries(doc: &mut Map<String, Value>) -> Vec<Value> {
    let mut found = Vec::new();
    for field in LINE_FIELDS {
        let Some(value) = doc.remove(field) else {
            continue;
        };
        if found.is_empty() {
            if let Value::Array(entries) = value {
                found = entries;
            }
        }
    }
    found
}

fn raw_key(value: &Value) -> Option<&str> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn numeric_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn positions_are_dense_and_one_based() {
        let doc = as_map(json!({
            "numerofactura": "F001",
            "lineas": [
                {"descripcion": "Lente A"},
                {"descripcion": "Lente B"},
                {"descripcion": "Lente C"},
            ],
        }));
        let split = split_document(DocKind::Invoice, doc);
        let positions: Vec<i64> = split
            .lines
            .iter()
            .map(|l| l["position"].as_i64().unwrap())
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(split.lines.iter().all(|l| l["parent_id"] == "F001"));
    }

    #[test]
    fn non_object_entries_do_not_consume_a_position() {
        let doc = as_map(json!({
            "numerofactura": "F002",
            "lineas": [{"descripcion": "A"}, "scalar", 7, {"descripcion": "B"}],
        }));
        let split = split_document(DocKind::Invoice, doc);
        assert_eq!(split.lines.len(), 2);
        assert_eq!(split.lines[0]["descripcion"], "A");
        assert_eq!(split.lines[0]["position"], 1);
        assert_eq!(split.lines[1]["descripcion"], "B");
        assert_eq!(split.lines[1]["position"], 2);
    }

    #[test]
    fn lineas_wins_over_items_when_non_empty() {
        let doc = as_map(json!({
            "numeronota": "N1",
            "lineas": [{"descripcion": "from lineas"}],
            "items": [{"descripcion": "from items"}],
        }));
        let split = split_document(DocKind::CreditNote, doc);
        assert_eq!(split.lines.len(), 1);
        assert_eq!(split.lines[0]["descripcion"], "from lineas");
        assert!(!split.header.contains_key("lineas"));
        assert!(!split.header.contains_key("items"));
    }

    #[test]
    fn empty_lineas_falls_back_to_items() {
        let doc = as_map(json!({
            "numerofactura": "F3",
            "lineas": [],
            "items": [{"descripcion": "kept"}],
        }));
        let split = split_document(DocKind::Invoice, doc);
        assert_eq!(split.lines.len(), 1);
        assert_eq!(split.lines[0]["descripcion"], "kept");
    }

    #[test]
    fn document_without_line_field_still_yields_header() {
        let doc = as_map(json!({"numerofactura": "F4", "total": 10.0, "cantidad_lineas": 2}));
        let split = split_document(DocKind::Invoice, doc);
        assert!(split.lines.is_empty());
        // line_count passes through as given, not recomputed
        assert_eq!(split.header["cantidad_lineas"], 2);
    }

    #[test]
    fn numeric_natural_key_is_accepted() {
        let doc = as_map(json!({"numerofactura": 1001, "lineas": [{"descripcion": "X"}]}));
        let split = split_document(DocKind::Invoice, doc);
        assert_eq!(split.lines[0]["parent_id"], "1001");
    }
}
