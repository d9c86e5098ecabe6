// src/loader.rs

use crate::error::LoadError;
use crate::extract::{DocKind, split_document};
use crate::records::{RecordReader, excerpt};
use crate::store::{HeaderRecord, InvoiceStore, LineRecord};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// What to do with previously loaded line items for a re-loaded parent.
///
/// `Append` replicates the reference behavior: re-running a load duplicates
/// line items. `ReplacePerParent` clears a parent's lines before inserting
/// the new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Append,
    ReplacePerParent,
}

/// Counters for one file load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub headers: usize,
    pub lines: usize,
    /// Records dropped whole for coercion or constraint failures.
    pub skipped_records: usize,
    /// Input lines that were not valid JSON objects.
    pub parse_failures: usize,
    pub missing_file: bool,
}

/// Load one NDJSON file of parent documents into the store.
///
/// Runs inside a single transaction: a storage failure rolls the whole file
/// back, while coercion and constraint failures skip only the offending
/// record. A missing file yields zero counts and lets the pipeline continue.
pub fn load_file(
    store: &InvoiceStore,
    kind: DocKind,
    path: &Path,
    mode: LineMode,
) -> Result<LoadStats, LoadError> {
    let mut stats = LoadStats::default();

    let mut reader = match RecordReader::open(path) {
        Ok(reader) => reader,
        Err(LoadError::MissingFile { path }) => {
            warn!(path = %path, "Input file not found — skipping stage");
            stats.missing_file = true;
            return Ok(stats);
        }
        Err(e) => return Err(e),
    };

    info!(path = %path.display(), kind = ?kind, mode = ?mode, "Loading records");

    store.begin()?;
    while let Some(doc) = reader.next() {
        if let Err(e) = load_document(store, kind, doc, mode, &mut stats) {
            let _ = store.rollback();
            return Err(e);
        }
    }
    store.commit()?;

    stats.parse_failures = reader.skipped();
    info!(
        kind = ?kind,
        headers = stats.headers,
        lines = stats.lines,
        skipped = stats.skipped_records,
        parse_failures = stats.parse_failures,
        "Load complete"
    );
    Ok(stats)
}

fn load_document(
    store: &InvoiceStore,
    kind: DocKind,
    doc: Map<String, Value>,
    mode: LineMode,
    stats: &mut LoadStats,
) -> Result<(), LoadError> {
    let split = split_document(kind, doc);

    let header = match header_from_map(kind, &split.header) {
        Ok(header) => header,
        Err(e @ LoadError::Coercion { .. }) => {
            warn!(error = %e, record = %map_excerpt(&split.header), "Skipping header record");
            stats.skipped_records += 1;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match store.upsert_header(kind, &header) {
        Ok(()) => stats.headers += 1,
        Err(e) if is_constraint(&e) => {
            warn!(error = %e, id = %header.id, "Constraint rejected header — skipping");
            stats.skipped_records += 1;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    if mode == LineMode::ReplacePerParent {
        store.delete_lines_for_parent(kind, &header.id)?;
    }

    for item in &split.lines {
        let line = match line_from_map(item) {
            Ok(line) => line,
            Err(e @ LoadError::Coercion { .. }) => {
                warn!(error = %e, record = %map_excerpt(item), "Skipping line item");
                stats.skipped_records += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        match store.insert_line(kind, &line) {
            Ok(_) => stats.lines += 1,
            Err(e) if is_constraint(&e) => {
                warn!(error = %e, parent_id = %line.parent_id, "Constraint rejected line — skipping");
                stats.skipped_records += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Coerce a split header mapping into the fixed header column set.
pub fn header_from_map(
    kind: DocKind,
    map: &Map<String, Value>,
) -> Result<HeaderRecord, LoadError> {
    Ok(HeaderRecord {
        id: require_key(map, &[kind.key_field(), "id"])?,
        issue_date: optional_str(map, &["fechaemision", "issue_date"])?,
        subtotal: field_f64(map, &["subtotal"])?,
        discount_amount: field_f64(map, &["descuento", "discount_amount"])?,
        net_value: field_f64(map, &["valor_neto", "net_value"])?,
        tax: field_f64(map, &["iva", "tax"])?,
        total: field_f64(map, &["total"])?,
        line_count: field_i64(map, &["cantidad_lineas", "line_count"])?,
    })
}

/// Coerce one extracted line-item mapping into the fixed line column set.
pub fn line_from_map(map: &Map<String, Value>) -> Result<LineRecord, LoadError> {
    Ok(LineRecord {
        parent_id: require_key(map, &["parent_id"])?,
        position: field_i64(map, &["position"])?,
        description: field_str(map, &["descripcion", "description"])?,
        quantity: field_f64(map, &["cantidad", "quantity"])?,
        unit_price: field_f64(map, &["precio_unitario", "unit_price"])?,
        discount_percent_amount: field_f64(map, &["descuento_porcentaje", "discount_percent_amount"])?,
        line_total: field_f64(map, &["total_linea", "line_total"])?,
        category: field_str(map, &["clasificacion_categoria", "category"])?,
        subcategory: field_str(map, &["clasificacion_subcategoria", "subcategory"])?,
    })
}

// ---------------------------------------------------------------------------
// Defensive field extraction. Absent and null are equivalent; every field
// has a fixed default, per the target schema. Natural keys are the exception.
// ---------------------------------------------------------------------------

fn field_f64(map: &Map<String, Value>, names: &[&str]) -> Result<f64, LoadError> {
    for &name in names {
        match map.get(name) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => {
                return n
                    .as_f64()
                    .ok_or_else(|| LoadError::coercion(name, n.to_string()));
            }
            Some(Value::String(s)) => {
                return s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| LoadError::coercion(name, s.clone()));
            }
            Some(other) => return Err(LoadError::coercion(name, other.to_string())),
        }
    }
    Ok(0.0)
}

fn field_i64(map: &Map<String, Value>, names: &[&str]) -> Result<i64, LoadError> {
    for &name in names {
        match map.get(name) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => {
                return n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| LoadError::coercion(name, n.to_string()));
            }
            Some(Value::String(s)) => {
                return s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| LoadError::coercion(name, s.clone()));
            }
            Some(other) => return Err(LoadError::coercion(name, other.to_string())),
        }
    }
    Ok(0)
}

fn field_str(map: &Map<String, Value>, names: &[&str]) -> Result<String, LoadError> {
    Ok(optional_str(map, names)?.unwrap_or_default())
}

fn optional_str(map: &Map<String, Value>, names: &[&str]) -> Result<Option<String>, LoadError> {
    for &name in names {
        match map.get(name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(other) => return Err(LoadError::coercion(name, other.to_string())),
        }
    }
    Ok(None)
}

/// Natural keys are required and never defaulted.
fn require_key(map: &Map<String, Value>, names: &[&str]) -> Result<String, LoadError> {
    match optional_str(map, names)? {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(LoadError::coercion(names[0], "missing")),
    }
}

fn is_constraint(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn map_excerpt(map: &Map<String, Value>) -> String {
    let rendered = Value::Object(map.clone()).to_string();
    excerpt(&rendered).to_string()
}
