// src/store.rs

use crate::extract::DocKind;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Result as SqliteResult, params};
use std::path::Path;
use tracing::info;

/// All tables managed by the store, headers before their line tables.
pub const TABLES: [&str; 4] = ["invoices", "invoice_lines", "credit_notes", "credit_note_lines"];

pub struct InvoiceStore {
    conn: Connection,
}

/// A top-level invoice or credit-note document stripped of its line items.
/// Absent numeric fields have already been defaulted to 0 at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub id: String,
    pub issue_date: Option<String>,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub net_value: f64,
    pub tax: f64,
    pub total: f64,
    pub line_count: i64,
}

/// One priced entry within a document, stamped with its parent's natural
/// key and a 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub parent_id: String,
    pub position: i64,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub discount_percent_amount: f64,
    pub line_total: f64,
    pub category: String,
    pub subcategory: String,
}

impl InvoiceStore {
    /// Open the store and ensure the four-table schema exists.
    /// Create-if-absent only; never drops existing data, so it is safe
    /// to call on every process start.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        for kind in [DocKind::Invoice, DocKind::CreditNote] {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id TEXT PRIMARY KEY,
                        issue_date TEXT,
                        subtotal REAL NOT NULL DEFAULT 0,
                        discount_amount REAL NOT NULL DEFAULT 0,
                        net_value REAL NOT NULL DEFAULT 0,
                        tax REAL NOT NULL DEFAULT 0,
                        total REAL NOT NULL DEFAULT 0,
                        line_count INTEGER NOT NULL DEFAULT 0,
                        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                    )",
                    kind.header_table()
                ),
                [],
            )?;

            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        parent_id TEXT NOT NULL,
                        position INTEGER NOT NULL,
                        description TEXT NOT NULL DEFAULT '',
                        quantity REAL NOT NULL DEFAULT 0,
                        unit_price REAL NOT NULL DEFAULT 0,
                        discount_percent_amount REAL NOT NULL DEFAULT 0,
                        line_total REAL NOT NULL DEFAULT 0,
                        category TEXT NOT NULL DEFAULT '',
                        subcategory TEXT NOT NULL DEFAULT '',
                        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                        FOREIGN KEY (parent_id) REFERENCES {}(id)
                    )",
                    kind.line_table(),
                    kind.header_table()
                ),
                [],
            )?;

            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{0}_parent ON {0}(parent_id)",
                    kind.line_table()
                ),
                [],
            )?;
        }

        info!("Database initialized successfully");
        Ok(Self { conn })
    }

    /// Insert or fully replace a header row keyed on its natural key.
    pub fn upsert_header(&self, kind: DocKind, header: &HeaderRecord) -> SqliteResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {}
                    (id, issue_date, subtotal, discount_amount, net_value, tax, total, line_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    issue_date = excluded.issue_date,
                    subtotal = excluded.subtotal,
                    discount_amount = excluded.discount_amount,
                    net_value = excluded.net_value,
                    tax = excluded.tax,
                    total = excluded.total,
                    line_count = excluded.line_count",
                kind.header_table()
            ),
            params![
                header.id,
                header.issue_date,
                header.subtotal,
                header.discount_amount,
                header.net_value,
                header.tax,
                header.total,
                header.line_count,
            ],
        )?;
        info!(id = %header.id, table = kind.header_table(), "Header stored");
        Ok(())
    }

    /// Append a line item with an auto-generated surrogate row id.
    pub fn insert_line(&self, kind: DocKind, line: &LineRecord) -> SqliteResult<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO {}
                    (parent_id, position, description, quantity, unit_price,
                     discount_percent_amount, line_total, category, subcategory)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                kind.line_table()
            ),
            params![
                line.parent_id,
                line.position,
                line.description,
                line.quantity,
                line.unit_price,
                line.discount_percent_amount,
                line.line_total,
                line.category,
                line.subcategory,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Remove all line items belonging to one parent. Used by the
    /// replace-lines-for-parent load mode.
    pub fn delete_lines_for_parent(&self, kind: DocKind, parent_id: &str) -> SqliteResult<usize> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE parent_id = ?1", kind.line_table()),
            params![parent_id],
        )?;
        if deleted > 0 {
            info!(parent_id = %parent_id, deleted = deleted, "Replaced existing lines");
        }
        Ok(deleted)
    }

    /// Get header by natural key.
    pub fn get_header(&self, kind: DocKind, id: &str) -> SqliteResult<Option<HeaderRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, issue_date, subtotal, discount_amount, net_value, tax, total, line_count
             FROM {}
             WHERE id = ?1",
            kind.header_table()
        ))?;

        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(HeaderRecord {
                id: row.get(0)?,
                issue_date: row.get(1)?,
                subtotal: row.get(2)?,
                discount_amount: row.get(3)?,
                net_value: row.get(4)?,
                tax: row.get(5)?,
                total: row.get(6)?,
                line_count: row.get(7)?,
            })),
            None => Ok(None),
        }
    }

    /// Get all line items for a parent, ordered by position.
    pub fn get_lines_for_parent(
        &self,
        kind: DocKind,
        parent_id: &str,
    ) -> SqliteResult<Vec<LineRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT parent_id, position, description, quantity, unit_price,
                    discount_percent_amount, line_total, category, subcategory
             FROM {}
             WHERE parent_id = ?1
             ORDER BY position",
            kind.line_table()
        ))?;

        let lines = stmt.query_map(params![parent_id], |row| {
            Ok(LineRecord {
                parent_id: row.get(0)?,
                position: row.get(1)?,
                description: row.get(2)?,
                quantity: row.get(3)?,
                unit_price: row.get(4)?,
                discount_percent_amount: row.get(5)?,
                line_total: row.get(6)?,
                category: row.get(7)?,
                subcategory: row.get(8)?,
            })
        })?;

        lines.collect()
    }

    /// Total row count of one table.
    pub fn count(&self, table: &str) -> SqliteResult<i64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
    }

    /// Row counts for all four tables, headers first.
    pub fn get_counts(&self) -> SqliteResult<(i64, i64, i64, i64)> {
        Ok((
            self.count("invoices")?,
            self.count("invoice_lines")?,
            self.count("credit_notes")?,
            self.count("credit_note_lines")?,
        ))
    }

    /// One representative row of a table, rendered as (column, value)
    /// display strings. Blobs are summarized by length.
    pub fn sample_row(&self, table: &str) -> SqliteResult<Option<Vec<(String, String)>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} LIMIT 1"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => {
                let mut cells = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    let rendered = match row.get_ref(i)? {
                        ValueRef::Null => "NULL".to_string(),
                        ValueRef::Integer(v) => v.to_string(),
                        ValueRef::Real(v) => v.to_string(),
                        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
                    };
                    cells.push((column.clone(), rendered));
                }
                Ok(Some(cells))
            }
            None => Ok(None),
        }
    }

    pub fn begin(&self) -> SqliteResult<()> {
        self.conn.execute_batch("BEGIN")
    }

    pub fn commit(&self) -> SqliteResult<()> {
        self.conn.execute_batch("COMMIT")
    }

    pub fn rollback(&self) -> SqliteResult<()> {
        self.conn.execute_batch("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InvoiceStore {
        InvoiceStore::new(":memory:").unwrap()
    }

    fn header(id: &str, total: f64) -> HeaderRecord {
        HeaderRecord {
            id: id.to_string(),
            issue_date: None,
            subtotal: 0.0,
            discount_amount: 0.0,
            net_value: 0.0,
            tax: 0.0,
            total,
            line_count: 0,
        }
    }

    fn line(parent_id: &str, position: i64) -> LineRecord {
        LineRecord {
            parent_id: parent_id.to_string(),
            position,
            description: String::new(),
            quantity: 0.0,
            unit_price: 0.0,
            discount_percent_amount: 0.0,
            line_total: 0.0,
            category: String::new(),
            subcategory: String::new(),
        }
    }

    #[test]
    fn header_upsert_is_idempotent_and_keeps_latest_values() {
        let db = store();
        db.upsert_header(DocKind::Invoice, &header("F1", 100.0))
            .unwrap();
        db.upsert_header(DocKind::Invoice, &header("F1", 250.0))
            .unwrap();

        assert_eq!(db.count("invoices").unwrap(), 1);
        let row = db.get_header(DocKind::Invoice, "F1").unwrap().unwrap();
        assert_eq!(row.total, 250.0);
    }

    #[test]
    fn line_insert_is_append_only() {
        let db = store();
        db.upsert_header(DocKind::Invoice, &header("F1", 0.0))
            .unwrap();
        db.insert_line(DocKind::Invoice, &line("F1", 1)).unwrap();
        db.insert_line(DocKind::Invoice, &line("F1", 1)).unwrap();
        assert_eq!(db.count("invoice_lines").unwrap(), 2);
    }

    #[test]
    fn delete_lines_for_parent_clears_only_that_parent() {
        let db = store();
        db.insert_line(DocKind::Invoice, &line("F1", 1)).unwrap();
        db.insert_line(DocKind::Invoice, &line("F1", 2)).unwrap();
        db.insert_line(DocKind::Invoice, &line("F2", 1)).unwrap();

        assert_eq!(db.delete_lines_for_parent(DocKind::Invoice, "F1").unwrap(), 2);
        assert_eq!(db.count("invoice_lines").unwrap(), 1);
        assert_eq!(
            db.get_lines_for_parent(DocKind::Invoice, "F2").unwrap().len(),
            1
        );
    }

    #[test]
    fn orphan_line_insert_is_permissive() {
        // FKs are declared but SQLite leaves enforcement off by default;
        // the pinned policy is permissive insert.
        let db = store();
        db.insert_line(DocKind::CreditNote, &line("N-MISSING", 1))
            .unwrap();
        assert_eq!(db.count("credit_note_lines").unwrap(), 1);
    }

    #[test]
    fn schema_creation_is_idempotent_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.db");

        {
            let db = InvoiceStore::new(&path).unwrap();
            db.upsert_header(DocKind::CreditNote, &header("N1", 5.0))
                .unwrap();
        }
        let db = InvoiceStore::new(&path).unwrap();
        assert_eq!(db.count("credit_notes").unwrap(), 1);
    }

    #[test]
    fn credit_note_tables_are_separate_from_invoice_tables() {
        let db = store();
        db.upsert_header(DocKind::Invoice, &header("F1", 1.0))
            .unwrap();
        db.upsert_header(DocKind::CreditNote, &header("F1", 2.0))
            .unwrap();
        let (invoices, _, credit_notes, _) = db.get_counts().unwrap();
        assert_eq!((invoices, credit_notes), (1, 1));
    }

    #[test]
    fn sample_row_renders_all_columns() {
        let db = store();
        let mut h = header("F9", 42.5);
        h.issue_date = Some("2025-01-03".to_string());
        db.upsert_header(DocKind::Invoice, &h).unwrap();

        let cells = db.sample_row("invoices").unwrap().unwrap();
        let get = |name: &str| {
            cells
                .iter()
                .find(|(c, _)| c == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("id"), "F9");
        assert_eq!(get("issue_date"), "2025-01-03");
        assert_eq!(get("total"), "42.5");
        assert!(db.sample_row("credit_notes").unwrap().is_none());
    }
}
