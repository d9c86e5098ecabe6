// src/verify.rs

use crate::error::LoadError;
use crate::store::{InvoiceStore, TABLES};
use tracing::info;

/// Print the post-load verification report: per table, the total row count
/// and, when non-empty, one representative row. Read-only.
pub fn run_report(store: &InvoiceStore, sample_width: usize) -> Result<(), LoadError> {
    for table in TABLES {
        let count = store.count(table)?;
        info!(table = table, rows = count, "Table row count");
        println!("{table}: {count} rows");

        if count == 0 {
            continue;
        }
        if let Some(cells) = store.sample_row(table)? {
            println!("  sample row:");
            for (column, value) in cells {
                println!("    {column} = {}", truncate(&value, sample_width));
            }
        }
    }
    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &value[..idx]),
        None => value.to_string(),
    }
}
