// src/error.rs

use thiserror::Error;

/// Errors surfaced by the load pipeline.
///
/// Malformed JSON lines never reach this enum — the record reader skips
/// them locally and keeps a counter instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// An expected input file does not exist. The stage reports it and
    /// yields zero counts; the pipeline continues.
    #[error("input file not found: {path}")]
    MissingFile { path: String },

    /// A field value could not be converted to its expected type.
    /// Skips the whole record, never the batch.
    #[error("cannot coerce field `{field}` from {value}")]
    Coercion { field: String, value: String },

    /// Underlying SQLite failure. Aborts the current stage; the current
    /// file's transaction rolls back, earlier commits stay.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub fn coercion(field: &str, value: impl Into<String>) -> Self {
        LoadError::Coercion {
            field: field.to_string(),
            value: value.into(),
        }
    }
}
