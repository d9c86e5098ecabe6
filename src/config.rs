use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_invoices_file")]
    pub invoices_file: String,
    #[serde(default = "default_credit_notes_file")]
    pub credit_notes_file: String,
    /// Display width for sample-row values in the verification report.
    #[serde(default = "default_sample_width")]
    pub sample_width: usize,
}

fn default_db_path() -> String {
    "datastore/invoices.db".to_string()
}

fn default_invoices_file() -> String {
    "data/invoices.jsonl".to_string()
}

fn default_credit_notes_file() -> String {
    "data/credit_notes.jsonl".to_string()
}

fn default_sample_width() -> usize {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            invoices_file: default_invoices_file(),
            credit_notes_file: default_credit_notes_file(),
            sample_width: default_sample_width(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config file if present, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Bad config file — using defaults");
                Self::default()
            }
        }
    }
}
