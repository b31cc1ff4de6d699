//! Ingestion Module - Reads tabular data files
//!
//! - `TabularData` / `CellValue`: decoded rows ready for the store
//! - `TabularDecoder`: the decoding seam used by the loader
//! - `CsvDecoder`: header-row CSV files
//! - `list_columns`: header introspection for a data directory

pub mod columns;
pub mod csv_decoder;

pub use columns::{list_columns, FileColumns};
pub use csv_decoder::CsvDecoder;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File suffix recognised as a data file.
pub const DATA_FILE_SUFFIX: &str = ".csv";

/// A single decoded cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    /// The field exactly as written; only an empty field becomes NULL.
    /// Conversion is left to the declared affinity of the target column.
    pub fn from_field(raw: &str) -> Self {
        if raw.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    /// Guess the type of a field: empty -> NULL, then integer, float, text.
    /// Only used to pick column affinity for tables created from a header.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Real(f);
            }
        }

        CellValue::Text(trimmed.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Rows of one data file, keyed by the header row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularData {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Why a data file could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Nothing to parse: the file has no header row at all.
    #[error("no columns to parse from {0}")]
    NoData(PathBuf),

    #[error("malformed data in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Decoding seam between the loader and the file format.
pub trait TabularDecoder {
    fn decode(&self, path: &Path) -> Result<TabularData, DecodeError>;
}

impl<T: TabularDecoder + ?Sized> TabularDecoder for &T {
    fn decode(&self, path: &Path) -> Result<TabularData, DecodeError> {
        (**self).decode(path)
    }
}

/// Regular files in `dir` ending in `.csv`, sorted by file name.
pub fn list_data_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_data_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(DATA_FILE_SUFFIX))
            .unwrap_or(false);
        if is_data_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
