//! Load units and their discovery.

use crate::error::{GeneratorError, Result};
use crate::ingestion::{list_data_files, DATA_FILE_SUFFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lifecycle of a load unit. Only `Pending` units sit in the retry queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    /// Loaded, or empty and therefore nothing to load
    Done,
    /// Ran out of attempts on retryable failures
    Abandoned,
    /// Failed in a way retrying cannot fix
    Dropped,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitStatus::Pending)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Pending => write!(f, "pending"),
            UnitStatus::Done => write!(f, "done"),
            UnitStatus::Abandoned => write!(f, "abandoned"),
            UnitStatus::Dropped => write!(f, "dropped"),
        }
    }
}

/// One data file mapped to one target table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadUnit {
    pub name: String,
    pub path: PathBuf,
    pub target_table: String,
    pub attempt_count: usize,
    pub status: UnitStatus,
    pub rows_inserted: usize,
    pub last_error: Option<String>,
}

impl LoadUnit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target_table = target_table_for(&name).to_string();
        Self {
            name,
            path,
            target_table,
            attempt_count: 0,
            status: UnitStatus::Pending,
            rows_inserted: 0,
            last_error: None,
        }
    }
}

/// Table name for a data file: the file name without its `.csv` suffix.
pub fn target_table_for(file_name: &str) -> &str {
    file_name
        .strip_suffix(DATA_FILE_SUFFIX)
        .unwrap_or(file_name)
}

/// Scan `data_dir` once for data files.
///
/// A missing directory yields no units.
pub fn discover_units(data_dir: &Path) -> Result<Vec<LoadUnit>> {
    if !data_dir.is_dir() {
        warn!("Data directory {} does not exist, nothing to load", data_dir.display());
        return Ok(Vec::new());
    }

    let files = list_data_files(data_dir).map_err(|e| {
        GeneratorError::Discovery(format!("Failed to list {}: {}", data_dir.display(), e))
    })?;

    info!("Discovered {} data files in {}", files.len(), data_dir.display());
    Ok(files.into_iter().map(LoadUnit::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_table_for() {
        assert_eq!(target_table_for("parents.csv"), "parents");
        assert_eq!(target_table_for("order.items.csv"), "order.items");
        assert_eq!(target_table_for("noext"), "noext");
    }

    #[test]
    fn test_new_unit_is_pending() {
        let unit = LoadUnit::new("/data/children.csv");
        assert_eq!(unit.name, "children.csv");
        assert_eq!(unit.target_table, "children");
        assert_eq!(unit.attempt_count, 0);
        assert_eq!(unit.status, UnitStatus::Pending);
    }

    #[test]
    fn test_discover_units() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("parents.csv"), "id\n1\n").unwrap();
        std::fs::write(dir.path().join("children.csv"), "id,parent_id\n1,1\n").unwrap();
        std::fs::write(dir.path().join("schema.sql"), "").unwrap();

        let units = discover_units(dir.path()).unwrap();
        let tables: Vec<_> = units.iter().map(|u| u.target_table.as_str()).collect();
        assert_eq!(tables, vec!["children", "parents"]);
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover_units(&dir.path().join("data")).unwrap().is_empty());
    }
}
