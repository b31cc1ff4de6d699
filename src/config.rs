//! Generator Configuration
//!
//! The core entry point takes explicit paths. Working-directory conventions
//! (`database.sqlite`, `schema.sql`, `data/`) and environment overrides are
//! resolved here, outside the loader.

use crate::error::{GeneratorError, Result};
use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_FILE: &str = "database.sqlite";
pub const DEFAULT_SCHEMA_FILE: &str = "schema.sql";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const DATABASE_ENV: &str = "SQLITE_GENERATOR_DATABASE";
pub const SCHEMA_ENV: &str = "SQLITE_GENERATOR_SCHEMA";
pub const DATA_DIR_ENV: &str = "SQLITE_GENERATOR_DATA_DIR";

/// Everything a generation run needs to know.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// SQLite file to (re)create
    pub database_path: PathBuf,

    /// Schema definition applied before loading; may not exist
    pub schema_path: PathBuf,

    /// Directory scanned for `.csv` files
    pub data_dir: PathBuf,

    /// Open the store with `PRAGMA foreign_keys = ON`
    pub enforce_foreign_keys: bool,

    /// Create undeclared target tables from the CSV header
    pub create_missing_tables: bool,
}

impl GeneratorConfig {
    pub fn new(
        database_path: impl Into<PathBuf>,
        schema_path: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database_path: database_path.into(),
            schema_path: schema_path.into(),
            data_dir: data_dir.into(),
            enforce_foreign_keys: true,
            create_missing_tables: false,
        }
    }

    /// Resolve the conventional layout under `base`.
    pub fn from_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self::new(
            base.join(DEFAULT_DATABASE_FILE),
            base.join(DEFAULT_SCHEMA_FILE),
            base.join(DEFAULT_DATA_DIR),
        )
    }

    /// Resolve the conventional layout under the process working directory.
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| {
            GeneratorError::Config(format!("Failed to resolve working directory: {}", e))
        })?;
        Ok(Self::from_dir(cwd))
    }

    /// Apply `SQLITE_GENERATOR_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(SCHEMA_ENV).filter(|v| !v.trim().is_empty()) {
            self.schema_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(path);
        }
        self
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            enforce_foreign_keys: self.enforce_foreign_keys,
            create_missing_tables: self.create_missing_tables,
        }
    }
}
