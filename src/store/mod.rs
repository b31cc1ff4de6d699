//! Store - The SQLite database being generated
//!
//! One connection per run. The file is removed and recreated on `create`,
//! and every data file is appended inside its own transaction so a failed
//! attempt leaves no rows behind for the retry to duplicate.

pub mod error_classifier;

pub use error_classifier::{ErrorClassifier, FailureKind, RetryReason};

use crate::error::{GeneratorError, Result};
use crate::ingestion::{CellValue, TabularData};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Connection-level behaviour of the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreOptions {
    pub enforce_foreign_keys: bool,
    pub create_missing_tables: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            enforce_foreign_keys: true,
            create_missing_tables: false,
        }
    }
}

/// A rejected append, already classified.
#[derive(Error, Debug, Clone)]
#[error("append into `{table}` failed ({kind}): {message}")]
pub struct StoreError {
    pub table: String,
    pub kind: FailureKind,
    pub message: String,
}

impl StoreError {
    pub fn new(table: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_sqlite(table: &str, error: &rusqlite::Error) -> Self {
        Self::new(table, ErrorClassifier::new().classify(error), error.to_string())
    }
}

/// Destination for decoded rows.
pub trait TableSink {
    /// Append all rows to `table`; returns the number of rows inserted.
    fn append_rows(&mut self, table: &str, data: &TabularData) -> std::result::Result<usize, StoreError>;

    /// Called for a file that has a header but no rows. Sinks that create
    /// tables on demand create `table` here; the default does nothing.
    fn ensure_table(&mut self, _table: &str, _data: &TabularData) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}

impl<T: TableSink + ?Sized> TableSink for &mut T {
    fn append_rows(&mut self, table: &str, data: &TabularData) -> std::result::Result<usize, StoreError> {
        (**self).append_rows(table, data)
    }

    fn ensure_table(&mut self, table: &str, data: &TabularData) -> std::result::Result<(), StoreError> {
        (**self).ensure_table(table, data)
    }
}

/// SQLite store opened for a single generation run.
pub struct Store {
    conn: Connection,
    options: StoreOptions,
}

impl Store {
    /// Delete any database at `path` and open a fresh one.
    pub fn create(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                GeneratorError::Store(format!("Failed to remove {}: {}", path.display(), e))
            })?;
            info!("Removed existing database {}", path.display());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            GeneratorError::Store(format!("Failed to open database {}: {}", path.display(), e))
        })?;

        Self::init(conn, options)
    }

    pub fn open_in_memory(options: &StoreOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GeneratorError::Store(format!("Failed to open in-memory database: {}", e)))?;
        Self::init(conn, options)
    }

    fn init(conn: Connection, options: &StoreOptions) -> Result<Self> {
        if options.enforce_foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(|e| GeneratorError::Store(format!("Failed to enable foreign keys: {}", e)))?;
        }

        Ok(Self {
            conn,
            options: options.clone(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute one opaque statement verbatim.
    pub fn execute_statement(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    /// Commit a transaction left open by executed statements.
    /// Returns whether there was anything to commit.
    pub fn commit_pending(&self) -> rusqlite::Result<bool> {
        if self.conn.is_autocommit() {
            return Ok(false);
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(true)
    }

    pub fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        table_exists_on(&self.conn, table)
    }

    pub fn row_count(&self, table: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            [],
            |row| row.get(0),
        )
    }

    /// Release the connection, reporting close failures.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| GeneratorError::Store(format!("Failed to close database: {}", e)))
    }
}

impl TableSink for Store {
    fn append_rows(&mut self, table: &str, data: &TabularData) -> std::result::Result<usize, StoreError> {
        if data.is_empty() {
            return Ok(0);
        }

        let fail = |e: rusqlite::Error| StoreError::from_sqlite(table, &e);
        let create_missing = self.options.create_missing_tables;

        let tx = self.conn.transaction().map_err(fail)?;

        // Rows of a self-referencing table may list a child before its
        // parent; check foreign keys at commit instead of per row.
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;").map_err(fail)?;

        if create_missing && !table_exists_on(&tx, table).map_err(fail)? {
            let ddl = create_table_sql(table, data);
            debug!("Creating missing table: {}", ddl);
            tx.execute_batch(&ddl).map_err(fail)?;
        }

        {
            let mut stmt = tx.prepare(&insert_sql(table, &data.columns)).map_err(fail)?;
            for row in &data.rows {
                stmt.execute(params_from_iter(row.iter())).map_err(fail)?;
            }
        }

        tx.commit().map_err(fail)?;
        Ok(data.row_count())
    }

    fn ensure_table(&mut self, table: &str, data: &TabularData) -> std::result::Result<(), StoreError> {
        if !self.options.create_missing_tables || data.columns.is_empty() {
            return Ok(());
        }

        let fail = |e: rusqlite::Error| StoreError::from_sqlite(table, &e);
        if !table_exists_on(&self.conn, table).map_err(fail)? {
            let ddl = create_table_sql(table, data);
            debug!("Creating missing table: {}", ddl);
            self.conn.execute_batch(&ddl).map_err(fail)?;
        }
        Ok(())
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            CellValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn table_exists_on(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        names,
        placeholders
    )
}

/// Column affinity from the values seen: INTEGER, REAL, otherwise TEXT.
fn infer_affinity(data: &TabularData, idx: usize) -> &'static str {
    let mut saw_value = false;
    let mut all_integer = true;

    for row in &data.rows {
        let guessed = match row.get(idx) {
            Some(CellValue::Text(raw)) => CellValue::coerce(raw),
            Some(other) => other.clone(),
            None => CellValue::Null,
        };
        match guessed {
            CellValue::Integer(_) => saw_value = true,
            CellValue::Real(_) => {
                saw_value = true;
                all_integer = false;
            }
            CellValue::Text(_) => return "TEXT",
            CellValue::Null => {}
        }
    }

    match (saw_value, all_integer) {
        (false, _) => "TEXT",
        (true, true) => "INTEGER",
        (true, false) => "REAL",
    }
}

fn create_table_sql(table: &str, data: &TabularData) -> String {
    let columns = data
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{} {}", quote_identifier(name), infer_affinity(data, idx)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_identifier(table), columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(columns: &[&str], rows: Vec<Vec<CellValue>>) -> TabularData {
        TabularData {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn fk_store() -> Store {
        let store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        store
            .execute_statement("CREATE TABLE parents (id INTEGER PRIMARY KEY)")
            .unwrap();
        store
            .execute_statement(
                "CREATE TABLE children (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parents(id))",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_append_rows_inserts_all() {
        let mut store = fk_store();
        let rows = data(
            &["id"],
            vec![vec![CellValue::Integer(1)], vec![CellValue::Integer(2)]],
        );
        assert_eq!(store.append_rows("parents", &rows).unwrap(), 2);
        assert_eq!(store.row_count("parents").unwrap(), 2);
    }

    #[test]
    fn test_foreign_key_violation_is_retryable_and_rolled_back() {
        let mut store = fk_store();
        store
            .append_rows("parents", &data(&["id"], vec![vec![CellValue::Integer(1)]]))
            .unwrap();

        // First row is valid, second references a missing parent.
        let children = data(
            &["id", "parent_id"],
            vec![
                vec![CellValue::Integer(10), CellValue::Integer(1)],
                vec![CellValue::Integer(11), CellValue::Integer(99)],
            ],
        );
        let err = store.append_rows("children", &children).unwrap_err();
        assert_eq!(err.kind, FailureKind::Retryable(RetryReason::Constraint));
        assert_eq!(store.row_count("children").unwrap(), 0);
    }

    #[test]
    fn test_missing_table_is_retryable() {
        let mut store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        let err = store
            .append_rows("ghost", &data(&["id"], vec![vec![CellValue::Integer(1)]]))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Retryable(RetryReason::MissingTable));
        assert_eq!(err.table, "ghost");
    }

    #[test]
    fn test_empty_data_never_touches_store() {
        let mut store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        assert_eq!(store.append_rows("ghost", &data(&["id"], vec![])).unwrap(), 0);
        assert!(!store.table_exists("ghost").unwrap());
    }

    #[test]
    fn test_create_missing_tables_infers_affinity() {
        let options = StoreOptions {
            create_missing_tables: true,
            ..StoreOptions::default()
        };
        let mut store = Store::open_in_memory(&options).unwrap();
        let rows = data(
            &["id", "score", "name", "blank"],
            vec![
                vec![
                    CellValue::Integer(1),
                    CellValue::Integer(3),
                    CellValue::Text("a".to_string()),
                    CellValue::Null,
                ],
                vec![
                    CellValue::Integer(2),
                    CellValue::Real(4.5),
                    CellValue::Null,
                    CellValue::Null,
                ],
            ],
        );
        assert_eq!(store.append_rows("metrics", &rows).unwrap(), 2);

        let ddl: String = store
            .connection()
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'metrics'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"metrics\" (\"id\" INTEGER, \"score\" REAL, \"name\" TEXT, \"blank\" TEXT)"
        );
    }

    #[test]
    fn test_self_referencing_rows_load_in_any_order() {
        let mut store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        store
            .execute_statement(
                "CREATE TABLE employees (id INTEGER PRIMARY KEY, manager_id INTEGER REFERENCES employees(id))",
            )
            .unwrap();

        let rows = data(
            &["id", "manager_id"],
            vec![
                vec![CellValue::from_field("2"), CellValue::from_field("1")],
                vec![CellValue::from_field("1"), CellValue::from_field("")],
            ],
        );
        assert_eq!(store.append_rows("employees", &rows).unwrap(), 2);
        assert_eq!(store.row_count("employees").unwrap(), 2);
    }

    #[test]
    fn test_declared_affinity_types_raw_text() {
        let mut store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        store
            .execute_statement("CREATE TABLE people (id INTEGER, zip TEXT, answer TEXT, name TEXT)")
            .unwrap();

        let rows = data(
            &["id", "zip", "answer", "name"],
            vec![
                ["1", "02134", "true", " Ada"].iter().map(|f| CellValue::from_field(f)).collect(),
                ["2", "SW1A", "maybe", "Bob"].iter().map(|f| CellValue::from_field(f)).collect(),
            ],
        );
        store.append_rows("people", &rows).unwrap();

        let (id_type, zip, answer, name): (String, String, String, String) = store
            .connection()
            .query_row(
                "SELECT typeof(id), zip, answer, name FROM people WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(id_type, "integer");
        assert_eq!(zip, "02134");
        assert_eq!(answer, "true");
        assert_eq!(name, " Ada");
    }

    #[test]
    fn test_create_missing_tables_infers_affinity_from_text() {
        let options = StoreOptions {
            create_missing_tables: true,
            ..StoreOptions::default()
        };
        let mut store = Store::open_in_memory(&options).unwrap();
        let rows = data(
            &["id", "ratio", "zip"],
            vec![vec![
                CellValue::from_field("1"),
                CellValue::from_field("0.5"),
                CellValue::from_field("SW1A"),
            ]],
        );
        store.append_rows("samples", &rows).unwrap();

        let ddl: String = store
            .connection()
            .query_row("SELECT sql FROM sqlite_master WHERE name = 'samples'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ddl, "CREATE TABLE \"samples\" (\"id\" INTEGER, \"ratio\" REAL, \"zip\" TEXT)");
    }

    #[test]
    fn test_ensure_table_creates_header_only_table_when_enabled() {
        let header_only = data(&["id", "name"], vec![]);

        let mut plain = Store::open_in_memory(&StoreOptions::default()).unwrap();
        plain.ensure_table("ghost", &header_only).unwrap();
        assert!(!plain.table_exists("ghost").unwrap());

        let options = StoreOptions {
            create_missing_tables: true,
            ..StoreOptions::default()
        };
        let mut creating = Store::open_in_memory(&options).unwrap();
        creating.ensure_table("ghost", &header_only).unwrap();
        assert!(creating.table_exists("ghost").unwrap());
        assert_eq!(creating.row_count("ghost").unwrap(), 0);

        // Existing tables are left alone.
        creating.ensure_table("ghost", &header_only).unwrap();
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_commit_pending() {
        let store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        assert!(!store.commit_pending().unwrap());
        store.execute_statement("BEGIN").unwrap();
        store.execute_statement("CREATE TABLE t (id INTEGER)").unwrap();
        assert!(store.commit_pending().unwrap());
        assert!(store.connection().is_autocommit());
    }
}
