//! Schema Applier
//!
//! Executes a schema definition against a fresh store, one statement at a
//! time. A failing statement is logged and skipped; retrying is left to the
//! loader.

use crate::error::{GeneratorError, Result};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

pub const STATEMENT_TERMINATOR: char = ';';

/// Ordered, opaque statements of a schema source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub statements: Vec<String>,
}

impl SchemaDefinition {
    /// Split on the terminator and drop blank statements.
    pub fn parse(text: &str) -> Self {
        let statements = text
            .split(STATEMENT_TERMINATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatementOutcome {
    Applied,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementReport {
    pub statement: String,
    #[serde(flatten)]
    pub outcome: StatementOutcome,
}

/// What happened to each statement of the schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub statements: Vec<StatementReport>,
    /// Error raised by the final commit, if any
    pub commit_error: Option<String>,
}

impl SchemaReport {
    pub fn applied_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| s.outcome == StatementOutcome::Applied)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &StatementReport> {
        self.statements
            .iter()
            .filter(|s| matches!(s.outcome, StatementOutcome::Failed { .. }))
    }
}

/// Read the schema source; `None` when the file does not exist.
pub fn read_schema(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GeneratorError::Schema(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Apply every statement of `schema_text` in order, then commit once.
pub fn apply_schema(store: &Store, schema_text: &str) -> SchemaReport {
    let definition = SchemaDefinition::parse(schema_text);
    info!("Applying {} schema statements", definition.len());

    let mut report = SchemaReport::default();
    for statement in definition.statements {
        let outcome = match store.execute_statement(&statement) {
            Ok(()) => {
                debug!("Applied: {}", first_line(&statement));
                StatementOutcome::Applied
            }
            Err(e) => {
                warn!("Skipping schema statement `{}`: {}", first_line(&statement), e);
                StatementOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        report.statements.push(StatementReport { statement, outcome });
    }

    if let Err(e) = store.commit_pending() {
        warn!("Failed to commit schema: {}", e);
        report.commit_error = Some(e.to_string());
    }

    info!(
        "Schema applied: {} ok, {} failed",
        report.applied_count(),
        report.failed().count()
    );
    report
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use tempfile::TempDir;

    #[test]
    fn test_parse_drops_blank_statements() {
        let definition = SchemaDefinition::parse(
            "CREATE TABLE a (id INTEGER);\n\n  ;\nCREATE TABLE b (id INTEGER)  ;  \n",
        );
        assert_eq!(
            definition.statements,
            vec!["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
    }

    #[test]
    fn test_parse_empty_text() {
        assert!(SchemaDefinition::parse("").is_empty());
        assert!(SchemaDefinition::parse(" ;\n; ").is_empty());
    }

    #[test]
    fn test_failing_statement_does_not_stop_the_rest() {
        let store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        let report = apply_schema(
            &store,
            "CREATE TABLE a (id INTEGER);\nCREATE EXTENSION postgis;\nCREATE TABLE b (id INTEGER);",
        );

        assert_eq!(report.statements.len(), 3);
        assert_eq!(report.applied_count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].statement, "CREATE EXTENSION postgis");
        assert!(store.table_exists("a").unwrap());
        assert!(store.table_exists("b").unwrap());
    }

    #[test]
    fn test_open_transaction_is_committed_once() {
        let store = Store::open_in_memory(&StoreOptions::default()).unwrap();
        let report = apply_schema(&store, "BEGIN; CREATE TABLE t (id INTEGER);");
        assert!(report.commit_error.is_none());
        assert!(store.connection().is_autocommit());
        assert!(store.table_exists("t").unwrap());
    }

    #[test]
    fn test_read_schema_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_schema(&dir.path().join("schema.sql")).unwrap(), None);

        std::fs::write(dir.path().join("schema.sql"), "CREATE TABLE t (id INTEGER);").unwrap();
        assert!(read_schema(&dir.path().join("schema.sql")).unwrap().is_some());
    }
}
