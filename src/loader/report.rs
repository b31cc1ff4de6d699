//! Load Report - Final status of every unit in a run

use crate::loader::unit::{LoadUnit, UnitStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub file: String,
    pub table: String,
    pub status: UnitStatus,
    /// Number of retryable failures recorded against the unit
    pub attempts: usize,
    pub rows_inserted: usize,
    pub last_error: Option<String>,
}

impl From<&LoadUnit> for UnitReport {
    fn from(unit: &LoadUnit) -> Self {
        Self {
            file: unit.name.clone(),
            table: unit.target_table.clone(),
            status: unit.status,
            attempts: unit.attempt_count,
            rows_inserted: unit.rows_inserted,
            last_error: unit.last_error.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub retry_limit: usize,
    /// Total number of queue pops, including discarded ones
    pub dequeues: usize,
    pub units: Vec<UnitReport>,
}

impl LoadReport {
    pub fn with_status(&self, status: UnitStatus) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(move |u| u.status == status)
    }

    pub fn done(&self) -> Vec<&UnitReport> {
        self.with_status(UnitStatus::Done).collect()
    }

    pub fn abandoned(&self) -> Vec<&UnitReport> {
        self.with_status(UnitStatus::Abandoned).collect()
    }

    pub fn dropped(&self) -> Vec<&UnitReport> {
        self.with_status(UnitStatus::Dropped).collect()
    }

    pub fn unit(&self, file: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.file == file)
    }

    pub fn status_of(&self, file: &str) -> Option<UnitStatus> {
        self.unit(file).map(|u| u.status)
    }

    /// True when every unit reached `Done`.
    pub fn is_complete(&self) -> bool {
        self.units.iter().all(|u| u.status == UnitStatus::Done)
    }

    pub fn rows_inserted(&self) -> usize {
        self.units.iter().map(|u| u.rows_inserted).sum()
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Loaded {} of {} files ({} abandoned, {} dropped), {} rows",
            self.done().len(),
            self.units.len(),
            self.abandoned().len(),
            self.dropped().len(),
            self.rows_inserted()
        )?;
        for unit in &self.units {
            write!(
                f,
                "  {:<9} {} -> {} ({} rows, {} retries)",
                unit.status.to_string(),
                unit.file,
                unit.table,
                unit.rows_inserted,
                unit.attempts
            )?;
            if let Some(err) = &unit.last_error {
                write!(f, ": {}", err)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
