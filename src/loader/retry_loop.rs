//! Dependency-Retry Loader
//!
//! Loads every unit into its target table without knowing the dependency
//! order between tables. A unit rejected for a "not yet loadable" reason is
//! pushed to the back of the queue so its siblings get a chance first. Each
//! unit may fail that way at most `retry_limit = units + 1` times, which
//! bounds the run to `retry_limit * units` dequeues. Worst case is O(n^2)
//! attempts for a chain of n dependent files.

use crate::ingestion::{DecodeError, TabularDecoder};
use crate::loader::report::{LoadReport, UnitReport};
use crate::loader::unit::{LoadUnit, UnitStatus};
use crate::store::{StoreError, TableSink};
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// FIFO of indices into the unit list. Only pending units are enqueued.
#[derive(Debug, Default)]
pub struct RetryQueue {
    inner: VecDeque<usize>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, idx: usize) {
        self.inner.push_back(idx);
    }

    pub fn pop_front(&mut self) -> Option<usize> {
        self.inner.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<usize> for RetryQueue {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Result of a single load attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Loaded { rows: usize },
    /// The file holds no rows; nothing to insert.
    Empty,
    /// The store rejected the rows for a reason another table may fix.
    Retryable(StoreError),
    /// Decoding or storing failed for good.
    Failed(String),
}

pub struct DependencyRetryLoader<S, D> {
    sink: S,
    decoder: D,
}

impl<S: TableSink, D: TabularDecoder> DependencyRetryLoader<S, D> {
    pub fn new(sink: S, decoder: D) -> Self {
        Self { sink, decoder }
    }

    /// Attempts allowed per unit before it is abandoned.
    pub fn retry_limit(unit_count: usize) -> usize {
        unit_count + 1
    }

    /// Run the queue to a fixed point and report every unit's final status.
    pub fn load_all(&mut self, mut units: Vec<LoadUnit>) -> LoadReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let retry_limit = Self::retry_limit(units.len());

        let mut queue: RetryQueue = units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.status == UnitStatus::Pending)
            .map(|(idx, _)| idx)
            .collect();
        let mut dequeues = 0;

        info!(
            "Loading {} files (retry limit {}, run {})",
            units.len(),
            retry_limit,
            run_id
        );

        while let Some(idx) = queue.pop_front() {
            dequeues += 1;
            let unit = &mut units[idx];

            if unit.status != UnitStatus::Pending || unit.attempt_count >= retry_limit {
                debug!("Discarding {} ({}, {} attempts)", unit.name, unit.status, unit.attempt_count);
                continue;
            }

            match self.attempt(unit) {
                AttemptOutcome::Loaded { rows } => {
                    info!("Loaded {} rows from {} into {}", rows, unit.name, unit.target_table);
                    unit.rows_inserted = rows;
                    unit.last_error = None;
                    unit.status = UnitStatus::Done;
                }
                AttemptOutcome::Empty => {
                    debug!("{} holds no rows", unit.name);
                    unit.last_error = None;
                    unit.status = UnitStatus::Done;
                }
                AttemptOutcome::Retryable(err) => {
                    unit.attempt_count += 1;
                    unit.last_error = Some(err.to_string());
                    if unit.attempt_count < retry_limit {
                        debug!(
                            "Requeueing {} after attempt {}/{}: {}",
                            unit.name, unit.attempt_count, retry_limit, err
                        );
                        queue.push_back(idx);
                    } else {
                        warn!(
                            "Abandoning {} after {} attempts: {}",
                            unit.name, unit.attempt_count, err
                        );
                        unit.status = UnitStatus::Abandoned;
                    }
                }
                AttemptOutcome::Failed(reason) => {
                    warn!("Dropping {}: {}", unit.name, reason);
                    unit.last_error = Some(reason);
                    unit.status = UnitStatus::Dropped;
                }
            }
        }

        let report = LoadReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            retry_limit,
            dequeues,
            units: units.iter().map(UnitReport::from).collect(),
        };

        info!(
            "Load finished: {} done, {} abandoned, {} dropped after {} dequeues",
            report.done().len(),
            report.abandoned().len(),
            report.dropped().len(),
            dequeues
        );
        report
    }

    fn attempt(&mut self, unit: &LoadUnit) -> AttemptOutcome {
        let data = match self.decoder.decode(&unit.path) {
            Ok(data) => data,
            Err(DecodeError::NoData(_)) => return AttemptOutcome::Empty,
            Err(e) => return AttemptOutcome::Failed(e.to_string()),
        };

        if data.is_empty() {
            return match self.sink.ensure_table(&unit.target_table, &data) {
                Ok(()) => AttemptOutcome::Empty,
                Err(err) if err.kind.is_retryable() => AttemptOutcome::Retryable(err),
                Err(err) => AttemptOutcome::Failed(err.to_string()),
            };
        }

        match self.sink.append_rows(&unit.target_table, &data) {
            Ok(rows) => AttemptOutcome::Loaded { rows },
            Err(err) if err.kind.is_retryable() => AttemptOutcome::Retryable(err),
            Err(err) => AttemptOutcome::Failed(err.to_string()),
        }
    }
}
