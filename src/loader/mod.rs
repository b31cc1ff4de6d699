//! Loader Module - Dependency-retry loading of data files
//!
//! - `unit`: load units, their status, and directory discovery
//! - `retry_loop`: the bounded FIFO retry loop
//! - `report`: per-unit outcome of a run

pub mod report;
pub mod retry_loop;
pub mod unit;

pub use report::{LoadReport, UnitReport};
pub use retry_loop::{AttemptOutcome, DependencyRetryLoader, RetryQueue};
pub use unit::{discover_units, target_table_for, LoadUnit, UnitStatus};
