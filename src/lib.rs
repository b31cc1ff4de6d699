pub mod config;
pub mod error;
pub mod generator;
pub mod ingestion;
pub mod loader;
pub mod schema;
pub mod store;

pub use config::GeneratorConfig;
pub use error::{GeneratorError, Result};
pub use generator::{generate_sqlite, GenerationSummary};
pub use loader::{LoadReport, UnitStatus};
