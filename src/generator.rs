//! Generator - End-to-end run: recreate store, apply schema, load data

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::ingestion::CsvDecoder;
use crate::loader::{discover_units, DependencyRetryLoader, LoadReport};
use crate::schema::{apply_schema, read_schema, SchemaReport};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of one generation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub database_path: PathBuf,
    /// `None` when no schema file was found
    pub schema: Option<SchemaReport>,
    pub load: LoadReport,
}

/// Build the database described by `config` from scratch.
///
/// Only setup failures are returned as errors; failed statements and data
/// files are recorded in the summary.
pub fn generate_sqlite(config: &GeneratorConfig) -> Result<GenerationSummary> {
    info!("Generating {}", config.database_path.display());

    let mut store = Store::create(&config.database_path, &config.store_options())?;

    let schema = match read_schema(&config.schema_path)? {
        Some(text) => Some(apply_schema(&store, &text)),
        None => {
            warn!(
                "Schema file {} not found, loading into an empty database",
                config.schema_path.display()
            );
            None
        }
    };

    let units = discover_units(&config.data_dir)?;
    let load = DependencyRetryLoader::new(&mut store, CsvDecoder::new()).load_all(units);

    store.close()?;

    Ok(GenerationSummary {
        database_path: config.database_path.clone(),
        schema,
        load,
    })
}
