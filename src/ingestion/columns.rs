//! Column introspection for a data directory.

use crate::ingestion::list_data_files;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Header of one data file. `columns` is `None` when the file is empty or
/// its header could not be read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileColumns {
    pub file: String,
    pub columns: Option<Vec<String>>,
}

/// List the header of every `.csv` file in `data_dir`.
///
/// `None` when the directory does not exist or cannot be read; an empty
/// listing means it holds no `.csv` files.
pub fn list_columns(data_dir: &Path) -> Option<Vec<FileColumns>> {
    if !data_dir.is_dir() {
        warn!("Data directory {} does not exist", data_dir.display());
        return None;
    }

    let files = match list_data_files(data_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("Failed to list {}: {}", data_dir.display(), e);
            return None;
        }
    };

    let listing = files
        .iter()
        .map(|path| {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let columns = read_header(path);
            if columns.is_none() {
                debug!("No readable header in {}", file);
            }
            FileColumns { file, columns }
        })
        .collect();
    Some(listing)
}

fn read_header(path: &Path) -> Option<Vec<String>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .ok()?;
    let headers = rdr.headers().ok()?;
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    if columns.iter().all(|c| c.is_empty()) {
        return None;
    }
    Some(columns)
}
