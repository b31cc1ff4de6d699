//! CSV Decoder - Turns a header-row CSV file into `TabularData`

use crate::ingestion::{CellValue, DecodeError, TabularData, TabularDecoder};
use csv::ReaderBuilder;
use std::path::Path;

/// Decodes comma-delimited files whose first row names the columns.
///
/// Fields are kept as written; the store's column affinity does any typing.
#[derive(Clone, Debug, Default)]
pub struct CsvDecoder;

impl CsvDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an in-memory payload; `path` is only used in error messages.
    pub fn decode_bytes(&self, path: &Path, bytes: &[u8]) -> Result<TabularData, DecodeError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DecodeError::NoData(path.to_path_buf()));
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let columns = rdr
            .headers()
            .map_err(|e| DecodeError::Malformed {
                path: path.to_path_buf(),
                reason: format!("failed to read header row: {}", e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut data = TabularData::new(columns);
        let width = data.columns.len();

        for result in rdr.records() {
            let record = result.map_err(|e| DecodeError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            if record.len() > width {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(DecodeError::Malformed {
                    path: path.to_path_buf(),
                    reason: format!(
                        "expected {} fields in line {}, saw {}",
                        width,
                        line,
                        record.len()
                    ),
                });
            }

            let row = (0..width)
                .map(|idx| record.get(idx).map(CellValue::from_field).unwrap_or(CellValue::Null))
                .collect();
            data.rows.push(row);
        }

        Ok(data)
    }
}

impl TabularDecoder for CsvDecoder {
    fn decode(&self, path: &Path) -> Result<TabularData, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.decode_bytes(path, &bytes)
    }
}
