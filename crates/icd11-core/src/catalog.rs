//! Loading the code list from CSV.
//!
//! The source needs a header row with `Code` and `Title`; every other column
//! is ignored, including a `Parent_Code` column from a previous export. Parent
//! codes are always derived from the code itself.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::{Catalog, CatalogError, CodeRecord};

const CODE_COLUMN: &str = "Code";
const TITLE_COLUMN: &str = "Title";

/// Load a catalog from a CSV file. A missing or unreadable file is reported
/// as [`CatalogError::SourceUnavailable`].
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    info!(path = %path.display(), "loading catalog");
    let file = File::open(path).map_err(|source| CatalogError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let catalog = Catalog::from_csv_reader(file).map_err(|e| match e {
        CatalogError::Io(source) => CatalogError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    info!(path = %path.display(), rows = catalog.len(), "catalog loaded");
    Ok(catalog)
}

impl Catalog {
    /// Parse CSV from any reader.
    ///
    /// Row problems never abort the load: rows with a missing or empty code, or
    /// with invalid UTF-8, are skipped; a missing title becomes "".
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Catalog, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers().map_err(io_or_csv)?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);

        let Some(code_idx) = column(CODE_COLUMN) else {
            warn!(column = CODE_COLUMN, "catalog source has no code column, no rows loaded");
            return Ok(Catalog::empty());
        };
        let title_idx = column(TITLE_COLUMN);
        if title_idx.is_none() {
            warn!(column = TITLE_COLUMN, "catalog source has no title column, titles left empty");
        }

        let mut records = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            // Header is line 1.
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(io_or_csv(e)),
                Err(e) => {
                    warn!(line, error = %e, "skipping unreadable row");
                    continue;
                }
            };

            let code = match row.get(code_idx) {
                Some(code) if !code.is_empty() => code,
                _ => {
                    warn!(line, "skipping row without a code");
                    continue;
                }
            };
            let title = title_idx.and_then(|i| row.get(i)).unwrap_or("");
            records.push(CodeRecord::new(code, title));
        }

        Ok(Catalog::new(records))
    }

    /// Log the first `rows` records at debug level.
    pub fn log_preview(&self, rows: usize) {
        for record in self.head(rows) {
            debug!(
                code = %record.code,
                title = %record.title,
                parent = record.parent_code.as_deref().unwrap_or(""),
                "catalog preview"
            );
        }
    }
}

fn io_or_csv(e: csv::Error) -> CatalogError {
    if e.is_io_error() {
        CatalogError::Io(e.into())
    } else {
        CatalogError::Csv(e)
    }
}
