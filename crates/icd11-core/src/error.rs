use std::path::PathBuf;

/// Errors raised by the catalog, export and settings layers.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file is missing or cannot be read. Callers degrade to an
    /// empty catalog instead of failing the whole session.
    #[error("catalog source '{}' is unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("code '{0}' is not in the catalog")]
    MissingCode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
