pub mod cache;
pub mod catalog;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod layout;
pub mod search;

pub use cache::{CatalogCache, LoadOutcome};
pub use catalog::load_catalog;
pub use error::CatalogError;
pub use export::{export_to_dir, to_csv_bytes, write_csv, EXPORT_FILE_NAME};
pub use hierarchy::{GraphEdge, GraphNode, HierarchyGraph};
pub use layout::LayoutConfig;
pub use search::filter;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// --- Types ---

/// One classification entry. `parent_code` is derived from `code` and may
/// point at a code that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,
}

impl CodeRecord {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        let code = code.into();
        let parent_code = parent_code(&code).map(str::to_string);
        Self {
            code,
            title: title.into(),
            parent_code,
        }
    }

    /// Text scanned by the search filter: code, title and parent code joined
    /// by a single space, lower-cased. A missing parent contributes an empty
    /// string. Matches may straddle the separator between two fields.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.code,
            self.title,
            self.parent_code.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

/// Strip the last dot-delimited segment: "1A00.1" → "1A00", "A.B.C" → "A.B".
/// Codes without a dot have no parent.
pub fn parent_code(code: &str) -> Option<&str> {
    code.rsplit_once('.').map(|(parent, _)| parent)
}

/// The loaded code list, in source order. Read-only after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    records: Vec<CodeRecord>,
}

impl Catalog {
    pub fn new(records: Vec<CodeRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[CodeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CodeRecord> {
        self.records.iter()
    }

    /// First record carrying `code`.
    pub fn get(&self, code: &str) -> Option<&CodeRecord> {
        self.records.iter().find(|r| r.code == code)
    }

    /// Records whose parent code is `code`, in catalog order.
    pub fn children<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a CodeRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.parent_code.as_deref() == Some(code))
    }

    /// The first `n` rows, used for the load preview.
    pub fn head(&self, n: usize) -> &[CodeRecord] {
        &self.records[..n.min(self.records.len())]
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CodeRecord;
    type IntoIter = std::slice::Iter<'a, CodeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// --- Storage ---

/// Resolve the settings directory (~/.icd11/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".icd11")
}

fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub const DEFAULT_SOURCE: &str = "icd11_codes.csv";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Catalog CSV. Relative paths resolve against the working directory.
    pub source_path: PathBuf,
    /// Where exports land. None means the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    /// Rows logged as a preview after each load.
    pub preview_rows: usize,
    pub layout: LayoutConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE),
            export_dir: None,
            preview_rows: 5,
            layout: LayoutConfig::default(),
        }
    }
}

impl Settings {
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Read settings from ~/.icd11/settings.json. Missing or invalid files fall
/// back to defaults.
pub fn read_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    read_settings_from(&path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring invalid settings file");
        Settings::default()
    })
}

pub fn read_settings_from(path: &Path) -> Result<Settings, CatalogError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_settings(settings: &Settings) -> Result<(), CatalogError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), CatalogError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
