use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::{CatalogError, CodeRecord};

/// Name of the downloadable file.
pub const EXPORT_FILE_NAME: &str = "filtered_icd11.csv";

pub const EXPORT_HEADERS: [&str; 3] = ["Code", "Title", "Parent_Code"];

#[derive(Serialize)]
struct ExportRow<'a> {
    code: &'a str,
    title: &'a str,
    parent_code: Option<&'a str>,
}

/// Write `records` as CSV in their current order. The header row is always
/// written, even for an empty set. A missing parent is an empty cell.
pub fn write_csv<W: Write>(records: &[CodeRecord], writer: W) -> Result<(), CatalogError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(EXPORT_HEADERS)?;
    for record in records {
        writer.serialize(ExportRow {
            code: &record.code,
            title: &record.title,
            parent_code: record.parent_code.as_deref(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes(records: &[CodeRecord]) -> Result<Vec<u8>, CatalogError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    Ok(buf)
}

/// Write `filtered_icd11.csv` into `dir` and return its path.
///
/// Goes through a temp file and a rename so a watcher or a reader never sees
/// a half-written export.
pub fn export_to_dir(dir: &Path, records: &[CodeRecord]) -> Result<PathBuf, CatalogError> {
    let bytes = to_csv_bytes(records)?;
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{}.tmp", EXPORT_FILE_NAME));
    let path = dir.join(EXPORT_FILE_NAME);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)?;
    info!(path = %path.display(), rows = records.len(), "exported records");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(records: &[CodeRecord]) -> String {
        String::from_utf8(to_csv_bytes(records).unwrap()).unwrap()
    }

    #[test]
    fn writes_header_and_derived_parent() {
        let text = as_text(&[CodeRecord::new("1A00", "Cholera"), CodeRecord::new("1A00.1", "El Tor")]);
        assert_eq!(text, "Code,Title,Parent_Code\n1A00,Cholera,\n1A00.1,El Tor,1A00\n");
    }

    #[test]
    fn empty_set_still_has_header() {
        assert_eq!(as_text(&[]), "Code,Title,Parent_Code\n");
    }

    #[test]
    fn quotes_titles_with_separators() {
        let text = as_text(&[CodeRecord::new("1A0Z", "Cholera, \"unspecified\"")]);
        assert_eq!(text, "Code,Title,Parent_Code\n1A0Z,\"Cholera, \"\"unspecified\"\"\",\n");
    }

    #[test]
    fn export_to_dir_uses_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let path = export_to_dir(&out, &[CodeRecord::new("1A00", "Cholera")]).unwrap();
        assert_eq!(path, out.join(EXPORT_FILE_NAME));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Code,Title,Parent_Code\n1A00,Cholera,\n"
        );
        assert!(!out.join(".filtered_icd11.csv.tmp").exists());
    }
}
