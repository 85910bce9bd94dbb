use std::fs;

use icd11_core::{
    export_to_dir, filter, load_catalog, CatalogCache, CodeRecord, HierarchyGraph, LayoutConfig,
    EXPORT_FILE_NAME,
};
use tempfile::tempdir;

const SOURCE: &str = "\
Code,Title
1A00,Cholera
1A00.0,\"Cholera due to Vibrio cholerae O1, biovar cholerae\"
1A00.1,\"Cholera due to Vibrio cholerae O1, biovar eltor\"
1A07,Typhoid fever
1A07.0,Typhoid peritonitis
1B10,Tuberculosis of the respiratory system
";

fn pairs(records: &[CodeRecord]) -> Vec<(&str, &str)> {
    records
        .iter()
        .map(|r| (r.code.as_str(), r.title.as_str()))
        .collect()
}

#[test]
fn export_then_reload_keeps_codes_and_titles() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let source = dir.path().join("icd11_codes.csv");
    fs::write(&source, SOURCE)?;

    let catalog = load_catalog(&source)?;
    let filtered = filter(catalog.records(), "cholera");
    assert_eq!(filtered.len(), 3);

    let exported = export_to_dir(&dir.path().join("out"), &filtered)?;
    assert_eq!(exported.file_name().and_then(|n| n.to_str()), Some(EXPORT_FILE_NAME));

    let reloaded = load_catalog(&exported)?;
    assert_eq!(pairs(reloaded.records()), pairs(&filtered));
    assert_eq!(reloaded.records(), filtered.as_slice());
    Ok(())
}

#[test]
fn filtered_graph_loses_edges_to_filtered_out_parents() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let source = dir.path().join("icd11_codes.csv");
    fs::write(&source, SOURCE)?;

    let cache = CatalogCache::new();
    let catalog = cache.get_or_load(&source)?;
    let config = LayoutConfig::default();

    let full = HierarchyGraph::build(catalog.records(), &config);
    assert_eq!(full.node_count(), 6);
    assert_eq!(full.edge_count(), 3);
    assert_eq!(full.roots(), ["1A00", "1A07", "1B10"]);

    let eltor = filter(catalog.records(), "eltor");
    let partial = HierarchyGraph::build(&eltor, &config);
    assert_eq!(partial.node_count(), 1);
    assert_eq!(partial.edge_count(), 0);
    Ok(())
}

#[test]
fn missing_source_keeps_the_session_usable() {
    let dir = tempdir().unwrap();
    let cache = CatalogCache::new();
    let outcome = cache.load_or_empty(&dir.path().join("icd11_codes.csv"));
    assert!(outcome.warning.is_some());

    let rows = filter(outcome.catalog.records(), "anything");
    assert!(rows.is_empty());
    let graph = HierarchyGraph::build(&rows, &LayoutConfig::default());
    assert!(graph.is_empty());
}
