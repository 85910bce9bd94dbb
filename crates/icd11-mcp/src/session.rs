use std::path::{Path, PathBuf};

use icd11_core::{
    export_to_dir, filter, CatalogCache, CatalogError, CodeRecord, HierarchyGraph, LoadOutcome,
    Settings,
};
use serde_json::{json, Value};
use tracing::warn;

/// State shared by every tool call of one server instance: the settings it
/// started with and the catalog cache.
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    cache: CatalogCache,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let cache = CatalogCache::new().with_preview_rows(settings.preview_rows);
        Self { settings, cache }
    }

    pub fn source(&self) -> &Path {
        &self.settings.source_path
    }

    pub fn load(&self) -> LoadOutcome {
        self.cache.load_or_empty(self.source())
    }

    /// Whether the source's catalog is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.cache.contains(self.source())
    }

    pub fn invalidate_source(&self) -> bool {
        self.cache.invalidate(self.source())
    }

    /// Drop the cached catalog and read the source again.
    pub fn reload(&self) -> LoadOutcome {
        self.invalidate_source();
        self.load()
    }

    pub fn filtered(&self, query: &str) -> (Vec<CodeRecord>, Option<CatalogError>) {
        let LoadOutcome { catalog, warning } = self.load();
        (filter(catalog.records(), query), warning)
    }

    /// Table view: matching rows, `limit` caps the rows returned but not `total`.
    pub fn search_json(&self, query: &str, limit: Option<usize>) -> Value {
        let (rows, warning) = self.filtered(query);
        let total = rows.len();
        let shown = &rows[..limit.unwrap_or(total).min(total)];
        let mut out = json!({
            "query": query,
            "total": total,
            "returned": shown.len(),
            "rows": shown,
        });
        attach_warning(&mut out, warning);
        out
    }

    /// One record with its parent (if loaded) and direct children.
    pub fn code_json(&self, code: &str) -> Result<Value, CatalogError> {
        let LoadOutcome { catalog, warning } = self.load();
        let record = catalog
            .get(code)
            .ok_or_else(|| warning.unwrap_or_else(|| CatalogError::MissingCode(code.to_string())))?;
        let parent = record.parent_code.as_deref().and_then(|p| catalog.get(p));
        let children: Vec<&CodeRecord> = catalog.children(code).collect();
        Ok(json!({
            "record": record,
            "parent": parent,
            "children": children,
        }))
    }

    /// Graph view over the rows matching `query`.
    pub fn hierarchy_json(&self, query: &str) -> Value {
        let (rows, warning) = self.filtered(query);
        let graph = HierarchyGraph::build(&rows, &self.settings.layout);
        let nodes: Vec<Value> = graph
            .nodes()
            .iter()
            .map(|n| {
                let pos = graph.position(&n.code).unwrap_or_default();
                json!({ "code": n.code, "title": n.title, "x": pos.x, "y": pos.y })
            })
            .collect();
        let edges: Vec<Value> = graph
            .edges()
            .iter()
            .map(|e| json!({ "source": e.parent, "target": e.child }))
            .collect();
        let mut out = json!({ "nodes": nodes, "edges": edges });
        attach_warning(&mut out, warning);
        out
    }

    /// Write the rows matching `query` to `filtered_icd11.csv` in `dir`, or in
    /// the configured export directory.
    ///
    /// Fails with the load error when the source is unavailable, leaving any
    /// earlier export in place.
    pub fn export(&self, query: &str, dir: Option<&Path>) -> Result<(PathBuf, usize), CatalogError> {
        let (rows, warning) = self.filtered(query);
        if let Some(e) = warning {
            warn!(error = %e, "refusing to export from an unavailable catalog");
            return Err(e);
        }
        let dir = dir.map_or_else(|| self.settings.export_dir(), Path::to_path_buf);
        let path = export_to_dir(&dir, &rows)?;
        Ok((path, rows.len()))
    }
}

fn attach_warning(out: &mut Value, warning: Option<CatalogError>) {
    if let Some(w) = warning {
        out["warning"] = Value::String(w.to_string());
    }
}
