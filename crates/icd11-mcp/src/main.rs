mod session;
mod watch;

use std::path::Path;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::session::Session;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchRequest {
    /// Free text matched case-insensitively against code, title and parent code. Omit or pass "" to list every code.
    query: Option<String>,
    /// Maximum number of rows to return. `total` still counts every match.
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetCodeRequest {
    /// The code to inspect, e.g. "1A00.1"
    code: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct HierarchyRequest {
    /// Restrict the graph to codes matching this query. Omit for the whole catalog.
    query: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExportRequest {
    /// Export only codes matching this query. Omit for the whole catalog.
    query: Option<String>,
    /// Directory to write filtered_icd11.csv into. Defaults to the configured export directory.
    directory: Option<String>,
}

// --- Server ---

#[derive(Clone)]
pub struct CatalogServer {
    tool_router: ToolRouter<Self>,
    session: Arc<Session>,
}

#[tool_router]
impl CatalogServer {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            session,
        }
    }

    #[tool(
        description = "Search the ICD-11 code list. Returns {query, total, returned, rows: [{code, title, parentCode?}], warning?}. Rows keep catalog order. The match is a plain substring test on \"code title parentCode\" joined by spaces, so a query containing a space can match across two fields. `warning` is set when the code list could not be read; rows are then empty."
    )]
    fn search_codes(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let out = self
            .session
            .search_json(req.query.as_deref().unwrap_or(""), req.limit);
        Ok(CallToolResult::success(vec![Content::text(pretty(&out))]))
    }

    #[tool(
        description = "Inspect one code. Returns {record, parent, children}: the record itself, its parent record (null when the parent code is not in the catalog or the code has no dot) and its direct children in catalog order."
    )]
    fn get_code(
        &self,
        Parameters(req): Parameters<GetCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.session.code_json(&req.code) {
            Ok(out) => Ok(CallToolResult::success(vec![Content::text(pretty(&out))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Build the parent/child graph for the codes matching a query. Returns {nodes: [{code, title, x, y}], edges: [{source, target}], warning?}. Edges run parent -> child and exist only when both ends match the query. Coordinates come from a seeded force-directed layout centered on (0,0), so the same query always gives the same picture."
    )]
    fn get_hierarchy(
        &self,
        Parameters(req): Parameters<HierarchyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let out = self
            .session
            .hierarchy_json(req.query.as_deref().unwrap_or(""));
        Ok(CallToolResult::success(vec![Content::text(pretty(&out))]))
    }

    #[tool(
        description = "Export the codes matching a query to filtered_icd11.csv (columns Code, Title, Parent_Code) in the same order as search_codes. Returns the written path and row count. Fails without touching any earlier export when the code list could not be read."
    )]
    fn export_csv(
        &self,
        Parameters(req): Parameters<ExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let dir = req.directory.as_deref().map(Path::new);
        match self
            .session
            .export(req.query.as_deref().unwrap_or(""), dir)
        {
            Ok((path, rows)) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Exported {} rows to {}",
                rows,
                path.display()
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Export failed: {}",
                e
            ))])),
        }
    }

    #[tool(description = "Re-read the code list from disk and report how many codes were loaded")]
    fn reload_catalog(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.session.reload();
        match outcome.warning {
            Some(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "Loaded {} codes from {}",
                outcome.catalog.len(),
                self.session.source().display()
            ))])),
        }
    }
}

#[tool_handler]
impl ServerHandler for CatalogServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn pretty(val: &serde_json::Value) -> String {
    serde_json::to_string_pretty(val).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

const INSTRUCTIONS: &str = r#"icd11 serves an ICD-11 code list loaded from a CSV file with Code and Title columns.

## Codes
Codes are dot-separated, e.g. "1A00.1". The parent of a code is the code with its last dot segment removed ("1A00.1" -> "1A00"). Codes without a dot are top-level. A parent code does not have to exist in the list.

## Tools
- `search_codes`: the table view. Empty query lists everything.
- `get_code`: one code with its parent and children.
- `get_hierarchy`: nodes, parent -> child edges and 2D positions for the matching codes. Filtering can hide a parent and with it the edge to its children.
- `export_csv`: writes filtered_icd11.csv for the matching codes.
- `reload_catalog`: re-read the CSV after it changed. Changes on disk are also picked up automatically.

If the CSV is missing, tools answer with an empty list and a `warning` instead of failing."#;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "icd11_mcp=info,icd11_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = icd11_core::read_settings();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("search") => {
            let query = args.collect::<Vec<_>>().join(" ");
            return run_search(Session::new(settings), &query);
        }
        Some("export") => {
            let query = args.collect::<Vec<_>>().join(" ");
            return run_export(Session::new(settings), &query);
        }
        Some(other) => {
            eprintln!("Unknown command `{other}`.");
            eprintln!("Usage: icd11-mcp [search <query> | export [query]]");
            std::process::exit(1);
        }
        None => {}
    }

    info!(source = %settings.source_path.display(), "starting ICD-11 catalog server");
    let session = Arc::new(Session::new(settings));

    // Keep the watcher alive for the server's lifetime
    let _watcher = watch::watch_source(Arc::clone(&session))
        .inspect_err(|e| warn!(error = %e, "not watching catalog source for changes"))
        .ok();

    let service = CatalogServer::new(session)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

/// Print the rows matching `query` to stdout as CSV.
fn run_search(session: Session, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (rows, _) = session.filtered(query);
    icd11_core::write_csv(&rows, std::io::stdout().lock())?;
    Ok(())
}

/// Write filtered_icd11.csv for `query` into the configured export directory.
fn run_export(session: Session, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (path, rows) = session.export(query, None)?;
    eprintln!("Wrote {} ({} rows)", path.display(), rows);
    Ok(())
}
