use tracing::debug;

use crate::CodeRecord;

/// Records whose [`CodeRecord::search_text`] contains `query`, ignoring case,
/// in input order. An empty query returns every record.
pub fn filter(records: &[CodeRecord], query: &str) -> Vec<CodeRecord> {
    if query.is_empty() {
        return records.to_vec();
    }
    let needle = query.to_lowercase();
    let matched: Vec<CodeRecord> = records
        .iter()
        .filter(|r| r.search_text().contains(&needle))
        .cloned()
        .collect();
    debug!(query, matched = matched.len(), total = records.len(), "search");
    matched
}
