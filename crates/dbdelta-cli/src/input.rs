//! Snapshot loading.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use dbdelta_core::Schema;

/// Reads a schema snapshot from a JSON file.
///
/// Only parsing happens here; structural validation is left to the
/// caller.
pub fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let schema: Schema = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse schema snapshot {}", path.display()))?;
    debug!(
        path = %path.display(),
        schema = %schema.name,
        tables = schema.tables.len(),
        "Loaded schema snapshot"
    );
    Ok(schema)
}
