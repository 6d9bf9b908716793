//! Wine catalog files
//!
//! A catalog is a JSON array of wine records.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::catalog::{WineIndex, WineRecord};

/// Read the records of a catalog file
pub fn load_records(path: &Path) -> Result<Vec<WineRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let records: Vec<WineRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
    Ok(records)
}

/// Load and index a catalog file
pub fn load_catalog(path: &Path) -> Result<WineIndex> {
    let records = load_records(path)?;
    info!("Loaded {} wines from {}", records.len(), path.display());
    Ok(WineIndex::new(records))
}
