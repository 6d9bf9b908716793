//! Saved scan sessions
//!
//! One pretty-printed JSON file per session, named after its start time.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::session::ScanSession;

/// File name for a session, e.g. `scan-20240312-193005.json`
fn session_file_name(session: &ScanSession) -> String {
    format!("scan-{}.json", session.start_time.format("%Y%m%d-%H%M%S"))
}

/// Save a session into `dir`, returning the written path
pub fn save_session(session: &ScanSession, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;

    let path = dir.join(session_file_name(session));
    let content = serde_json::to_string_pretty(session)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write session: {}", path.display()))?;

    info!("Saved session with {} wines to {}", session.len(), path.display());
    Ok(path)
}

/// Load a saved session
pub fn load_session(path: &Path) -> Result<ScanSession> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session: {}", path.display()))?;
    let session: ScanSession = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session: {}", path.display()))?;
    Ok(session)
}

/// Saved session files in `dir`, oldest first
pub fn list_sessions(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("scan-"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}
