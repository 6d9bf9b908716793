//! Storage Layer
//!
//! Catalog loading, saved scan sessions and application directories.

pub mod catalog;
pub mod sessions;

use anyhow::Result;
use std::path::PathBuf;

pub use catalog::{load_catalog, load_records};
pub use sessions::{list_sessions, load_session, save_session};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "vinoscan", "VinoScan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Directory saved sessions go to by default
pub fn get_sessions_dir() -> Result<PathBuf> {
    let dir = get_data_dir()?.join("sessions");
    std::fs::create_dir_all(&dir)?;

    Ok(dir)
}
