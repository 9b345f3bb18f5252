//! Persistent storage
//!
//! Settings persistence and everything needed to get a model file on disk.

pub mod huggingface;
pub mod locator;
pub mod settings;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data directory available on this platform")]
    NoDataDir,
}

/// Application data directory (settings and downloaded models live here)
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("dev", "pocketchat", "PocketChat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
