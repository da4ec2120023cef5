//! Application data directory resolution.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

const APP_DIR_NAME: &str = "voxnote";

/// Platform data directory for persisted state (`config.json`, `history.json`).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub(crate) fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(path)
        .map_err(|e| CoreError::persistence(format!("creating {}: {e}", path.display())))
}
