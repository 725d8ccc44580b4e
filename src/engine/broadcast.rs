use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ProcessingError, Result};

/// Resolve a broadcast side file to a readable local path.
///
/// Called once per worker before any keyed processing. A missing or empty
/// file is fatal for the task.
pub fn load_broadcast_file(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(ProcessingError::MissingBroadcast(path.to_path_buf()));
    }
    let len = std::fs::metadata(path)?.len();
    if len == 0 {
        return Err(ProcessingError::EmptyBroadcast(path.to_path_buf()));
    }
    debug!(path = %path.display(), bytes = len, "broadcast file available");
    Ok(path.to_path_buf())
}
