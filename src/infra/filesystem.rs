//! Filesystem operations
//!
//! Handles file and directory operations.

use std::path::Path;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a file; returns whether it existed
pub fn remove_file(path: &Path) -> Result<bool, FilesystemError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FilesystemError::Remove {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Write content to a file, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Write content through a sibling temp file and rename it into place
///
/// Readers never observe a partially written file.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<(), FilesystemError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    write_file(&tmp, content)?;
    std::fs::rename(&tmp, path).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}
