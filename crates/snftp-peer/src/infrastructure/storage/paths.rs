//! File-system checks run before any connection is made.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Why a path cannot be used.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),

    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("{path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is empty")]
    Empty(PathBuf),

    #[error("cannot create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("save directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Checks that `path` can be queued for sending and returns its size.
///
/// # Errors
///
/// Returns a distinct [`PathError`] for a missing path, a non-regular file,
/// an unreadable file, and an empty file.
pub fn validate_send_path(path: &Path) -> Result<u64, PathError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PathError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(PathError::Unreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !meta.is_file() {
        return Err(PathError::NotAFile(path.to_path_buf()));
    }

    File::open(path).map_err(|source| PathError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    if meta.len() == 0 {
        return Err(PathError::Empty(path.to_path_buf()));
    }
    Ok(meta.len())
}

/// Creates `dir` (recursively) and verifies that files can be created in it.
///
/// Writability is probed by creating and removing a uniquely named file.
pub fn prepare_save_dir(dir: &Path) -> Result<PathBuf, PathError> {
    std::fs::create_dir_all(dir).map_err(|source| PathError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let probe = dir.join(format!(".snftp-probe-{}", Uuid::new_v4()));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .map_err(|source| PathError::NotWritable {
            path: dir.to_path_buf(),
            source,
        })?;
    if let Err(e) = std::fs::remove_file(&probe) {
        debug!(probe = %probe.display(), error = %e, "could not remove write probe");
    }

    Ok(dir.to_path_buf())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snftp_paths_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_regular_file_returns_its_size() {
        let dir = temp_dir();
        let path = dir.join("f.txt");
        std::fs::write(&path, b"12345").unwrap();

        assert_eq!(validate_send_path(&path).unwrap(), 5);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let path = temp_dir().join("nope");
        assert!(matches!(validate_send_path(&path), Err(PathError::NotFound(_))));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = temp_dir();
        assert!(matches!(validate_send_path(&dir), Err(PathError::NotAFile(_))));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = temp_dir();
        let path = dir.join("empty");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(validate_send_path(&path), Err(PathError::Empty(_))));
    }

    #[test]
    fn test_prepare_save_dir_creates_nested_directories() {
        // Arrange
        let dir = temp_dir().join("a").join("b");

        // Act
        let prepared = prepare_save_dir(&dir).unwrap();

        // Assert
        assert_eq!(prepared, dir);
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0, "probe removed");
    }

    #[test]
    fn test_prepare_save_dir_fails_when_path_is_a_file() {
        let dir = temp_dir();
        let file = dir.join("occupied");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            prepare_save_dir(&file),
            Err(PathError::CreateDir { .. })
        ));
    }
}
