//! The metadata payload that opens every file transfer.
//!
//! Layout (plaintext, before sealing):
//! ```text
//! [total_size:8][file_name:N]
//! ```
//! `total_size` is a big-endian `u64`.  The file name is UTF-8 and runs to the
//! end of the payload; there is no delimiter and no length field.

use std::path::{Component, Path};

use thiserror::Error;

use crate::crypto::MAX_PLAINTEXT_LEN;

/// Size of the big-endian total-size field.
pub const SIZE_FIELD_LEN: usize = 8;

/// Longest file name (in bytes) that still fits into one metadata frame.
pub const MAX_FILE_NAME_LEN: usize = MAX_PLAINTEXT_LEN - SIZE_FIELD_LEN;

/// Errors raised while building or parsing a metadata payload.
#[derive(Debug, Error, PartialEq)]
pub enum MetadataError {
    /// The payload is too short to hold the size field.
    #[error("metadata payload is {0} bytes, need at least 8")]
    TooShort(usize),

    /// The file name bytes are not valid UTF-8.
    #[error("file name is not valid UTF-8")]
    InvalidUtf8,

    /// The file name is empty.
    #[error("file name is empty")]
    EmptyName,

    /// The file name would escape the save directory.
    #[error("unsafe file name rejected: {0:?}")]
    UnsafeName(String),

    /// The file name does not fit into a single frame.
    #[error("file name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },
}

/// Declared size and name of the file that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Exact number of content bytes that will follow.
    pub total_size: u64,
    /// Bare file name, no directory components.
    pub file_name: String,
}

impl FileMetadata {
    /// Builds the metadata for a file.
    pub fn new(total_size: u64, file_name: impl Into<String>) -> Self {
        Self {
            total_size,
            file_name: file_name.into(),
        }
    }

    /// Serialises to the wire layout.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NameTooLong`] if the payload would not fit
    /// into one frame, or a name-validation error.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        validate_file_name(&self.file_name)?;

        let mut buf = Vec::with_capacity(SIZE_FIELD_LEN + self.file_name.len());
        buf.extend_from_slice(&self.total_size.to_be_bytes());
        buf.extend_from_slice(self.file_name.as_bytes());
        Ok(buf)
    }

    /// Parses a decrypted metadata payload.
    ///
    /// The name is validated so it can be joined onto the save directory
    /// without escaping it.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the payload is short, the name is not
    /// UTF-8, or the name is unsafe.
    pub fn decode(payload: &[u8]) -> Result<Self, MetadataError> {
        if payload.len() < SIZE_FIELD_LEN {
            return Err(MetadataError::TooShort(payload.len()));
        }
        let (size, name) = payload.split_at(SIZE_FIELD_LEN);
        let mut size_bytes = [0u8; SIZE_FIELD_LEN];
        size_bytes.copy_from_slice(size);

        let file_name = std::str::from_utf8(name).map_err(|_| MetadataError::InvalidUtf8)?;
        validate_file_name(file_name)?;

        Ok(Self {
            total_size: u64::from_be_bytes(size_bytes),
            file_name: file_name.to_owned(),
        })
    }
}

/// Checks that `name` is a single, non-empty path component.
///
/// Rejects `/`, `\`, `:`, NUL, `.` and `..`.  Both separators and the Windows
/// drive separator are rejected on every platform because the sending peer may
/// run a different OS, and a name like `C:x` joined onto a Windows path
/// replaces the save directory.
///
/// # Errors
///
/// Returns [`MetadataError::EmptyName`], [`MetadataError::UnsafeName`], or
/// [`MetadataError::NameTooLong`].
pub fn validate_file_name(name: &str) -> Result<(), MetadataError> {
    if name.is_empty() {
        return Err(MetadataError::EmptyName);
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(MetadataError::NameTooLong {
            len: name.len(),
            max: MAX_FILE_NAME_LEN,
        });
    }
    if name.contains(['/', '\\', ':', '\0']) || !is_single_normal_component(name) {
        return Err(MetadataError::UnsafeName(name.to_owned()));
    }
    Ok(())
}

fn is_single_normal_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
