//! Inbound file reassembly.
//!
//! Every decrypted payload from the peer is either the metadata of a new file
//! or a chunk of the file currently being received.  Which one it is depends
//! only on the current state:
//!
//! ```text
//!                 metadata (size > 0)
//!  AwaitingMetadata ─────────────────▶ ReceivingContent
//!         ▲                                   │
//!         └──────── written == size ──────────┘
//! ```
//!
//! A metadata payload declaring size zero creates an empty file and leaves the
//! assembler in `AwaitingMetadata`.  A content payload that would write past
//! the declared size is a protocol violation and ends the session.
//!
//! Chunks are written straight to the file and flushed before the next one is
//! accepted, so whatever progress has been reported is on disk if the
//! connection drops mid-file.

use std::path::{Path, PathBuf};

use snftp_core::{FileMetadata, MetadataError};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::events::PeerEvent;

/// Errors raised while writing a received file.  All are fatal to the session.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("invalid file metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file_name}: {chunk}-byte chunk overshoots declared size ({received} of {total} bytes already written)")]
    Overshoot {
        file_name: String,
        chunk: usize,
        received: u64,
        total: u64,
    },
}

/// Where the assembler is in the inbound stream.
#[derive(Debug, Default)]
pub enum ReceiveState {
    /// The next payload must be metadata.
    #[default]
    AwaitingMetadata,
    /// Content for `file_name` is flowing into `path`.
    ReceivingContent {
        file_name: String,
        path: PathBuf,
        total: u64,
        received: u64,
        file: File,
    },
}

/// What a single payload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Metadata accepted; the output file has been created.
    Started {
        file_name: String,
        path: PathBuf,
        total: u64,
    },
    /// A content chunk was written.
    Progress {
        file_name: String,
        received: u64,
        total: u64,
    },
    /// The file is complete and closed.
    Completed { path: PathBuf, size: u64 },
}

impl From<Received> for PeerEvent {
    fn from(received: Received) -> Self {
        match received {
            Received::Started {
                file_name,
                path,
                total,
            } => PeerEvent::ReceiveStarted {
                file_name,
                path,
                total,
            },
            Received::Progress {
                file_name,
                received,
                total,
            } => PeerEvent::ReceiveProgress {
                file_name,
                bytes_received: received,
                total,
            },
            Received::Completed { path, size } => PeerEvent::FileReceived { path, size },
        }
    }
}

/// Turns decrypted payloads into files under a save directory.
#[derive(Debug)]
pub struct ReceiveAssembler {
    save_dir: PathBuf,
    state: ReceiveState,
}

impl ReceiveAssembler {
    /// `save_dir` must already exist and be writable.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            state: ReceiveState::AwaitingMetadata,
        }
    }

    pub fn is_awaiting_metadata(&self) -> bool {
        matches!(self.state, ReceiveState::AwaitingMetadata)
    }

    /// Path of the file currently being written, if any.
    pub fn partial_path(&self) -> Option<&Path> {
        match &self.state {
            ReceiveState::ReceivingContent { path, .. } => Some(path),
            ReceiveState::AwaitingMetadata => None,
        }
    }

    /// Consumes one decrypted payload.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] for malformed metadata, file-system failures,
    /// and content that overshoots the declared size.
    pub async fn handle_frame(&mut self, payload: &[u8]) -> Result<Received, ReceiveError> {
        match std::mem::take(&mut self.state) {
            ReceiveState::AwaitingMetadata => self.start_file(payload).await,
            ReceiveState::ReceivingContent {
                file_name,
                path,
                total,
                received,
                file,
            } => {
                self.write_chunk(payload, file_name, path, total, received, file)
                    .await
            }
        }
    }

    async fn start_file(&mut self, payload: &[u8]) -> Result<Received, ReceiveError> {
        let FileMetadata {
            total_size,
            file_name,
        } = FileMetadata::decode(payload)?;
        let path = self.save_dir.join(&file_name);

        let file = File::create(&path)
            .await
            .map_err(|source| ReceiveError::Create {
                path: path.clone(),
                source,
            })?;

        if total_size == 0 {
            drop(file);
            info!(path = %path.display(), "received empty file");
            return Ok(Received::Completed { path, size: 0 });
        }

        info!(file = %file_name, size = total_size, path = %path.display(), "receiving file");
        self.state = ReceiveState::ReceivingContent {
            file_name: file_name.clone(),
            path: path.clone(),
            total: total_size,
            received: 0,
            file,
        };
        Ok(Received::Started {
            file_name,
            path,
            total: total_size,
        })
    }

    async fn write_chunk(
        &mut self,
        chunk: &[u8],
        file_name: String,
        path: PathBuf,
        total: u64,
        received: u64,
        mut file: File,
    ) -> Result<Received, ReceiveError> {
        let remaining = total - received;
        if chunk.len() as u64 > remaining {
            warn!(
                path = %path.display(),
                chunk = chunk.len(),
                received,
                total,
                "discarding overshooting chunk"
            );
            warn_partial(&path, received, total);
            return Err(ReceiveError::Overshoot {
                file_name,
                chunk: chunk.len(),
                received,
                total,
            });
        }

        if let Err(source) = write_through(&mut file, chunk).await {
            warn_partial(&path, received, total);
            return Err(ReceiveError::Write { path, source });
        }
        let received = received + chunk.len() as u64;

        if received == total {
            drop(file);
            info!(path = %path.display(), size = total, "file received");
            return Ok(Received::Completed { path, size: total });
        }

        debug!(file = %file_name, received, total, "chunk written");
        self.state = ReceiveState::ReceivingContent {
            file_name: file_name.clone(),
            path,
            total,
            received,
            file,
        };
        Ok(Received::Progress {
            file_name,
            received,
            total,
        })
    }
}

/// Writes `chunk` and waits until the file has taken it.
///
/// `tokio::fs::File` completes writes on the blocking pool; the flush makes
/// sure the bytes have reached the OS before the chunk is reported.
async fn write_through(file: &mut File, chunk: &[u8]) -> std::io::Result<()> {
    file.write_all(chunk).await?;
    file.flush().await
}

fn warn_partial(path: &Path, received: u64, total: u64) {
    warn!(
        path = %path.display(),
        received,
        total,
        "transfer ended mid-file; partial file left on disk"
    );
}

impl Drop for ReceiveAssembler {
    fn drop(&mut self) {
        if let ReceiveState::ReceivingContent {
            path,
            received,
            total,
            ..
        } = &self.state
        {
            warn_partial(path, *received, *total);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
