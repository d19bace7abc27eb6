//! Outbound file queue.
//!
//! # How sending works (for beginners)
//!
//! Files leave this peer strictly one after another.  The queue holds every
//! job ever submitted during the session together with a cursor pointing at
//! the active job; everything before the cursor is finished, everything after
//! it is waiting.
//!
//! Each call to [`SendQueue::next_outgoing`] produces exactly one payload for
//! the active job:
//!
//! 1. the first payload of a job is its metadata (size and file name);
//! 2. every following payload is the next content chunk of at most
//!    [`CHUNK_SIZE`] bytes, read from disk on demand;
//! 3. after the chunk that completes the file the cursor advances.
//!
//! The session driver only asks for the next payload after the previous frame
//! has been written to the socket, so at most one chunk of a file is ever in
//! memory.  There is no per-chunk acknowledgement from the receiver.

use std::path::{Path, PathBuf};

use snftp_core::crypto::MAX_PLAINTEXT_LEN;
use snftp_core::protocol::metadata::validate_file_name;
use snftp_core::{FileMetadata, MetadataError};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::events::JobId;

/// Largest content payload read from disk per step.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Errors raised while preparing or reading an outbound job.
///
/// Every variant is fatal to the session: the receiver has no way to learn
/// that a partially sent file was abandoned.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("cannot send {path}: {source}")]
    InvalidName {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("cannot send {0}: file is empty")]
    EmptyFile(PathBuf),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} shrank while being sent: ended after {read} of {expected} bytes")]
    Truncated {
        path: PathBuf,
        read: u64,
        expected: u64,
    },
}

/// One file to transmit.
#[derive(Debug)]
pub struct SendJob {
    id: JobId,
    path: PathBuf,
    file_name: String,
    total_size: u64,
    bytes_read: u64,
    metadata_sent: bool,
    /// Opened lazily on the first content read, closed once the last byte
    /// has been read.
    file: Option<File>,
}

impl SendJob {
    /// Creates a job for `path`, whose size the caller has already checked.
    ///
    /// The transmitted name is the final path component.  It must be a name
    /// the receiver will accept, and `total_size` must be non-zero.
    pub fn new(path: impl Into<PathBuf>, total_size: u64) -> Result<Self, SendError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| SendError::NoFileName(path.clone()))?;

        validate_file_name(&file_name).map_err(|source| SendError::InvalidName {
            path: path.clone(),
            source,
        })?;

        if total_size == 0 {
            return Err(SendError::EmptyFile(path));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            path,
            file_name,
            total_size,
            bytes_read: 0,
            metadata_sent: false,
            file: None,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn metadata_sent(&self) -> bool {
        self.metadata_sent
    }

    pub fn is_complete(&self) -> bool {
        self.metadata_sent && self.bytes_read == self.total_size
    }

    async fn read_chunk(&mut self, chunk_size: usize) -> Result<Vec<u8>, SendError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path)
                .await
                .map_err(|source| SendError::Open {
                    path: self.path.clone(),
                    source,
                })?,
        };
        let file = self.file.insert(file);

        let remaining = self.total_size - self.bytes_read;
        let want = remaining.min(chunk_size as u64) as usize;
        let mut chunk = vec![0u8; want];

        let mut filled = 0;
        while filled < want {
            let n = file
                .read(&mut chunk[filled..])
                .await
                .map_err(|source| SendError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                return Err(SendError::Truncated {
                    path: self.path.clone(),
                    read: self.bytes_read + filled as u64,
                    expected: self.total_size,
                });
            }
            filled += n;
        }

        self.bytes_read += want as u64;
        if self.bytes_read == self.total_size {
            self.file = None;
        }
        Ok(chunk)
    }
}

/// A plaintext payload ready to be sealed and framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// First payload of a job.
    Metadata {
        job_id: JobId,
        file_name: String,
        payload: Vec<u8>,
    },
    /// One chunk of file content.
    Content {
        job_id: JobId,
        payload: Vec<u8>,
        /// Content bytes of this job sent so far, including this chunk.
        bytes_sent: u64,
        total: u64,
        /// `true` for the chunk that completes the job.
        finished: bool,
    },
}

impl Outgoing {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Metadata { job_id, .. } | Self::Content { job_id, .. } => *job_id,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Metadata { payload, .. } | Self::Content { payload, .. } => payload,
        }
    }
}

/// Ordered outbound jobs plus the active-job cursor.
#[derive(Debug)]
pub struct SendQueue {
    jobs: Vec<SendJob>,
    /// Index of the active job; equal to `jobs.len()` when idle.
    cursor: usize,
    chunk_size: usize,
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SendQueue {
    pub fn new() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    /// Creates a queue that reads `chunk_size` bytes per step.
    ///
    /// The value is clamped to what fits in one sealed frame.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            jobs: Vec::new(),
            cursor: 0,
            chunk_size: chunk_size.clamp(1, MAX_PLAINTEXT_LEN),
        }
    }

    /// Appends a job and returns its id.
    pub fn push(&mut self, job: SendJob) -> JobId {
        let id = job.id;
        debug!(job = %id, file = %job.file_name, size = job.total_size, "job queued");
        self.jobs.push(job);
        id
    }

    /// `true` when every queued job has been fully sent.
    pub fn is_idle(&self) -> bool {
        self.cursor == self.jobs.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[SendJob] {
        &self.jobs
    }

    /// Produces the next payload of the active job, or `None` when idle.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the active file cannot be opened or read,
    /// or when it turns out shorter than the size announced in its metadata.
    pub async fn next_outgoing(&mut self) -> Result<Option<Outgoing>, SendError> {
        let chunk_size = self.chunk_size;
        let Some(job) = self.jobs.get_mut(self.cursor) else {
            return Ok(None);
        };

        if !job.metadata_sent {
            let payload = FileMetadata::new(job.total_size, job.file_name.clone())
                .encode()
                .map_err(|source| SendError::InvalidName {
                    path: job.path.clone(),
                    source,
                })?;
            job.metadata_sent = true;
            info!(job = %job.id, file = %job.file_name, size = job.total_size, "sending file");
            return Ok(Some(Outgoing::Metadata {
                job_id: job.id,
                file_name: job.file_name.clone(),
                payload,
            }));
        }

        let payload = job.read_chunk(chunk_size).await?;
        let finished = job.is_complete();
        let outgoing = Outgoing::Content {
            job_id: job.id,
            payload,
            bytes_sent: job.bytes_read,
            total: job.total_size,
            finished,
        };

        if finished {
            info!(job = %job.id, file = %job.file_name, "file sent");
            self.cursor += 1;
        }
        Ok(Some(outgoing))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snftp_send_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("payload.bin");
        std::fs::write(&path, contents).unwrap();
        path
    }

    // ── SendJob ───────────────────────────────────────────────────────────────

    #[test]
    fn test_job_takes_final_path_component_as_name() {
        let job = SendJob::new("/some/dir/report.pdf", 10).unwrap();
        assert_eq!(job.file_name(), "report.pdf");
        assert!(!job.metadata_sent());
        assert_eq!(job.bytes_read(), 0);
    }

    #[test]
    fn test_job_rejects_zero_size() {
        let err = SendJob::new("/tmp/empty.txt", 0).unwrap_err();
        assert!(matches!(err, SendError::EmptyFile(_)));
    }

    #[test]
    fn test_job_rejects_path_without_file_name() {
        let err = SendJob::new("/", 5).unwrap_err();
        assert!(matches!(err, SendError::NoFileName(_)));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = SendJob::new("/a/x", 1).unwrap();
        let b = SendJob::new("/a/x", 1).unwrap();
        assert_ne!(a.id(), b.id());
    }

    // ── SendQueue ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_queue_is_idle_and_yields_nothing() {
        let mut queue = SendQueue::new();
        assert!(queue.is_idle());
        assert!(queue.next_outgoing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_step_emits_metadata_only() {
        // Arrange
        let path = temp_file(b"hello");
        let mut queue = SendQueue::new();
        queue.push(SendJob::new(&path, 5).unwrap());

        // Act
        let out = queue.next_outgoing().await.unwrap().unwrap();

        // Assert
        let Outgoing::Metadata { file_name, payload, .. } = out else {
            panic!("expected metadata first");
        };
        assert_eq!(file_name, "payload.bin");
        let decoded = FileMetadata::decode(&payload).unwrap();
        assert_eq!(decoded.total_size, 5);
        assert_eq!(decoded.file_name, "payload.bin");
        assert_eq!(queue.cursor(), 0);
    }

    #[tokio::test]
    async fn test_content_is_chunked_and_cursor_advances_after_last_chunk() {
        // Arrange: 10 bytes, 4-byte chunks
        let data: Vec<u8> = (0u8..10).collect();
        let path = temp_file(&data);
        let mut queue = SendQueue::with_chunk_size(4);
        queue.push(SendJob::new(&path, 10).unwrap());

        // Act
        let mut contents = Vec::new();
        let mut finishes = Vec::new();
        queue.next_outgoing().await.unwrap();
        while let Some(out) = queue.next_outgoing().await.unwrap() {
            let Outgoing::Content { payload, finished, .. } = out else {
                panic!("unexpected second metadata");
            };
            contents.push(payload);
            finishes.push(finished);
        }

        // Assert
        assert_eq!(contents.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(contents.concat(), data);
        assert_eq!(finishes, vec![false, false, true]);
        assert!(queue.is_idle());
        assert!(queue.jobs()[0].is_complete());
    }

    #[tokio::test]
    async fn test_jobs_are_sent_in_order_without_interleaving() {
        // Arrange
        let a = temp_file(b"aaaa");
        let b = temp_file(b"bb");
        let mut queue = SendQueue::with_chunk_size(3);
        let id_a = queue.push(SendJob::new(&a, 4).unwrap());
        let id_b = queue.push(SendJob::new(&b, 2).unwrap());

        // Act
        let mut order = Vec::new();
        while let Some(out) = queue.next_outgoing().await.unwrap() {
            let kind = matches!(out, Outgoing::Metadata { .. });
            order.push((out.job_id(), kind));
        }

        // Assert: metadata, content, content for A, then metadata, content for B
        assert_eq!(
            order,
            vec![
                (id_a, true),
                (id_a, false),
                (id_a, false),
                (id_b, true),
                (id_b, false),
            ]
        );
        assert_eq!(queue.cursor(), 2);
    }

    #[tokio::test]
    async fn test_job_pushed_while_idle_resumes_the_queue() {
        let mut queue = SendQueue::new();
        let first = temp_file(b"1");
        queue.push(SendJob::new(&first, 1).unwrap());
        while queue.next_outgoing().await.unwrap().is_some() {}
        assert!(queue.is_idle());

        let second = temp_file(b"2");
        let id = queue.push(SendJob::new(&second, 1).unwrap());

        assert!(!queue.is_idle());
        let out = queue.next_outgoing().await.unwrap().unwrap();
        assert_eq!(out.job_id(), id);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_with_its_path() {
        let path = std::env::temp_dir().join(format!("snftp_missing_{}", Uuid::new_v4()));
        let mut queue = SendQueue::new();
        queue.push(SendJob::new(&path, 3).unwrap());

        queue.next_outgoing().await.unwrap();
        let err = queue.next_outgoing().await.unwrap_err();

        match err {
            SendError::Open { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Open error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_shorter_than_declared_size_is_truncation() {
        let path = temp_file(b"abc");
        let mut queue = SendQueue::new();
        queue.push(SendJob::new(&path, 8).unwrap());

        queue.next_outgoing().await.unwrap();
        let err = queue.next_outgoing().await.unwrap_err();

        assert!(matches!(err, SendError::Truncated { read: 3, expected: 8, .. }));
    }

    #[test]
    fn test_chunk_size_is_clamped_to_frame_capacity() {
        let queue = SendQueue::with_chunk_size(usize::MAX);
        assert_eq!(queue.chunk_size, MAX_PLAINTEXT_LEN);
        let queue = SendQueue::with_chunk_size(0);
        assert_eq!(queue.chunk_size, 1);
    }
}
