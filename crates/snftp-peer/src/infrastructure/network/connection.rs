//! Encrypted TCP session between two peers.
//!
//! # Architecture
//!
//! A [`PeerConnection`] owns one byte stream (normally a `TcpStream`) and
//! splits it into a read half and a write half driven by two loops that run
//! concurrently inside the same task:
//!
//! - **outbound**: asks the [`SendQueue`] for one payload, seals it, frames it,
//!   and awaits `write_all` + `flush` before asking for the next one.  The
//!   socket accepting the bytes is the only flow control.
//! - **inbound**: reads whatever bytes are available, feeds the
//!   [`FrameDecoder`], authenticates every complete frame, and hands the
//!   plaintext to the [`ReceiveAssembler`].
//!
//! Whichever loop finishes first ends the session; the other is dropped.  The
//! queue and the assembler are therefore never touched concurrently and need
//! no locks.
//!
//! The shell talks to a running session through a [`SessionHandle`]: it can
//! queue jobs at any time and close the session.  Dropping every handle only
//! means no further jobs will arrive; the session keeps receiving until the
//! peer disconnects.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use snftp_core::protocol::encode_frame;
use snftp_core::{CryptoError, FrameDecoder, FramingError, KeyDerivationError, Session};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::application::events::{EventSink, JobStatus, PeerEvent};
use crate::application::receive_assembler::{ReceiveAssembler, ReceiveError};
use crate::application::send_queue::{Outgoing, SendError, SendJob, SendQueue, CHUNK_SIZE};

/// Size of the buffer inbound bytes are read into.
const READ_BUF_LEN: usize = 64 * 1024;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A frame failed authentication.  Both peers almost always disagree on
    /// the password.
    #[error("wrong password or corrupted stream")]
    Authentication,

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Receive(#[from] ReceiveError),

    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed or reset the connection.
    #[error("connection closed by peer")]
    Closed,

    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Requests from the shell to a running session.
#[derive(Debug)]
pub enum SessionCommand {
    Enqueue(Vec<SendJob>),
    Close,
}

/// Cloneable handle to a running [`PeerConnection`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Queues one job.  Returns `false` if the session has already ended.
    pub fn enqueue(&self, job: SendJob) -> bool {
        self.enqueue_all(vec![job])
    }

    /// Queues several jobs in order.  Returns `false` if the session has
    /// already ended.
    pub fn enqueue_all(&self, jobs: Vec<SendJob>) -> bool {
        self.tx.send(SessionCommand::Enqueue(jobs)).is_ok()
    }

    /// Asks the session to close.  Jobs still queued are abandoned.
    pub fn close(&self) {
        let _ = self.tx.send(SessionCommand::Close);
    }

    /// `true` once the session has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One established, encrypted session.
pub struct PeerConnection<S> {
    stream: S,
    session: Session,
    save_dir: PathBuf,
    sink: Arc<dyn EventSink>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    chunk_size: usize,
}

impl<S> PeerConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wraps an established stream.  Nothing is read or written until
    /// [`run`](Self::run) is awaited.
    pub fn new(
        stream: S,
        session: Session,
        save_dir: impl Into<PathBuf>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let conn = Self {
            stream,
            session,
            save_dir: save_dir.into(),
            sink,
            commands,
            chunk_size: CHUNK_SIZE,
        };
        (conn, SessionHandle { tx })
    }

    /// Overrides the content chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Drives the session until it closes or fails.
    ///
    /// The outcome is also reported to the event sink: a peer disconnect as
    /// [`PeerEvent::Disconnected`], any other failure as [`PeerEvent::Fatal`].
    /// A local [`SessionHandle::close`] returns `Ok(())` and emits nothing.
    pub async fn run(self) -> Result<(), SessionError> {
        let Self {
            stream,
            session,
            save_dir,
            sink,
            commands,
            chunk_size,
        } = self;

        let (reader, writer) = tokio::io::split(stream);
        let inbound = inbound_loop(
            reader,
            &session,
            ReceiveAssembler::new(save_dir),
            sink.as_ref(),
        );
        let outbound = outbound_loop(
            writer,
            &session,
            SendQueue::with_chunk_size(chunk_size),
            commands,
            sink.as_ref(),
        );

        let result = tokio::select! {
            r = inbound => r,
            r = outbound => r,
        };

        match &result {
            Ok(()) => info!("session closed"),
            Err(SessionError::Closed) => {
                info!("peer disconnected");
                sink.emit(PeerEvent::Disconnected);
            }
            Err(e) => {
                error!("session failed: {e}");
                sink.emit(PeerEvent::Fatal {
                    reason: e.to_string(),
                });
            }
        }
        result
    }
}

/// Reads, authenticates, and reassembles inbound frames until the stream ends.
async fn inbound_loop<R>(
    mut reader: R,
    session: &Session,
    mut assembler: ReceiveAssembler,
    sink: &dyn EventSink,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                if decoder.buffered_len() > 0 {
                    debug!(bytes = decoder.buffered_len(), "stream ended inside a frame");
                }
                return Err(SessionError::Closed);
            }
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => return Err(SessionError::Closed),
            Err(e) => return Err(e.into()),
        };
        decoder.extend(&buf[..n]);

        while let Some(body) = decoder.next_frame()? {
            let payload = session
                .decrypt(&body)
                .ok_or(SessionError::Authentication)?;
            let received = assembler.handle_frame(&payload).await?;
            sink.emit(received.into());
        }
    }
}

/// Sends queued jobs, one frame at a time, for as long as the session lives.
async fn outbound_loop<W>(
    mut writer: W,
    session: &Session,
    mut queue: SendQueue,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    sink: &dyn EventSink,
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut accepting = true;
    let mut active_name = String::new();

    loop {
        // Pick up jobs queued while the previous frame was in flight.
        while accepting {
            match commands.try_recv() {
                Ok(SessionCommand::Enqueue(jobs)) => enqueue(&mut queue, jobs, sink),
                Ok(SessionCommand::Close) => return close(writer, &queue).await,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => accepting = false,
            }
        }

        let Some(out) = queue.next_outgoing().await? else {
            if !accepting {
                // Nothing left to send and nothing can arrive; keep receiving.
                return std::future::pending().await;
            }
            match commands.recv().await {
                Some(SessionCommand::Enqueue(jobs)) => enqueue(&mut queue, jobs, sink),
                Some(SessionCommand::Close) => return close(writer, &queue).await,
                None => accepting = false,
            }
            continue;
        };

        write_frame(&mut writer, session, out.payload()).await?;

        match out {
            Outgoing::Metadata {
                job_id, file_name, ..
            } => {
                sink.emit(PeerEvent::JobStatusChanged {
                    job_id,
                    file_name: file_name.clone(),
                    status: JobStatus::Sending,
                });
                active_name = file_name;
            }
            Outgoing::Content {
                job_id,
                bytes_sent,
                total,
                finished,
                ..
            } => {
                sink.emit(PeerEvent::SendProgress {
                    job_id,
                    bytes_sent,
                    total,
                });
                if finished {
                    sink.emit(PeerEvent::JobStatusChanged {
                        job_id,
                        file_name: std::mem::take(&mut active_name),
                        status: JobStatus::Done,
                    });
                }
            }
        }
    }
}

fn enqueue(queue: &mut SendQueue, jobs: Vec<SendJob>, sink: &dyn EventSink) {
    for job in jobs {
        let file_name = job.file_name().to_string();
        let job_id = queue.push(job);
        sink.emit(PeerEvent::JobStatusChanged {
            job_id,
            file_name,
            status: JobStatus::Waiting,
        });
    }
}

async fn close<W: AsyncWrite + Unpin>(mut writer: W, queue: &SendQueue) -> Result<(), SessionError> {
    let abandoned = queue.len() - queue.cursor();
    if abandoned > 0 {
        warn!(abandoned, "closing session with unsent jobs");
    }
    if let Err(e) = writer.shutdown().await {
        debug!("shutdown after close failed: {e}");
    }
    Ok(())
}

/// Seals `payload`, frames it, and writes it out completely.
async fn write_frame<W>(writer: &mut W, session: &Session, payload: &[u8]) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let sealed = session.encrypt(payload)?;
    let frame = encode_frame(&sealed)?;

    let written = async {
        writer.write_all(&frame).await?;
        writer.flush().await
    }
    .await;

    match written {
        Ok(()) => Ok(()),
        Err(e) if is_disconnect(&e) => Err(SessionError::Closed),
        Err(e) => Err(e.into()),
    }
}

fn is_disconnect(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}

// ── Establishing the stream ───────────────────────────────────────────────────

/// Derives the session key from `password` on the blocking pool.
///
/// Argon2id with 64 MiB of memory takes long enough that it must not run on
/// a runtime worker thread.
pub async fn derive_session(password: Zeroizing<String>) -> Result<Session, KeyDerivationError> {
    info!("deriving session key");
    let session = tokio::task::spawn_blocking(move || Session::from_password(&password))
        .await
        .map_err(|e| KeyDerivationError::Derive(e.to_string()))??;
    info!("session key ready");
    Ok(session)
}

/// Connects to a listening peer.
pub async fn connect(addr: SocketAddr) -> Result<TcpStream, SessionError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| SessionError::ConnectFailed { addr, source })?;
    stream.set_nodelay(true)?;
    info!("connected to peer at {addr}");
    Ok(stream)
}

/// Binds the listening socket for the accepting role.
pub async fn listen(addr: SocketAddr) -> Result<TcpListener, SessionError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| SessionError::BindFailed { addr, source })?;
    info!("listening for a peer on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts exactly one peer, then stops listening.
pub async fn accept_one(listener: TcpListener) -> Result<(TcpStream, SocketAddr), SessionError> {
    let (stream, peer) = listener.accept().await?;
    drop(listener);
    stream.set_nodelay(true)?;
    info!("accepted peer {peer}");
    Ok((stream, peer))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
