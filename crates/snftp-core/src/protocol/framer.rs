//! Length-prefixed framing of the TCP byte stream.
//!
//! Wire format:
//! ```text
//! [len:2][body:len]
//! ```
//! `len` is a big-endian `u16` counting only the body (the sealed
//! `nonce || ciphertext || tag` produced by [`crate::crypto::Session`]).
//!
//! # Reassembly (for beginners)
//!
//! TCP delivers a stream of bytes, not messages.  One `read()` may return
//! half a frame, or three frames and the first byte of a fourth.  The
//! [`FrameDecoder`] keeps every byte it has been given in a buffer and only
//! hands out a frame once all of its declared bytes have arrived.  At any
//! moment the buffer holds zero or more complete frames followed by at most
//! one partial frame.

use thiserror::Error;

/// Size of the big-endian length prefix.
pub const LEN_PREFIX: usize = 2;

/// Largest body a frame can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Errors raised by the framing layer.
#[derive(Debug, Error, PartialEq)]
pub enum FramingError {
    /// A frame declared a body length of zero.
    #[error("peer sent a zero-length frame")]
    EmptyFrame,

    /// An outbound body does not fit into the 16-bit length field.
    #[error("frame body of {0} bytes exceeds the 65535-byte limit")]
    FrameTooLarge(usize),
}

/// Prepends the 2-byte length prefix to `body`.
///
/// # Errors
///
/// Returns [`FramingError::FrameTooLarge`] if `body` is longer than
/// [`MAX_FRAME_LEN`], and [`FramingError::EmptyFrame`] if it is empty.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FramingError> {
    if body.is_empty() {
        return Err(FramingError::EmptyFrame);
    }
    let len = u16::try_from(body.len()).map_err(|_| FramingError::FrameTooLarge(body.len()))?;

    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Incremental decoder for the inbound byte stream.
///
/// No upper bound is placed on the internal buffer: a well-formed peer never
/// declares more than it sends, and every declared length is at most
/// [`MAX_FRAME_LEN`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extracts the next complete frame body, if one is buffered.
    ///
    /// Returns `Ok(None)` when fewer than 2 bytes are buffered, or fewer than
    /// the declared body length; the caller should read more input and try
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EmptyFrame`] if the next frame declares a
    /// zero-length body.  The stream cannot be resynchronised afterwards.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if len == 0 {
            return Err(FramingError::EmptyFrame);
        }
        if self.buf.len() < LEN_PREFIX + len {
            return Ok(None);
        }

        let body = self.buf[LEN_PREFIX..LEN_PREFIX + len].to_vec();
        self.buf.drain(..LEN_PREFIX + len);
        Ok(Some(body))
    }

    /// Number of bytes buffered but not yet returned as frames.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
