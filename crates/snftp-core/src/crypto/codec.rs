//! Frame codec: seals and opens one opaque payload.
//!
//! Sealed layout:
//! ```text
//! [nonce:12][ciphertext:N][tag:16]
//! ```
//! A fresh random nonce is drawn from the OS for every call to
//! [`Session::encrypt`].  There is no counter; with 96-bit random nonces the
//! collision probability stays negligible for any realistic transfer volume.
//! No associated data is bound.
//!
//! This module knows nothing about framing or transport; the length prefix is
//! added by [`crate::protocol::framer`].

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use super::kdf::{derive_session_key, KeyDerivationError, SessionKey};
use crate::protocol::framer::MAX_FRAME_LEN;

/// ChaCha20-Poly1305 (IETF) nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Largest plaintext that still fits into one frame after sealing.
pub const MAX_PLAINTEXT_LEN: usize = MAX_FRAME_LEN - NONCE_LEN - TAG_LEN;

/// Errors raised while sealing a payload.
#[derive(Debug, Error, PartialEq)]
pub enum CryptoError {
    /// The plaintext would not fit into a single frame once sealed.
    #[error("payload too large: {len} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The AEAD primitive refused to encrypt.
    #[error("encryption failed")]
    EncryptionFailed,
}

/// Per-connection cryptographic state.
///
/// Owns the connection's [`SessionKey`].  The key is read by every call and
/// never mutated, so a `Session` can be shared by reference between the
/// inbound and outbound halves of a connection.
pub struct Session {
    cipher: ChaCha20Poly1305,
}

impl Session {
    /// Creates a session over an already-derived key.
    pub fn new(key: SessionKey) -> Self {
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
        Self { cipher }
    }

    /// Derives the key from `password` and creates the session.
    ///
    /// # Errors
    ///
    /// Propagates [`KeyDerivationError`] from the KDF.
    pub fn from_password(password: &str) -> Result<Self, KeyDerivationError> {
        derive_session_key(password.as_bytes()).map(Self::new)
    }

    /// Seals `plaintext` and returns `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PayloadTooLarge`] if the sealed frame would
    /// exceed [`MAX_FRAME_LEN`].
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CryptoError::PayloadTooLarge {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_LEN,
            });
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Opens a sealed frame body.
    ///
    /// Returns `None` when the input is shorter than a nonce, or when
    /// authentication fails (wrong key, corrupted or truncated frame).  The
    /// caller must treat `None` as a fatal protocol error for the connection.
    pub fn decrypt(&self, input: &[u8]) -> Option<Vec<u8>> {
        if input.len() < NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = input.split_at(NONCE_LEN);
        self.cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
