//! Password-based derivation of the session key.
//!
//! Both peers run the same derivation over the same password with the same
//! constant salt, so they arrive at byte-identical keys without exchanging
//! anything on the wire.  The salt is not secret and not random; it only
//! exists because Argon2 requires one.
//!
//! Parameters are the libsodium "interactive" tier (`crypto_pwhash` with
//! `OPSLIMIT_INTERACTIVE` / `MEMLIMIT_INTERACTIVE`): Argon2id v1.3, 2 passes,
//! 64 MiB, 1 lane.  They are fixed; a peer using different parameters would
//! derive a different key and fail on the first frame.

use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the session key in bytes (ChaCha20-Poly1305 key size).
pub const KEY_LEN: usize = 32;

/// Constant 16-byte salt shared by every snftp peer.
pub const SALT: &[u8; 16] = b"snftpsnftpsnftps";

/// Argon2 time cost (passes over memory).
const T_COST: u32 = 2;

/// Argon2 memory cost in KiB (64 MiB).
const M_COST_KIB: u32 = 64 * 1024;

/// Argon2 lanes.
const P_COST: u32 = 1;

/// Errors raised while deriving the session key.
///
/// Both variants are setup errors: the caller must abort before touching the
/// network.
#[derive(Debug, Error, PartialEq)]
pub enum KeyDerivationError {
    /// The Argon2 context rejected the cost parameters.
    #[error("failed to initialise key derivation: {0}")]
    Init(String),

    /// The derivation call itself failed.
    #[error("failed to derive session key: {0}")]
    Derive(String),
}

/// A 32-byte symmetric session key.
///
/// Zeroized on drop.  Deliberately not `Clone`: each connection owns exactly
/// one key, installed once before the first frame is sealed or opened.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Derives the session key from `password`.
///
/// Deterministic: the same password always yields the same key.
///
/// # Errors
///
/// Returns [`KeyDerivationError::Init`] if the parameters are rejected and
/// [`KeyDerivationError::Derive`] if hashing fails.
pub fn derive_session_key(password: &[u8]) -> Result<SessionKey, KeyDerivationError> {
    let params = Params::new(M_COST_KIB, T_COST, P_COST, Some(KEY_LEN))
        .map_err(|e| KeyDerivationError::Init(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    debug!("deriving session key (argon2id, t={T_COST}, m={M_COST_KIB} KiB)");
    let mut key = [0u8; KEY_LEN];
    let result = argon
        .hash_password_into(password, SALT, &mut key)
        .map_err(|e| KeyDerivationError::Derive(e.to_string()));
    let session_key = SessionKey::from_bytes(key);
    key.zeroize();
    result.map(|()| session_key)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_session_key_is_deterministic() {
        // Arrange / Act
        let k1 = derive_session_key(b"correct horse").unwrap();
        let k2 = derive_session_key(b"correct horse").unwrap();

        // Assert
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_derive_session_key_differs_for_different_passwords() {
        let k1 = derive_session_key(b"correct horse").unwrap();
        let k2 = derive_session_key(b"battery staple").unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_derive_session_key_accepts_empty_password() {
        let key = derive_session_key(b"").unwrap();
        assert_ne!(key.as_bytes(), &[0u8; KEY_LEN], "key must not be all zeroes");
    }

    #[test]
    fn test_salt_is_sixteen_bytes() {
        assert_eq!(SALT.len(), 16);
    }

    #[test]
    fn test_session_key_debug_does_not_leak_bytes() {
        let key = SessionKey::from_bytes([0xAB; KEY_LEN]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("171"), "debug output must not print key bytes");
        assert!(!rendered.to_lowercase().contains("ab,"));
    }
}
