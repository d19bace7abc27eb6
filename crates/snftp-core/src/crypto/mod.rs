//! Cryptographic layer: password key derivation and per-frame AEAD.
//!
//! - **`kdf`** – Argon2id derivation of the session key from the shared password.
//! - **`codec`** – [`Session`]: seals one plaintext into `nonce || ciphertext || tag`
//!   and opens it again.

pub mod codec;
pub mod kdf;

pub use codec::{CryptoError, Session, MAX_PLAINTEXT_LEN, NONCE_LEN, TAG_LEN};
pub use kdf::{derive_session_key, KeyDerivationError, SessionKey, KEY_LEN, SALT};
