//! # snftp-core
//!
//! Shared library for snftp containing the encrypted wire protocol, the
//! password-based key derivation, and the LAN discovery codec.
//!
//! This crate is used by the peer application and by its tests.  It has zero
//! dependencies on network sockets, the file system, or any UI.
//!
//! # Architecture overview (for beginners)
//!
//! snftp moves a sequence of files between two machines over one TCP
//! connection.  Both machines type the same password; every byte on the wire
//! is encrypted and authenticated under a key derived from that password.
//!
//! - **`crypto`** – Turns the password into a 32-byte session key (Argon2id)
//!   and seals/opens individual frames with ChaCha20-Poly1305.
//!
//! - **`protocol`** – How bytes travel over the network: the 2-byte
//!   length-prefixed framing of the TCP stream, the per-file metadata payload,
//!   and the single-datagram discovery messages.
//!
//! - **`domain`** – The roster of peers found on the LAN.

pub mod crypto;
pub mod domain;
pub mod protocol;

pub use crypto::{derive_session_key, CryptoError, KeyDerivationError, Session, SessionKey};
pub use domain::roster::{DiscoveredHost, Roster};
pub use protocol::discovery::DiscoveryMessage;
pub use protocol::framer::{FrameDecoder, FramingError};
pub use protocol::metadata::{FileMetadata, MetadataError};
