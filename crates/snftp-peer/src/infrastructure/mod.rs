//! Infrastructure layer for the peer.
//!
//! Contains OS-facing adapters: TCP and UDP sockets, interface and hostname
//! lookup, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `snftp_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
