//! snftp-peer library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a peer do? (for beginners)
//!
//! Two peers that know the same password open one TCP connection between
//! them.  From then on the connection is symmetric: each side can queue files
//! to send, and each side writes whatever the other sends into its save
//! directory.  Independently of any connection, every peer listens on a UDP
//! port so others on the LAN can find it without typing an address.

/// Application layer: the send queue, the receive state machine, and the
/// events they report.
pub mod application;

/// Infrastructure layer: sockets, configuration, and file-system checks.
pub mod infrastructure;
