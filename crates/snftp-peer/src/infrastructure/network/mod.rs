//! Network infrastructure for the peer.
//!
//! # Sub-modules
//!
//! - **`connection`** – Drives one encrypted TCP session: seals and frames the
//!   send queue's payloads on the way out, reassembles, authenticates and
//!   hands frames to the receive assembler on the way in.  Also holds the
//!   listen/connect helpers that establish the stream.
//!
//! - **`discovery`** – Answers and issues UDP broadcast datagrams so peers on
//!   the LAN can find each other, maintaining the roster of hosts seen.
//!
//! - **`host`** – This machine's hostname and local interface addresses.

pub mod connection;
pub mod discovery;
pub mod host;
