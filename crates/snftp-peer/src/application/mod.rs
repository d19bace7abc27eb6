//! Application layer for the peer.
//!
//! # Sub-modules
//!
//! - **`events`** – The [`events::PeerEvent`] stream reported to whatever shell
//!   drives the peer, and the [`events::EventSink`] contract it is delivered
//!   through.
//!
//! - **`send_queue`** – Ordered outbound jobs, turned into metadata and
//!   content payloads one chunk at a time.
//!
//! - **`receive_assembler`** – Two-state machine that turns decrypted inbound
//!   payloads into files in the save directory.
//!
//! Neither the queue nor the assembler touches a socket; the session driver in
//! `infrastructure::network::connection` feeds them.

pub mod events;
pub mod receive_assembler;
pub mod send_queue;
