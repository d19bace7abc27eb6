//! Storage infrastructure: configuration file persistence and file-system
//! checks.
//!
//! - **`config`** – Reads and writes the optional TOML configuration file.
//! - **`paths`** – Prepares the save directory and validates files before
//!   they are queued for sending.

pub mod config;
pub mod paths;
