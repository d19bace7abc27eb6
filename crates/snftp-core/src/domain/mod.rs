//! Domain layer: pure state with no I/O.
//!
//! - **`roster`** – The set of peers currently visible on the LAN.

pub mod roster;

pub use roster::{DiscoveredHost, Roster};
