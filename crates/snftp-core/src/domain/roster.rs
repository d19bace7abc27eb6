//! Roster of peers found through LAN discovery.
//!
//! Entries are keyed by network address, not hostname: two machines with the
//! same hostname are two entries, and a second announcement from an address
//! that is already listed is ignored (the first hostname wins).  Entries leave
//! only on an explicit offline notice or when the whole roster is cleared by a
//! refresh; there is no expiry.

use std::net::IpAddr;

/// A peer visible on the LAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    /// Address the announcement came from.
    pub address: IpAddr,
    /// Hostname carried by the announcement.
    pub hostname: String,
}

/// Address-keyed set of discovered hosts, in discovery order.
#[derive(Debug, Default)]
pub struct Roster {
    hosts: Vec<DiscoveredHost>,
}

impl Roster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host unless its address is already present.
    ///
    /// Returns `true` if the host was inserted.
    pub fn insert(&mut self, address: IpAddr, hostname: impl Into<String>) -> bool {
        if self.contains(address) {
            return false;
        }
        self.hosts.push(DiscoveredHost {
            address,
            hostname: hostname.into(),
        });
        true
    }

    /// Removes the host at `address`, returning it if it was present.
    pub fn remove(&mut self, address: IpAddr) -> Option<DiscoveredHost> {
        let index = self.hosts.iter().position(|h| h.address == address)?;
        Some(self.hosts.remove(index))
    }

    /// Forgets every host.
    pub fn clear(&mut self) {
        self.hosts.clear();
    }

    /// Whether a host at `address` is listed.
    pub fn contains(&self, address: IpAddr) -> bool {
        self.hosts.iter().any(|h| h.address == address)
    }

    /// The host listed at `address`, if any.
    pub fn get(&self, address: IpAddr) -> Option<&DiscoveredHost> {
        self.hosts.iter().find(|h| h.address == address)
    }

    /// Hosts in the order they were discovered.
    pub fn hosts(&self) -> &[DiscoveredHost] {
        &self.hosts
    }

    /// Number of listed hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether no host is listed.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
