//! Facts about the local machine used by discovery.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::warn;

/// Name used when the OS does not reveal one.
pub const FALLBACK_HOSTNAME: &str = "snftp";

/// Returns this machine's hostname.
///
/// Checks `COMPUTERNAME` (Windows) and `HOSTNAME`, then `/etc/hostname`.
/// macOS exports neither variable and has no `/etc/hostname`, so on Unix the
/// `hostname` utility is asked last.  Falls back to [`FALLBACK_HOSTNAME`].
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
        .and_then(non_empty)
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok().and_then(non_empty))
        .or_else(hostname_command)
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

fn non_empty(name: String) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(unix)]
fn hostname_command() -> Option<String> {
    let output = std::process::Command::new("hostname").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().and_then(non_empty)
}

#[cfg(not(unix))]
fn hostname_command() -> Option<String> {
    None
}

/// Returns every address assigned to a local interface, loopback included.
///
/// Discovery uses this set to ignore its own broadcasts.  If interfaces
/// cannot be enumerated only the loopback addresses are returned, and
/// datagrams this host sends from other addresses will show up as a peer.
pub fn local_addresses() -> HashSet<IpAddr> {
    let mut addrs: HashSet<IpAddr> =
        [IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)].into();

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => addrs.extend(interfaces.iter().map(|iface| iface.ip())),
        Err(e) => warn!("could not enumerate network interfaces: {e}"),
    }
    addrs
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }

    #[test]
    fn test_hostname_has_no_trailing_newline() {
        assert_eq!(hostname(), hostname().trim());
    }

    #[test]
    fn test_blank_names_are_skipped() {
        assert_eq!(non_empty("  \n".into()), None);
        assert_eq!(non_empty("mac-mini.local\n".into()), Some("mac-mini.local".into()));
    }

    #[test]
    fn test_local_addresses_include_loopback() {
        let addrs = local_addresses();
        assert!(addrs.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }
}
