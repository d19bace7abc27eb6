//! Discovery datagram alphabet.
//!
//! Every datagram on the discovery port is one of:
//!
//! | Payload            | Meaning                         |
//! |--------------------|---------------------------------|
//! | `0x00` (1 byte)    | query: "who is listening?"      |
//! | `0x01` (1 byte)    | offline notice: "I am leaving"  |
//! | anything else      | announcement: UTF-8 hostname    |
//!
//! No framing, no length prefix, no version byte.

/// Well-known UDP port for discovery traffic.
pub const DISCOVERY_PORT: u16 = 7638;

/// Single-byte query payload.
pub const QUERY_BYTE: u8 = 0x00;

/// Single-byte offline-notice payload.
pub const OFFLINE_BYTE: u8 = 0x01;

/// A parsed discovery datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    /// Ask every listener to announce itself.
    Query,
    /// The sender is shutting down.
    Offline,
    /// The sender's hostname.
    Announce(String),
}

impl DiscoveryMessage {
    /// Parses one datagram.
    ///
    /// Returns `None` for datagrams that carry no meaning: an empty payload,
    /// or an announcement that is not valid UTF-8.  Such datagrams are simply
    /// ignored by the discovery service.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        match datagram {
            [] => None,
            [QUERY_BYTE] => Some(Self::Query),
            [OFFLINE_BYTE] => Some(Self::Offline),
            other => std::str::from_utf8(other)
                .ok()
                .map(|name| Self::Announce(name.to_owned())),
        }
    }

    /// Serialises to the datagram payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Query => vec![QUERY_BYTE],
            Self::Offline => vec![OFFLINE_BYTE],
            Self::Announce(name) => name.as_bytes().to_vec(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_byte() {
        assert_eq!(DiscoveryMessage::parse(&[0x00]), Some(DiscoveryMessage::Query));
    }

    #[test]
    fn test_parse_offline_byte() {
        assert_eq!(DiscoveryMessage::parse(&[0x01]), Some(DiscoveryMessage::Offline));
    }

    #[test]
    fn test_parse_hostname_announcement() {
        assert_eq!(
            DiscoveryMessage::parse(b"workstation"),
            Some(DiscoveryMessage::Announce("workstation".to_string()))
        );
    }

    #[test]
    fn test_parse_other_single_byte_is_an_announcement() {
        assert_eq!(
            DiscoveryMessage::parse(b"a"),
            Some(DiscoveryMessage::Announce("a".to_string()))
        );
    }

    #[test]
    fn test_parse_multi_byte_starting_with_zero_is_an_announcement() {
        assert_eq!(
            DiscoveryMessage::parse(&[0x00, b'x']),
            Some(DiscoveryMessage::Announce("\0x".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_datagram_is_ignored() {
        assert_eq!(DiscoveryMessage::parse(&[]), None);
    }

    #[test]
    fn test_parse_invalid_utf8_is_ignored() {
        assert_eq!(DiscoveryMessage::parse(&[0xC3, 0x28]), None);
    }

    #[test]
    fn test_to_bytes_matches_wire_alphabet() {
        assert_eq!(DiscoveryMessage::Query.to_bytes(), vec![0x00]);
        assert_eq!(DiscoveryMessage::Offline.to_bytes(), vec![0x01]);
        assert_eq!(
            DiscoveryMessage::Announce("host".into()).to_bytes(),
            b"host".to_vec()
        );
    }
}
