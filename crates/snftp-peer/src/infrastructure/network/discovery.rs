//! UDP broadcast-based peer discovery.
//!
//! Every peer binds a UDP socket on the discovery port (default 7638) and
//! keeps a [`Roster`] of the hosts it has heard from.  Three kinds of datagram
//! travel on that port:
//!
//! | Payload             | Meaning                    | Reaction                              |
//! |---------------------|----------------------------|---------------------------------------|
//! | `0x00`              | "who is out there?"        | reply with our hostname to the sender |
//! | `0x01`              | "I am going offline"       | drop the sender from the roster       |
//! | anything else, UTF-8| hostname announcement      | add the sender unless already listed  |
//!
//! Datagrams whose source is one of this machine's own interface addresses
//! are ignored, so a peer never lists itself.  Malformed datagrams are logged
//! at `debug` and otherwise ignored.
//!
//! # Lifecycle
//!
//! - **refresh**: clear the roster, broadcast a query, and (optionally)
//!   broadcast our own hostname so already-running peers list us at once.
//! - **shutdown**: broadcast an offline notice and close the socket.
//!
//! Discovery is best effort.  A send that fails while the service is running
//! is logged and the service carries on.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use snftp_core::protocol::DISCOVERY_PORT;
use snftp_core::{DiscoveryMessage, Roster};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::host;
use crate::application::events::{EventSink, PeerEvent};

/// Largest datagram read from the socket.
const MAX_DATAGRAM_LEN: usize = 64 * 1024;

/// Error type for discovery service operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The socket could not be switched to broadcast mode.
    #[error("failed to enable broadcast on discovery socket: {0}")]
    Broadcast(#[source] std::io::Error),
    /// A datagram could not be sent.
    #[error("failed to send discovery datagram to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Addresses and identity used by a [`DiscoveryService`].
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Local address the socket binds to.
    pub bind_addr: SocketAddr,
    /// Where queries, announcements, and offline notices are broadcast.
    pub broadcast_addr: SocketAddr,
    /// Name announced to other peers.
    pub hostname: String,
    /// Also announce ourselves on refresh.
    pub announce_on_refresh: bool,
}

impl DiscoveryConfig {
    /// Binds all interfaces on `port` and broadcasts to `255.255.255.255:port`.
    pub fn new(port: u16, hostname: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            broadcast_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port),
            hostname: hostname.into(),
            announce_on_refresh: true,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new(DISCOVERY_PORT, host::hostname())
    }
}

/// Requests sent to a spawned [`DiscoveryService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryCommand {
    Refresh,
    Shutdown,
}

/// Cloneable handle to a spawned [`DiscoveryService`].
#[derive(Debug, Clone)]
pub struct DiscoveryHandle {
    tx: mpsc::UnboundedSender<DiscoveryCommand>,
}

impl DiscoveryHandle {
    pub fn refresh(&self) {
        let _ = self.tx.send(DiscoveryCommand::Refresh);
    }

    /// Broadcasts the offline notice and stops the service.
    pub fn shutdown(&self) {
        let _ = self.tx.send(DiscoveryCommand::Shutdown);
    }
}

/// The discovery endpoint of one peer.
pub struct DiscoveryService {
    socket: UdpSocket,
    config: DiscoveryConfig,
    local_addrs: HashSet<IpAddr>,
    roster: Roster,
    sink: Arc<dyn EventSink>,
}

impl DiscoveryService {
    /// Binds `config.bind_addr` and enables broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::BindFailed`] if the port is taken and
    /// [`DiscoveryError::Broadcast`] if broadcast cannot be enabled.
    pub async fn bind(
        config: DiscoveryConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, DiscoveryError> {
        let addr = config.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DiscoveryError::BindFailed { addr, source })?;
        let service = Self::from_socket(socket, config, sink)?;
        info!("discovery listening on UDP {addr}");
        Ok(service)
    }

    /// Wraps an already bound socket.  Local addresses are looked up from the
    /// OS; override them with [`with_local_addresses`](Self::with_local_addresses).
    pub fn from_socket(
        socket: UdpSocket,
        config: DiscoveryConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, DiscoveryError> {
        socket.set_broadcast(true).map_err(DiscoveryError::Broadcast)?;
        Ok(Self {
            socket,
            config,
            local_addrs: host::local_addresses(),
            roster: Roster::new(),
            sink,
        })
    }

    /// Replaces the set of addresses treated as "this machine".
    pub fn with_local_addresses(mut self, addrs: HashSet<IpAddr>) -> Self {
        self.local_addrs = addrs;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Applies one inbound datagram from `src` to the roster.
    ///
    /// Returns the payload to send back to the sender, if any.
    pub fn handle_datagram(&mut self, src: IpAddr, datagram: &[u8]) -> Option<Vec<u8>> {
        if self.local_addrs.contains(&src) {
            return None;
        }

        let Some(message) = DiscoveryMessage::parse(datagram) else {
            debug!(%src, len = datagram.len(), "ignoring malformed discovery datagram");
            return None;
        };

        match message {
            DiscoveryMessage::Query => {
                debug!(%src, "answering discovery query");
                Some(DiscoveryMessage::Announce(self.config.hostname.clone()).to_bytes())
            }
            DiscoveryMessage::Offline => {
                if let Some(host) = self.roster.remove(src) {
                    info!(%src, hostname = %host.hostname, "peer went offline");
                    self.sink.emit(PeerEvent::HostLeft(host));
                }
                None
            }
            DiscoveryMessage::Announce(hostname) => {
                if self.roster.insert(src, hostname) {
                    if let Some(host) = self.roster.get(src) {
                        info!(%src, hostname = %host.hostname, "peer discovered");
                        self.sink.emit(PeerEvent::HostDiscovered(host.clone()));
                    }
                }
                None
            }
        }
    }

    /// Clears the roster and asks the LAN to announce itself again.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Send`] if a broadcast cannot be sent.  The
    /// roster is cleared regardless.
    pub async fn refresh(&mut self) -> Result<(), DiscoveryError> {
        self.roster.clear();
        self.sink.emit(PeerEvent::RosterCleared);
        info!("refreshing discovery roster");

        self.broadcast(&DiscoveryMessage::Query).await?;
        if self.config.announce_on_refresh {
            let announce = DiscoveryMessage::Announce(self.config.hostname.clone());
            self.broadcast(&announce).await?;
        }
        Ok(())
    }

    /// Broadcasts the offline notice and closes the socket.
    pub async fn shutdown(self) -> Result<(), DiscoveryError> {
        let result = self.broadcast(&DiscoveryMessage::Offline).await;
        info!("discovery stopped");
        result
    }

    /// Serves datagrams and commands until told to shut down.
    ///
    /// Dropping every sender of `commands` counts as a shutdown request.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<DiscoveryCommand>,
    ) -> Result<(), DiscoveryError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

        loop {
            tokio::select! {
                recv = self.socket.recv_from(&mut buf) => match recv {
                    Ok((len, src)) => {
                        if let Some(reply) = self.handle_datagram(src.ip(), &buf[..len]) {
                            if let Err(e) = self.socket.send_to(&reply, src).await {
                                warn!(%src, "failed to answer discovery query: {e}");
                            }
                        }
                    }
                    // ICMP port-unreachable surfaces here on some platforms.
                    Err(e) => warn!("discovery recv error: {e}"),
                },
                cmd = commands.recv() => match cmd {
                    Some(DiscoveryCommand::Refresh) => {
                        if let Err(e) = self.refresh().await {
                            warn!("discovery refresh incomplete: {e}");
                        }
                    }
                    Some(DiscoveryCommand::Shutdown) | None => return self.shutdown().await,
                },
            }
        }
    }

    /// Runs the service on its own task.
    pub fn spawn(self) -> (DiscoveryHandle, JoinHandle<Result<(), DiscoveryError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (DiscoveryHandle { tx }, task)
    }

    async fn broadcast(&self, message: &DiscoveryMessage) -> Result<(), DiscoveryError> {
        let target = self.config.broadcast_addr;
        self.socket
            .send_to(&message.to_bytes(), target)
            .await
            .map_err(|source| DiscoveryError::Send { target, source })?;
        debug!(%target, ?message, "discovery datagram sent");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use snftp_core::DiscoveredHost;

    use super::*;
    use crate::application::events::MockEventSink;

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    async fn service(sink: MockEventSink) -> DiscoveryService {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DiscoveryConfig::new(0, "me");
        DiscoveryService::from_socket(socket, config, Arc::new(sink))
            .unwrap()
            .with_local_addresses(HashSet::from([IpAddr::V4(Ipv4Addr::LOCALHOST)]))
    }

    fn silent_sink() -> MockEventSink {
        let mut sink = MockEventSink::new();
        sink.expect_emit().never();
        sink
    }

    #[test]
    fn test_default_config_uses_discovery_port_and_limited_broadcast() {
        let cfg = DiscoveryConfig::new(DISCOVERY_PORT, "h");
        assert_eq!(cfg.bind_addr, "0.0.0.0:7638".parse().unwrap());
        assert_eq!(cfg.broadcast_addr, "255.255.255.255:7638".parse().unwrap());
        assert!(cfg.announce_on_refresh);
    }

    #[tokio::test]
    async fn test_query_is_answered_with_hostname() {
        let mut svc = service(silent_sink()).await;

        let reply = svc.handle_datagram(PEER, &[0x00]);

        assert_eq!(reply, Some(b"me".to_vec()));
        assert!(svc.roster().is_empty());
    }

    #[tokio::test]
    async fn test_announcement_adds_host_once() {
        // Arrange
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|e| {
                *e == PeerEvent::HostDiscovered(DiscoveredHost {
                    address: PEER,
                    hostname: "alice".into(),
                })
            })
            .times(1)
            .return_const(());
        let mut svc = service(sink).await;

        // Act
        let first = svc.handle_datagram(PEER, b"alice");
        let second = svc.handle_datagram(PEER, b"renamed");

        // Assert
        assert!(first.is_none() && second.is_none());
        assert_eq!(svc.roster().len(), 1);
        assert_eq!(svc.roster().get(PEER).unwrap().hostname, "alice");
    }

    #[tokio::test]
    async fn test_offline_removes_known_host() {
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|e| matches!(e, PeerEvent::HostDiscovered(_)))
            .times(1)
            .return_const(());
        sink.expect_emit()
            .withf(|e| matches!(e, PeerEvent::HostLeft(h) if h.address == PEER))
            .times(1)
            .return_const(());
        let mut svc = service(sink).await;
        svc.handle_datagram(PEER, b"alice");

        svc.handle_datagram(PEER, &[0x01]);

        assert!(svc.roster().is_empty());
    }

    #[tokio::test]
    async fn test_offline_from_unknown_host_is_ignored() {
        let mut svc = service(silent_sink()).await;
        assert!(svc.handle_datagram(PEER, &[0x01]).is_none());
        assert!(svc.roster().is_empty());
    }

    #[tokio::test]
    async fn test_own_datagrams_are_ignored() {
        let mut svc = service(silent_sink()).await;
        let me = IpAddr::V4(Ipv4Addr::LOCALHOST);

        assert!(svc.handle_datagram(me, &[0x00]).is_none());
        assert!(svc.handle_datagram(me, b"me").is_none());
        assert!(svc.roster().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_datagrams_are_ignored() {
        let mut svc = service(silent_sink()).await;

        assert!(svc.handle_datagram(PEER, &[]).is_none());
        assert!(svc.handle_datagram(PEER, &[0xff, 0xfe]).is_none());
        assert!(svc.roster().is_empty());
    }

    #[tokio::test]
    async fn test_same_hostname_from_two_addresses_is_two_entries() {
        let mut sink = MockEventSink::new();
        sink.expect_emit().times(2).return_const(());
        let mut svc = service(sink).await;
        let other = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 7));

        svc.handle_datagram(PEER, b"twin");
        svc.handle_datagram(other, b"twin");

        assert_eq!(svc.roster().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_clears_roster_and_emits_cleared() {
        // Arrange: broadcast to a loopback sink socket so the test needs no LAN
        let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|e| matches!(e, PeerEvent::HostDiscovered(_)))
            .return_const(());
        sink.expect_emit()
            .withf(|e| *e == PeerEvent::RosterCleared)
            .times(1)
            .return_const(());
        let mut svc = service(sink).await;
        svc.config.broadcast_addr = target.local_addr().unwrap();
        svc.handle_datagram(PEER, b"alice");

        // Act
        svc.refresh().await.unwrap();

        // Assert
        assert!(svc.roster().is_empty());
        let mut buf = [0u8; 16];
        let (n, _) = target.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x00]);
        let (n, _) = target.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"me");
    }

    #[tokio::test]
    async fn test_shutdown_broadcasts_offline() {
        let target = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut svc = service(silent_sink()).await;
        svc.config.broadcast_addr = target.local_addr().unwrap();

        svc.shutdown().await.unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = target.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x01]);
    }
}
