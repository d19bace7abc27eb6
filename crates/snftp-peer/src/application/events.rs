//! Events reported to the shell.
//!
//! The core never renders anything.  It emits discrete [`PeerEvent`]s through
//! an [`EventSink`] and leaves presentation to the caller: the `snftp` binary
//! logs them, a GUI would update its lists and progress bars.

use std::path::PathBuf;

use snftp_core::DiscoveredHost;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one outbound file job.
pub type JobId = Uuid;

/// Lifecycle of an outbound job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued behind the active job.
    Waiting,
    /// Metadata sent; content is flowing.
    Sending,
    /// Every content byte has been handed to the transport.
    Done,
}

/// Something the shell may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    JobStatusChanged {
        job_id: JobId,
        file_name: String,
        status: JobStatus,
    },
    SendProgress {
        job_id: JobId,
        bytes_sent: u64,
        total: u64,
    },
    ReceiveStarted {
        file_name: String,
        path: PathBuf,
        total: u64,
    },
    ReceiveProgress {
        file_name: String,
        bytes_received: u64,
        total: u64,
    },
    FileReceived {
        path: PathBuf,
        size: u64,
    },
    HostDiscovered(DiscoveredHost),
    HostLeft(DiscoveredHost),
    RosterCleared,
    /// The peer closed the connection.
    Disconnected,
    /// The connection was torn down; `reason` is meant for the user.
    Fatal {
        reason: String,
    },
}

/// Receives [`PeerEvent`]s.
///
/// Implementations must not block: events are emitted from inside the
/// connection and discovery loops.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PeerEvent);
}

/// Channel-backed sink.  A closed receiver silently drops events.
impl EventSink for mpsc::UnboundedSender<PeerEvent> {
    fn emit(&self, event: PeerEvent) {
        let _ = self.send(event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_events_in_order() {
        // Arrange
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Act
        tx.emit(PeerEvent::RosterCleared);
        tx.emit(PeerEvent::Disconnected);

        // Assert
        assert_eq!(rx.try_recv().unwrap(), PeerEvent::RosterCleared);
        assert_eq!(rx.try_recv().unwrap(), PeerEvent::Disconnected);
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(PeerEvent::RosterCleared);
    }

    #[test]
    fn test_mock_sink_records_expected_call() {
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|e| matches!(e, PeerEvent::Fatal { reason } if reason == "boom"))
            .times(1)
            .return_const(());

        sink.emit(PeerEvent::Fatal {
            reason: "boom".to_string(),
        });
    }
}
