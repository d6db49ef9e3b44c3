//! Exactly-once disconnect notification.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::info;

/// Why an adapter's peer went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The child process exited
    Exited,
    /// The peer closed the connection cleanly
    PeerClosed,
    /// A read or write failed on a live connection
    TransportError,
}

/// A disconnect notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    /// What happened
    pub reason: DisconnectReason,
    /// Exit code, when a process exited
    pub exit_code: Option<i32>,
    /// Detail for transport failures
    pub message: Option<String>,
}

impl Disconnect {
    /// A process exit.
    pub fn exited(exit_code: Option<i32>) -> Self {
        Self {
            reason: DisconnectReason::Exited,
            exit_code,
            message: None,
        }
    }

    /// A clean close by the peer.
    pub fn peer_closed() -> Self {
        Self {
            reason: DisconnectReason::PeerClosed,
            exit_code: None,
            message: None,
        }
    }

    /// An abnormal transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            reason: DisconnectReason::TransportError,
            exit_code: None,
            message: Some(message.into()),
        }
    }

    /// Whether the disconnect was abnormal.
    pub fn is_abnormal(&self) -> bool {
        self.reason == DisconnectReason::TransportError
    }
}

/// Latch that records the first disconnect and ignores the rest.
#[derive(Debug)]
pub struct DisconnectLatch {
    fired: AtomicBool,
    tx: watch::Sender<Option<Disconnect>>,
}

impl Default for DisconnectLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl DisconnectLatch {
    /// Create an unfired latch.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    /// Record a disconnect. Returns false if one was already recorded.
    pub fn fire(&self, disconnect: Disconnect) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(reason = ?disconnect.reason, exit_code = ?disconnect.exit_code, "Disconnected");
        self.tx.send_replace(Some(disconnect));
        true
    }

    /// Whether a disconnect has been recorded.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// The recorded disconnect, if any.
    pub fn get(&self) -> Option<Disconnect> {
        self.tx.borrow().clone()
    }

    /// Receiver that observes the disconnect.
    pub fn subscribe(&self) -> watch::Receiver<Option<Disconnect>> {
        self.tx.subscribe()
    }

    /// Resolve with the disconnect once it has been recorded.
    pub async fn wait(&self) -> Disconnect {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(disconnect) = current {
                return disconnect;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
