//! Workload that captures input and never produces output.

use std::sync::{Arc, Mutex, PoisonError};

use termbridge_core::{Error, Result};

use super::WorkloadRead;
use crate::cancel::CancelToken;
use crate::disconnect::{Disconnect, DisconnectLatch};

/// Records every byte written to it for later assertions.
#[derive(Debug, Default)]
pub struct NullWorkload {
    captured: Mutex<Vec<u8>>,
    latch: Arc<DisconnectLatch>,
}

impl NullWorkload {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn disconnect(&self) -> Arc<DisconnectLatch> {
        Arc::clone(&self.latch)
    }

    pub(crate) async fn read_output(&self, cancel: &CancelToken) -> Result<WorkloadRead> {
        if self.latch.is_fired() {
            return Ok(WorkloadRead::Closed);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.latch.wait() => Ok(WorkloadRead::Closed),
        }
    }

    pub(crate) fn write_input(&self, bytes: &[u8]) -> Result<()> {
        if self.latch.is_fired() {
            return Err(Error::Transport("workload is closed".to_string()));
        }
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(())
    }

    /// Everything written so far.
    pub fn captured(&self) -> Vec<u8> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn shutdown(&self) {
        self.latch.fire(Disconnect::peer_closed());
    }
}
