//! In-process workload: the application writes ANSI bytes and receives
//! decoded input events, with no OS transport in between.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use termbridge_core::{Dimensions, Error, InputEvent, Result};

use super::WorkloadRead;
use crate::cancel::CancelToken;
use crate::disconnect::{Disconnect, DisconnectLatch};

#[derive(Debug)]
enum Outbound {
    Data(Vec<u8>),
    Flush(oneshot::Sender<()>),
    Close,
}

#[derive(Debug)]
struct OutputQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    // A control message pulled off the queue while coalescing data.
    stash: Option<Outbound>,
}

/// Workload side of the in-process queue.
#[derive(Debug)]
pub struct DirectWorkload {
    output: Mutex<OutputQueue>,
    // Wakes a blocked reader on shutdown.
    closer: mpsc::UnboundedSender<Outbound>,
    input_tx: mpsc::UnboundedSender<InputEvent>,
    latch: Arc<DisconnectLatch>,
}

/// Application side of the in-process queue.
#[derive(Debug)]
pub struct DirectHandle {
    output_tx: mpsc::UnboundedSender<Outbound>,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
}

impl DirectWorkload {
    pub(crate) fn new() -> (Self, DirectHandle) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        (
            Self {
                output: Mutex::new(OutputQueue {
                    rx: output_rx,
                    stash: None,
                }),
                closer: output_tx.clone(),
                input_tx,
                latch: Arc::new(DisconnectLatch::new()),
            },
            DirectHandle {
                output_tx,
                input_rx,
            },
        )
    }

    pub(crate) fn disconnect(&self) -> Arc<DisconnectLatch> {
        Arc::clone(&self.latch)
    }

    pub(crate) async fn read_output(&self, cancel: &CancelToken) -> Result<WorkloadRead> {
        if self.latch.is_fired() {
            return Ok(WorkloadRead::Closed);
        }
        let mut queue = self.output.lock().await;
        loop {
            let message = match queue.stash.take() {
                Some(message) => Some(message),
                None => tokio::select! {
                    biased;
                    message = queue.rx.recv() => message,
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                },
            };
            match message {
                Some(Outbound::Data(mut bytes)) => {
                    while let Ok(next) = queue.rx.try_recv() {
                        match next {
                            Outbound::Data(more) => bytes.extend(more),
                            other => {
                                queue.stash = Some(other);
                                break;
                            }
                        }
                    }
                    return Ok(WorkloadRead::Data(bytes));
                }
                // Everything queued before the marker has been handed out.
                Some(Outbound::Flush(ack)) => {
                    let _ = ack.send(());
                }
                Some(Outbound::Close) | None => {
                    self.latch.fire(Disconnect::peer_closed());
                    return Ok(WorkloadRead::Closed);
                }
            }
        }
    }

    pub(crate) fn write_input(&self, bytes: &[u8]) -> Result<()> {
        self.send_event(InputEvent::Raw {
            bytes: bytes.to_vec(),
        })
    }

    pub(crate) fn send_event(&self, event: InputEvent) -> Result<()> {
        self.input_tx
            .send(event)
            .map_err(|_| Error::Transport("application input channel closed".to_string()))
    }

    pub(crate) fn resize(&self, dimensions: Dimensions) {
        if self.input_tx.send(InputEvent::Resize { dimensions }).is_err() {
            debug!("Resize dropped: application no longer listening");
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.closer.send(Outbound::Close);
        self.latch.fire(Disconnect::peer_closed());
    }
}

impl DirectHandle {
    /// Queue ANSI output toward the presentation.
    pub fn write(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.output_tx
            .send(Outbound::Data(bytes.into()))
            .map_err(|_| Error::Transport("terminal is gone".to_string()))
    }

    /// Wait until everything written so far has been taken by the output pump.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.output_tx
            .send(Outbound::Flush(tx))
            .map_err(|_| Error::Transport("terminal is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::Transport("terminal closed before flushing".to_string()))
    }

    /// Next decoded input event, or None once the terminal is gone.
    pub async fn next_event(&mut self) -> Option<InputEvent> {
        self.input_rx.recv().await
    }

    /// Next input event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<InputEvent> {
        self.input_rx.try_recv().ok()
    }

    /// Signal end of output. Dropping the handle does the same.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for DirectHandle {
    fn drop(&mut self) {
        let _ = self.output_tx.send(Outbound::Close);
    }
}
