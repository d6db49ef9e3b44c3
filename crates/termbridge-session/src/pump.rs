//! The two I/O pumps and their lifecycle handles.
//!
//! The output pump moves workload output through the parser into state and
//! on to the presentation. The input pump moves presentation input to the
//! workload. Each runs as its own task and stops independently; neither
//! stops its sibling. Disconnects are reported to the control loop.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use termbridge_core::{Dimensions, Error, InputEvent};

use crate::cancel::CancelToken;
use crate::engine::Engine;
use crate::presentation::Presentation;
use crate::workload::{Workload, WorkloadRead};

/// Lifecycle of one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    /// Created, not started
    Idle,
    /// Moving data
    Running,
    /// Asked to stop, finishing the current step
    Cancelling,
    /// Finished
    Stopped,
}

/// Messages from the pumps to the orchestrator's control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ControlMessage {
    WorkloadExited,
    PresentationClosed,
    PresentationResized(Dimensions),
}

/// Shared writer side of a pump's state.
#[derive(Debug, Clone)]
pub(crate) struct PumpStatus {
    tx: Arc<watch::Sender<PumpState>>,
}

impl PumpStatus {
    fn set(&self, state: PumpState) {
        self.tx.send_replace(state);
    }

    /// Running -> Cancelling; any other state is left alone.
    fn begin_cancel(&self) {
        self.tx.send_if_modified(|state| {
            if *state == PumpState::Running {
                *state = PumpState::Cancelling;
                true
            } else {
                false
            }
        });
    }
}

/// Handle to a running pump task.
#[derive(Debug)]
pub struct PumpHandle {
    name: &'static str,
    status: PumpStatus,
    state: watch::Receiver<PumpState>,
    cancel: CancelToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PumpHandle {
    /// Spawn `run` as a pump task, moving it from Idle to Running.
    pub(crate) fn start<F, Fut>(name: &'static str, cancel: CancelToken, run: F) -> Self
    where
        F: FnOnce(PumpStatus, CancelToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, state) = watch::channel(PumpState::Idle);
        let status = PumpStatus { tx: Arc::new(tx) };
        status.set(PumpState::Running);
        debug!(pump = name, "Pump started");

        let body = run(status.clone(), cancel.clone());
        let finished = status.clone();
        let task = tokio::spawn(async move {
            body.await;
            finished.set(PumpState::Stopped);
            debug!(pump = name, "Pump stopped");
        });

        Self {
            name,
            status,
            state,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Pump name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PumpState {
        *self.state.borrow()
    }

    /// Ask the pump to stop after its current step.
    pub fn cancel(&self) {
        self.status.begin_cancel();
        self.cancel.cancel();
    }

    /// Resolve once the pump has stopped.
    pub async fn stopped(&self) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|state| *state == PumpState::Stopped).await;
    }

    /// Wait for the pump task to finish.
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    warn!(pump = self.name, "Pump task failed: {e}");
                }
            }
            None => self.stopped().await,
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Workload output -> parser -> state -> presentation.
///
/// A chunk that was already read is always processed before cancellation
/// is honoured.
pub(crate) async fn run_output_pump(
    engine: Arc<Engine>,
    workload: Arc<Workload>,
    control: mpsc::UnboundedSender<ControlMessage>,
    status: PumpStatus,
    cancel: CancelToken,
) {
    loop {
        match workload.read_output(&cancel).await {
            Ok(WorkloadRead::Data(bytes)) => {
                debug!(bytes = bytes.len(), "Workload output");
                let processed = engine.process_output(&bytes);
                engine.deliver(&bytes, processed, &cancel).await;
                if cancel.is_cancelled() {
                    status.begin_cancel();
                    break;
                }
            }
            Ok(WorkloadRead::Closed) => {
                info!("Workload closed its output");
                status.begin_cancel();
                engine.reset_parser();
                let _ = control.send(ControlMessage::WorkloadExited);
                break;
            }
            Err(Error::Cancelled) => {
                status.begin_cancel();
                break;
            }
            Err(e) => {
                warn!("Workload read failed: {e}");
                status.begin_cancel();
                engine.reset_parser();
                let _ = control.send(ControlMessage::WorkloadExited);
                break;
            }
        }
    }
}

/// Presentation input -> workload (or the capture buffer).
pub(crate) async fn run_input_pump(
    engine: Arc<Engine>,
    presentation: Arc<Presentation>,
    control: mpsc::UnboundedSender<ControlMessage>,
    status: PumpStatus,
    cancel: CancelToken,
) {
    loop {
        match presentation.read_input(&cancel).await {
            Ok(Some(InputEvent::Resize { dimensions })) => {
                let _ = control.send(ControlMessage::PresentationResized(dimensions));
            }
            Ok(Some(event)) => match engine.inject(event, &cancel).await {
                Ok(()) => {}
                Err(Error::Cancelled) => {
                    status.begin_cancel();
                    break;
                }
                // The workload's own latch reports the disconnect.
                Err(e) => debug!("Input not delivered: {e}"),
            },
            Ok(None) => {
                info!("Presentation input closed");
                status.begin_cancel();
                let _ = control.send(ControlMessage::PresentationClosed);
                break;
            }
            Err(Error::Cancelled) => {
                status.begin_cancel();
                break;
            }
            Err(e) => {
                warn!("Presentation read failed: {e}");
                status.begin_cancel();
                let _ = control.send(ControlMessage::PresentationClosed);
                break;
            }
        }
    }
}
