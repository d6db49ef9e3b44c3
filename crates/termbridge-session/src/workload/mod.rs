//! Workload adapters: the side that produces output and consumes input.
//!
//! All variants share one contract: [`Workload::read_output`] suspends until
//! data, end of stream or cancellation; [`Workload::write_input`] delivers
//! bytes; [`Workload::resize`] is best-effort; the [`DisconnectLatch`] fires
//! exactly once when the peer goes away.

mod direct;
mod null;
mod process;
mod stream;

use std::sync::Arc;

use termbridge_core::{Dimensions, InputEvent, PumpSettings, Result, SpawnConfig};
use termbridge_emulator::ModeFlags;

use crate::cancel::CancelToken;
use crate::disconnect::DisconnectLatch;
use crate::input::encode_input;

pub use direct::{DirectHandle, DirectWorkload};
pub use null::NullWorkload;
pub use process::ProcessWorkload;
pub use stream::StreamWorkload;

/// Result of one [`Workload::read_output`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadRead {
    /// A chunk of output bytes
    Data(Vec<u8>),
    /// The workload is gone; every later read returns this too
    Closed,
}

/// Which variant a [`Workload`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// Child process on a PTY
    Process,
    /// In-process byte queue
    Direct,
    /// Remote byte stream
    Stream,
    /// Captures writes, produces nothing
    Null,
}

/// A producer of terminal output and consumer of input.
#[derive(Debug)]
pub enum Workload {
    /// Child process on a PTY
    Process(ProcessWorkload),
    /// In-process byte queue
    Direct(DirectWorkload),
    /// Remote byte stream
    Stream(StreamWorkload),
    /// Captures writes, produces nothing
    Null(NullWorkload),
}

impl Workload {
    /// Spawn a child process on a new PTY.
    pub fn process(config: &SpawnConfig, settings: &PumpSettings) -> Result<Self> {
        ProcessWorkload::spawn(config, settings).map(Workload::Process)
    }

    /// In-process workload plus the handle the application drives it with.
    pub fn direct() -> (Self, DirectHandle) {
        let (workload, handle) = DirectWorkload::new();
        (Workload::Direct(workload), handle)
    }

    /// Workload backed by any async byte stream.
    pub fn stream<R, W>(reader: R, writer: W) -> Self
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
        W: tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        Workload::Stream(StreamWorkload::new(reader, writer))
    }

    /// Workload that records writes and never produces output.
    pub fn null() -> Self {
        Workload::Null(NullWorkload::new())
    }

    /// Variant tag.
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Process(_) => WorkloadKind::Process,
            Workload::Direct(_) => WorkloadKind::Direct,
            Workload::Stream(_) => WorkloadKind::Stream,
            Workload::Null(_) => WorkloadKind::Null,
        }
    }

    /// Suspend until output, end of stream or cancellation.
    ///
    /// Returns [`termbridge_core::Error::Cancelled`] when `cancel` fires
    /// before any data arrives.
    pub async fn read_output(&self, cancel: &CancelToken) -> Result<WorkloadRead> {
        match self {
            Workload::Process(w) => w.read_output(cancel).await,
            Workload::Direct(w) => w.read_output(cancel).await,
            Workload::Stream(w) => w.read_output(cancel).await,
            Workload::Null(w) => w.read_output(cancel).await,
        }
    }

    /// Deliver raw input bytes.
    pub async fn write_input(&self, bytes: &[u8], cancel: &CancelToken) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match self {
            Workload::Process(w) => w.write_input(bytes, cancel).await,
            Workload::Direct(w) => w.write_input(bytes),
            Workload::Stream(w) => w.write_input(bytes, cancel).await,
            Workload::Null(w) => w.write_input(bytes),
        }
    }

    /// Deliver a decoded input event.
    ///
    /// The in-process workload receives the event as is; byte-oriented
    /// workloads receive its encoding under `modes`.
    pub async fn send_input(
        &self,
        event: &InputEvent,
        modes: &ModeFlags,
        cancel: &CancelToken,
    ) -> Result<()> {
        match self {
            Workload::Direct(w) => w.send_event(event.clone()),
            _ => self.write_input(&encode_input(event, modes), cancel).await,
        }
    }

    /// Best-effort resize; failures are logged, never returned.
    pub async fn resize(&self, dimensions: Dimensions) {
        match self {
            Workload::Process(w) => w.resize(dimensions).await,
            Workload::Direct(w) => w.resize(dimensions),
            Workload::Stream(_) | Workload::Null(_) => {
                tracing::debug!(?dimensions, "Workload cannot resize its peer; ignoring");
            }
        }
    }

    /// The latch that fires when this workload disconnects.
    pub fn disconnect(&self) -> Arc<DisconnectLatch> {
        match self {
            Workload::Process(w) => w.disconnect(),
            Workload::Direct(w) => w.disconnect(),
            Workload::Stream(w) => w.disconnect(),
            Workload::Null(w) => w.disconnect(),
        }
    }

    /// Exit code of a process workload, once it has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.disconnect().get().and_then(|d| d.exit_code)
    }

    /// Child process id of a process workload.
    pub fn pid(&self) -> Option<u32> {
        match self {
            Workload::Process(w) => w.pid(),
            _ => None,
        }
    }

    /// Bytes written to a null workload so far.
    pub fn captured_input(&self) -> Option<Vec<u8>> {
        match self {
            Workload::Null(w) => Some(w.captured()),
            _ => None,
        }
    }

    /// Tear the workload down: kill a process, close a stream.
    pub async fn shutdown(&self) {
        match self {
            Workload::Process(w) => w.shutdown().await,
            Workload::Direct(w) => w.shutdown(),
            Workload::Stream(w) => w.shutdown().await,
            Workload::Null(w) => w.shutdown(),
        }
    }
}
