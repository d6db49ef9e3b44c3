//! Remote byte-stream workload over any tokio reader/writer pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use termbridge_core::{Error, Result};

use super::WorkloadRead;
use crate::cancel::CancelToken;
use crate::disconnect::{Disconnect, DisconnectLatch};

const READ_BUFFER_SIZE: usize = 4096;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Workload whose output and input travel over an async byte stream,
/// such as a socket split into halves.
pub struct StreamWorkload {
    reader: Mutex<BoxedReader>,
    writer: Mutex<BoxedWriter>,
    latch: Arc<DisconnectLatch>,
    closed: AtomicBool,
    closing: CancelToken,
}

impl std::fmt::Debug for StreamWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWorkload")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl StreamWorkload {
    pub(crate) fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(Box::new(reader)),
            writer: Mutex::new(Box::new(writer)),
            latch: Arc::new(DisconnectLatch::new()),
            closed: AtomicBool::new(false),
            closing: CancelToken::new(),
        }
    }

    pub(crate) fn disconnect(&self) -> Arc<DisconnectLatch> {
        Arc::clone(&self.latch)
    }

    fn close_with(&self, disconnect: Disconnect) {
        self.closed.store(true, Ordering::SeqCst);
        self.latch.fire(disconnect);
    }

    pub(crate) async fn read_output(&self, cancel: &CancelToken) -> Result<WorkloadRead> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(WorkloadRead::Closed);
        }
        let mut reader = self.reader.lock().await;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let n = tokio::select! {
            biased;
            read = reader.read(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => {
                    warn!("Stream read failed: {e}");
                    self.close_with(Disconnect::transport(e.to_string()));
                    return Err(Error::Io(e));
                }
            },
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = self.closing.cancelled() => return Ok(WorkloadRead::Closed),
        };
        if n == 0 {
            debug!("Stream reached end of file");
            self.close_with(Disconnect::peer_closed());
            return Ok(WorkloadRead::Closed);
        }
        buf.truncate(n);
        Ok(WorkloadRead::Data(buf))
    }

    pub(crate) async fn write_input(&self, bytes: &[u8], cancel: &CancelToken) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport("stream is closed".to_string()));
        }
        let mut writer = self.writer.lock().await;
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => result,
        };
        written.map_err(|e| {
            warn!("Stream write failed: {e}");
            self.close_with(Disconnect::transport(e.to_string()));
            Error::Io(e)
        })
    }

    pub(crate) async fn shutdown(&self) {
        self.closing.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Stream shutdown: {e}");
        }
        self.close_with(Disconnect::peer_closed());
    }
}
