//! PTY-backed child process workload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{debug, info, warn};

use termbridge_core::{Dimensions, Error, PumpSettings, Result, SpawnConfig};
use termbridge_emulator::{PtyBridge, ReadResult, WaitStatus};

use super::WorkloadRead;
use crate::cancel::CancelToken;
use crate::disconnect::{Disconnect, DisconnectLatch};

const REAP_TIMEOUT: Duration = Duration::from_secs(1);

enum Poll {
    Data(Vec<u8>),
    Idle,
    /// The child is gone and the master holds nothing more.
    Drained,
    Eof,
}

/// Child process running on its own PTY.
///
/// Reads poll the master with a short timeout on the blocking pool, so a
/// read stays cancellable without spinning.
#[derive(Debug)]
pub struct ProcessWorkload {
    pty: Arc<PtyBridge>,
    latch: Arc<DisconnectLatch>,
    closed: AtomicBool,
    chunk_size: usize,
    poll_interval: Duration,
}

impl ProcessWorkload {
    /// Spawn the child described by `config`.
    pub fn spawn(config: &SpawnConfig, settings: &PumpSettings) -> Result<Self> {
        let pty = PtyBridge::spawn(config)?;
        Ok(Self {
            pty: Arc::new(pty),
            latch: Arc::new(DisconnectLatch::new()),
            closed: AtomicBool::new(false),
            chunk_size: settings.read_chunk_size.max(1),
            poll_interval: settings.poll_interval(),
        })
    }

    /// Child process id.
    pub fn pid(&self) -> Option<u32> {
        self.pty.pid()
    }

    pub(crate) fn disconnect(&self) -> Arc<DisconnectLatch> {
        Arc::clone(&self.latch)
    }

    pub(crate) async fn read_output(&self, cancel: &CancelToken) -> Result<WorkloadRead> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(WorkloadRead::Closed);
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let pty = Arc::clone(&self.pty);
            let chunk_size = self.chunk_size;
            let poll_interval = self.poll_interval;
            let polled = task::spawn_blocking(move || -> Result<Poll> {
                let readable = pty.poll_readable(poll_interval)?;
                if !readable && pty.is_alive() {
                    return Ok(Poll::Idle);
                }
                // The child may have written its last bytes after the poll
                // timed out, so an exited child is still read to empty.
                let mut buf = vec![0u8; chunk_size];
                match pty.read(&mut buf)? {
                    ReadResult::Data(n) => {
                        buf.truncate(n);
                        Ok(Poll::Data(buf))
                    }
                    ReadResult::Empty if pty.is_alive() => Ok(Poll::Idle),
                    ReadResult::Empty => Ok(Poll::Drained),
                    ReadResult::Eof => Ok(Poll::Eof),
                }
            })
            .await
            .map_err(|e| Error::Transport(format!("PTY reader task failed: {e}")))?;

            match polled {
                Ok(Poll::Data(bytes)) => return Ok(WorkloadRead::Data(bytes)),
                // A grandchild can keep the slave open after the child exits.
                Ok(Poll::Drained) | Ok(Poll::Eof) => {
                    self.finish().await;
                    return Ok(WorkloadRead::Closed);
                }
                Ok(Poll::Idle) => continue,
                Err(e) => {
                    warn!("PTY read failed: {e}");
                    self.closed.store(true, Ordering::SeqCst);
                    self.latch.fire(Disconnect::transport(e.to_string()));
                    return Err(e);
                }
            }
        }
    }

    /// Reap the child and fire the latch with its exit code.
    async fn finish(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let pty = Arc::clone(&self.pty);
        let status = task::spawn_blocking(move || pty.wait(REAP_TIMEOUT)).await;
        let exit_code = match status {
            Ok(Ok(WaitStatus::Exited(code))) => Some(code),
            Ok(Ok(WaitStatus::TimedOut)) => {
                debug!("PTY closed but child still running");
                None
            }
            Ok(Err(e)) => {
                warn!("Failed to reap PTY child: {e}");
                None
            }
            Err(e) => {
                warn!("PTY wait task failed: {e}");
                None
            }
        };
        self.latch.fire(Disconnect::exited(exit_code));
    }

    pub(crate) async fn write_input(&self, bytes: &[u8], cancel: &CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport("workload has exited".to_string()));
        }
        let pty = Arc::clone(&self.pty);
        let data = bytes.to_vec();
        let result = task::spawn_blocking(move || pty.write(&data))
            .await
            .map_err(|e| Error::Transport(format!("PTY writer task failed: {e}")))?;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("PTY write failed: {e}");
                self.latch.fire(Disconnect::transport(e.to_string()));
                Err(e)
            }
        }
    }

    pub(crate) async fn resize(&self, dimensions: Dimensions) {
        let pty = Arc::clone(&self.pty);
        match task::spawn_blocking(move || pty.resize(dimensions)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("PTY resize failed, keeping logical size: {e}"),
            Err(e) => warn!("PTY resize task failed: {e}"),
        }
    }

    pub(crate) async fn shutdown(&self) {
        if self.pty.is_alive() {
            info!(pid = ?self.pty.pid(), "Shutting down process workload");
            let pty = Arc::clone(&self.pty);
            let killed = task::spawn_blocking(move || pty.kill()).await;
            if let Ok(Err(e)) = killed {
                warn!("Failed to kill PTY child: {e}");
            }
        }
        self.finish().await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> SpawnConfig {
        SpawnConfig::new("/bin/sh").arg("-c").arg(script)
    }

    async fn drain(workload: &ProcessWorkload) -> Vec<u8> {
        let cancel = CancelToken::new();
        let mut out = Vec::new();
        loop {
            match workload.read_output(&cancel).await.unwrap() {
                WorkloadRead::Data(bytes) => out.extend(bytes),
                WorkloadRead::Closed => return out,
            }
        }
    }

    #[tokio::test]
    async fn test_reads_until_closed_and_reports_exit() {
        let workload = ProcessWorkload::spawn(&sh("printf out; exit 7"), &PumpSettings::default())
            .unwrap();
        let out = tokio::time::timeout(Duration::from_secs(10), drain(&workload))
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&out).contains("out"));

        let latch = workload.disconnect();
        assert_eq!(latch.get(), Some(Disconnect::exited(Some(7))));

        // Later reads keep reporting end of stream
        let again = workload.read_output(&CancelToken::new()).await.unwrap();
        assert_eq!(again, WorkloadRead::Closed);
    }

    #[tokio::test]
    async fn test_last_output_survives_exit() {
        // Short polls keep hitting the window where the poll has timed
        // out but the child writes and exits before the liveness check.
        let settings = PumpSettings {
            read_chunk_size: 64,
            poll_interval_ms: 1,
            ..PumpSettings::default()
        };
        for _ in 0..5 {
            let workload =
                ProcessWorkload::spawn(&sh("sleep 0.05; seq 1 2000; printf tail"), &settings)
                    .unwrap();
            let out = tokio::time::timeout(Duration::from_secs(10), drain(&workload))
                .await
                .unwrap();
            let out = String::from_utf8_lossy(&out);
            assert!(out.contains("2000\r\ntail"), "lost output: {out:?}");
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_idle_read() {
        let workload = ProcessWorkload::spawn(&sh("sleep 30"), &PumpSettings::default()).unwrap();
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match workload.read_output(&cancel).await {
                    Ok(WorkloadRead::Data(_)) => continue,
                    other => return other,
                }
            }
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        workload.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_fires_latch_once() {
        let workload = ProcessWorkload::spawn(&sh("sleep 30"), &PumpSettings::default()).unwrap();
        workload.shutdown().await;
        let first = workload.disconnect().get().unwrap();
        assert!(first.exit_code.is_some());
        workload.shutdown().await;
        assert_eq!(workload.disconnect().get().unwrap(), first);
    }
}
