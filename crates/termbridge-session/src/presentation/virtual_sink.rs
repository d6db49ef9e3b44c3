//! In-memory presentation for tests and headless embedding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use termbridge_core::{Capabilities, Dimensions, Error, InputEvent, Result};

use crate::cancel::CancelToken;

#[derive(Debug)]
struct Shared {
    output: Mutex<Vec<u8>>,
    dimensions: Mutex<Dimensions>,
    interactive: AtomicBool,
    input_tx: Mutex<Option<mpsc::UnboundedSender<InputEvent>>>,
}

/// Presentation that records output and replays scripted input.
#[derive(Debug)]
pub struct VirtualPresentation {
    shared: Arc<Shared>,
    capabilities: Capabilities,
    input_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InputEvent>>,
}

/// Test-side handle of a [`VirtualPresentation`].
#[derive(Debug, Clone)]
pub struct VirtualHandle {
    shared: Arc<Shared>,
}

impl VirtualPresentation {
    pub(crate) fn new(dimensions: Dimensions, capabilities: Capabilities) -> (Self, VirtualHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            output: Mutex::new(Vec::new()),
            dimensions: Mutex::new(dimensions.or_default()),
            interactive: AtomicBool::new(false),
            input_tx: Mutex::new(Some(tx)),
        });
        (
            Self {
                shared: Arc::clone(&shared),
                capabilities,
                input_rx: tokio::sync::Mutex::new(rx),
            },
            VirtualHandle { shared },
        )
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn dimensions(&self) -> Dimensions {
        *self
            .shared
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_output(&self, bytes: &[u8]) {
        self.shared
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    pub(crate) async fn read_input(&self, cancel: &CancelToken) -> Result<Option<InputEvent>> {
        let mut rx = self.input_rx.lock().await;
        tokio::select! {
            biased;
            event = rx.recv() => Ok(event),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    pub(crate) fn set_interactive(&self, on: bool) {
        self.shared.interactive.store(on, Ordering::SeqCst);
    }
}

impl VirtualHandle {
    /// Queue an input event as if the user produced it.
    pub fn send_input(&self, event: InputEvent) -> Result<()> {
        let guard = self
            .shared
            .input_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx
                .send(event)
                .map_err(|_| Error::Transport("presentation input closed".to_string())),
            None => Err(Error::Transport("presentation input closed".to_string())),
        }
    }

    /// Change the surface size and emit the matching resize event.
    pub fn resize(&self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: dimensions.rows,
                cols: dimensions.cols,
            });
        }
        *self
            .shared
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = dimensions;
        self.send_input(InputEvent::Resize { dimensions })
    }

    /// Everything written so far, leaving the buffer empty.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(
            &mut *self
                .shared
                .output
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Copy of everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.shared
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    /// End the input stream; the input pump sees the presentation close.
    pub fn close(&self) {
        self.shared
            .input_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Whether the presentation is in interactive mode.
    pub fn is_interactive(&self) -> bool {
        self.shared.interactive.load(Ordering::SeqCst)
    }
}
