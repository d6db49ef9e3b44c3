//! State shared between the orchestrator, its pumps and its control loop.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use termbridge_core::{Dimensions, Error, InputEvent, Position, Result};
use termbridge_emulator::{render_delta, render_full, AnsiParser, QueryResponder, TerminalState};

use crate::cancel::CancelToken;
use crate::presentation::Presentation;
use crate::workload::Workload;

/// What the output pump sends to the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransform {
    /// Forward workload bytes unchanged
    #[default]
    Passthrough,
    /// Re-render only the cells that changed
    Delta,
}

/// Notifications broadcast to [`crate::Terminal::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalNotification {
    /// The workload disconnected
    WorkloadExited {
        /// Exit code, if the workload was a process that reported one
        exit_code: Option<i32>,
    },
    /// The presentation's input side closed
    PresentationClosed,
    /// The terminal took new dimensions
    Resized(Dimensions),
}

/// Parser and query responder; the only path by which output mutates state.
#[derive(Debug)]
pub(crate) struct OutputPipeline {
    parser: AnsiParser,
    responder: QueryResponder,
}

/// Result of pushing one chunk through the pipeline.
#[derive(Debug, Default)]
pub(crate) struct Processed {
    /// Answers to device queries, bound for the workload
    pub replies: Vec<u8>,
    /// Delta rendering, bound for the presentation
    pub rendered: Vec<u8>,
}

impl OutputPipeline {
    pub(crate) fn new(answer_queries: bool) -> Self {
        Self {
            parser: AnsiParser::new(),
            responder: QueryResponder::new(answer_queries),
        }
    }

    fn process(&mut self, bytes: &[u8], state: &mut TerminalState, render: bool) -> Processed {
        let events = self.parser.feed(bytes);
        let mut processed = Processed::default();
        for event in &events {
            state.apply(event);
            if let Some(reply) = self.responder.respond(event, state) {
                processed.replies.extend(reply);
            }
        }
        if render {
            let dirty = state.take_dirty();
            processed.rendered = render_delta(state, &dirty);
        }
        processed
    }

    fn reset(&mut self) {
        self.parser.reset();
    }
}

/// Everything the pumps and the orchestrator share.
#[derive(Debug)]
pub(crate) struct Engine {
    state: RwLock<TerminalState>,
    pipeline: Mutex<OutputPipeline>,
    pub(crate) workload: Option<Arc<Workload>>,
    pub(crate) presentation: Option<Arc<Presentation>>,
    pub(crate) transform: OutputTransform,
    notifications: broadcast::Sender<TerminalNotification>,
    captured: Mutex<Vec<InputEvent>>,
}

impl Engine {
    pub(crate) fn new(
        state: TerminalState,
        pipeline: OutputPipeline,
        workload: Option<Arc<Workload>>,
        presentation: Option<Arc<Presentation>>,
        transform: OutputTransform,
    ) -> Self {
        let (notifications, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(state),
            pipeline: Mutex::new(pipeline),
            workload,
            presentation,
            transform,
            notifications,
            captured: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TerminalState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TerminalState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn take_dirty(&self) -> Vec<Position> {
        self.write().take_dirty()
    }

    fn renders_delta(&self) -> bool {
        self.transform == OutputTransform::Delta && self.presentation.is_some()
    }

    /// Parse and apply one chunk of workload output.
    pub(crate) fn process_output(&self, bytes: &[u8]) -> Processed {
        let mut pipeline = self.pipeline.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.write();
        pipeline.process(bytes, &mut state, self.renders_delta())
    }

    /// Discard any half-parsed sequence.
    pub(crate) fn reset_parser(&self) {
        self.pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    /// Deliver processed output: replies to the workload, display bytes to
    /// the presentation.
    pub(crate) async fn deliver(&self, raw: &[u8], processed: Processed, cancel: &CancelToken) {
        if let Some(workload) = &self.workload {
            if !processed.replies.is_empty() {
                if let Err(e) = workload.write_input(&processed.replies, cancel).await {
                    debug!("Query reply not delivered: {e}");
                }
            }
        }
        if let Some(presentation) = &self.presentation {
            let bytes = match self.transform {
                OutputTransform::Passthrough => raw,
                OutputTransform::Delta => processed.rendered.as_slice(),
            };
            if let Err(e) = presentation.write_output(bytes).await {
                warn!("Presentation write failed: {e}");
            }
        }
    }

    /// Resize state, workload and presentation rendering together.
    pub(crate) async fn resize(&self, dimensions: Dimensions) -> Result<()> {
        let repaint = {
            let mut state = self.write();
            if state.dimensions() == dimensions {
                return Ok(());
            }
            state.resize(dimensions)?;
            self.renders_delta().then(|| {
                state.take_dirty();
                render_full(&state)
            })
        };
        if let Some(workload) = &self.workload {
            workload.resize(dimensions).await;
        }
        if let (Some(presentation), Some(bytes)) = (&self.presentation, repaint) {
            if let Err(e) = presentation.write_output(&bytes).await {
                warn!("Presentation repaint failed: {e}");
            }
        }
        self.notify(TerminalNotification::Resized(dimensions));
        Ok(())
    }

    /// Route an input event to the workload, or capture it when there is none.
    pub(crate) async fn inject(&self, event: InputEvent, cancel: &CancelToken) -> Result<()> {
        match &self.workload {
            Some(workload) => {
                let modes = self.read().modes();
                workload.send_input(&event, &modes, cancel).await
            }
            None => {
                self.captured
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event);
                Ok(())
            }
        }
    }

    pub(crate) fn take_captured(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.captured.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn notify(&self, notification: TerminalNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TerminalNotification> {
        self.notifications.subscribe()
    }

    pub(crate) fn exit_code(&self) -> Option<i32> {
        self.workload.as_ref().and_then(|w| w.exit_code())
    }

    pub(crate) fn require_workload(&self) -> Result<&Arc<Workload>> {
        self.workload.as_ref().ok_or(Error::NotAttached("workload"))
    }
}
