//! The terminal orchestrator.
//!
//! A [`Terminal`] owns zero, one or two adapters and wires them together:
//!
//! | workload | presentation | use |
//! |----------|--------------|-----|
//! | no  | no  | drive state with [`Terminal::feed`] and inspect it |
//! | yes | no  | observe a process without displaying it |
//! | no  | yes | application output forwarded to a display |
//! | yes | yes | full proxy between a process and a display |
//!
//! The output pump is the only writer of screen content. Queries take a
//! short read lock and never wait on I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use termbridge_core::{
    Capabilities, Cell, Dimensions, Error, InputEvent, Key, MouseEvent, Position, PumpSettings,
    Result, SpawnConfig, TerminalConfig, TerminalId,
};
use termbridge_emulator::{Cursor, ModeFlags, TerminalState};

use crate::cancel::CancelToken;
use crate::engine::{Engine, OutputPipeline, OutputTransform, TerminalNotification};
use crate::presentation::Presentation;
use crate::pump::{run_input_pump, run_output_pump, ControlMessage, PumpHandle, PumpState};
use crate::snapshot::TerminalSnapshot;
use crate::wait::{WaitCondition, WaitResult};
use crate::workload::Workload;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Builder for [`Terminal`].
#[derive(Debug, Default)]
pub struct TerminalBuilder {
    config: TerminalConfig,
    dimensions: Option<Dimensions>,
    workload: Option<Workload>,
    spawn: Option<SpawnConfig>,
    presentation: Option<Presentation>,
    transform: OutputTransform,
    answer_queries: Option<bool>,
}

impl TerminalBuilder {
    /// Start from default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` for defaults and pump timing.
    pub fn config(mut self, config: TerminalConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial screen size. Defaults to the presentation's size, then the
    /// configured size.
    pub fn dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Attach an existing workload.
    pub fn workload(mut self, workload: Workload) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Spawn a process workload once the presentation is interactive.
    pub fn spawn(mut self, config: SpawnConfig) -> Self {
        self.spawn = Some(config);
        self
    }

    /// Attach a presentation.
    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    /// How output reaches the presentation.
    pub fn transform(mut self, transform: OutputTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Answer device queries from the workload.
    ///
    /// Defaults to the configured setting, except on a real console, which
    /// answers for itself.
    pub fn answer_queries(mut self, enabled: bool) -> Self {
        self.answer_queries = Some(enabled);
        self
    }

    /// Wire everything up and start the pumps.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Terminal> {
        let TerminalBuilder {
            config,
            dimensions,
            workload,
            spawn,
            presentation,
            transform,
            answer_queries,
        } = self;
        config.validate()?;
        if workload.is_some() && spawn.is_some() {
            return Err(Error::InvalidInput(
                "give either a workload or a spawn config, not both".to_string(),
            ));
        }

        let dimensions = dimensions
            .or_else(|| presentation.as_ref().map(Presentation::dimensions))
            .unwrap_or_else(|| config.dimensions());
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: dimensions.rows,
                cols: dimensions.cols,
            });
        }

        // The host leaves cooked mode before the child exists.
        if let Some(presentation) = &presentation {
            presentation.enter_interactive_mode()?;
        }

        let workload = match (workload, spawn) {
            (Some(workload), _) => Some(workload),
            (None, Some(spawn)) => match spawn_process(spawn, dimensions, &config) {
                Ok(workload) => Some(workload),
                Err(e) => {
                    if let Some(presentation) = &presentation {
                        let _ = presentation.exit_interactive_mode();
                    }
                    return Err(e);
                }
            },
            (None, None) => None,
        };

        let answer_queries = answer_queries.unwrap_or_else(|| {
            config.terminal.answer_queries
                && !presentation.as_ref().is_some_and(Presentation::is_console)
        });

        let engine = Arc::new(Engine::new(
            TerminalState::with_auto_wrap(dimensions, config.terminal.auto_wrap),
            OutputPipeline::new(answer_queries),
            workload.map(Arc::new),
            presentation.map(Arc::new),
            transform,
        ));

        let id = TerminalId::new();
        info!(
            terminal_id = %id,
            rows = dimensions.rows,
            cols = dimensions.cols,
            workload = ?engine.workload.as_ref().map(|w| w.kind()),
            presentation = ?engine.presentation.as_ref().map(|p| p.kind()),
            ?transform,
            "Terminal started"
        );

        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let output_pump = engine.workload.clone().map(|workload| {
            let engine = Arc::clone(&engine);
            let control = control_tx.clone();
            PumpHandle::start("output", CancelToken::new(), move |status, cancel| {
                run_output_pump(engine, workload, control, status, cancel)
            })
        });

        let input_pump = engine.presentation.clone().map(|presentation| {
            let engine = Arc::clone(&engine);
            let control = control_tx.clone();
            Arc::new(PumpHandle::start(
                "input",
                CancelToken::new(),
                move |status, cancel| run_input_pump(engine, presentation, control, status, cancel),
            ))
        });
        drop(control_tx);

        let control = {
            let engine = Arc::clone(&engine);
            let input_pump = input_pump.clone();
            let stop_input_on_exit = config.pump.stop_input_on_exit;
            PumpHandle::start("control", CancelToken::new(), move |_status, cancel| {
                run_control_loop(engine, control_rx, input_pump, stop_input_on_exit, cancel)
            })
        };

        Ok(Terminal {
            id,
            engine,
            settings: config.pump,
            output_pump,
            input_pump,
            control,
            injector: CancelToken::new(),
            shut_down: AtomicBool::new(false),
        })
    }
}

fn spawn_process(
    mut spawn: SpawnConfig,
    dimensions: Dimensions,
    config: &TerminalConfig,
) -> Result<Workload> {
    if !spawn.dimensions.is_valid() {
        spawn.dimensions = dimensions;
    }
    if !spawn.env.iter().any(|(key, _)| key == "TERM") {
        spawn.env.push(("TERM".to_string(), config.terminal.term.clone()));
    }
    Workload::process(&spawn, &config.pump)
}

async fn run_control_loop(
    engine: Arc<Engine>,
    mut messages: mpsc::UnboundedReceiver<ControlMessage>,
    input_pump: Option<Arc<PumpHandle>>,
    stop_input_on_exit: bool,
    cancel: CancelToken,
) {
    loop {
        let message = tokio::select! {
            message = messages.recv() => message,
            _ = cancel.cancelled() => break,
        };
        let Some(message) = message else {
            break;
        };
        match message {
            ControlMessage::WorkloadExited => {
                let exit_code = engine.exit_code();
                info!(?exit_code, "Workload exited");
                engine.notify(TerminalNotification::WorkloadExited { exit_code });
                if stop_input_on_exit {
                    if let Some(pump) = &input_pump {
                        pump.cancel();
                    }
                }
            }
            ControlMessage::PresentationClosed => {
                engine.notify(TerminalNotification::PresentationClosed);
            }
            ControlMessage::PresentationResized(dimensions) => {
                if let Err(e) = engine.resize(dimensions).await {
                    warn!(?dimensions, "Ignoring presentation resize: {e}");
                }
            }
        }
    }
}

/// A live terminal: state plus whatever adapters were attached.
#[derive(Debug)]
pub struct Terminal {
    id: TerminalId,
    engine: Arc<Engine>,
    settings: PumpSettings,
    output_pump: Option<PumpHandle>,
    input_pump: Option<Arc<PumpHandle>>,
    control: PumpHandle,
    injector: CancelToken,
    shut_down: AtomicBool,
}

impl Terminal {
    /// Start building a terminal.
    pub fn builder() -> TerminalBuilder {
        TerminalBuilder::new()
    }

    /// A terminal with no adapters, driven by [`feed`](Self::feed).
    pub fn headless(dimensions: Dimensions) -> Result<Self> {
        TerminalBuilder::new().dimensions(dimensions).build()
    }

    /// Unique id of this terminal.
    pub fn id(&self) -> TerminalId {
        self.id
    }

    // ---- queries -------------------------------------------------------

    /// Run `f` against the current state under a read lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&TerminalState) -> R) -> R {
        let state = self.engine.read();
        f(&state)
    }

    /// Cell at `(row, col)` of the active buffer.
    pub fn cell(&self, row: u16, col: u16) -> Option<Cell> {
        self.engine.read().cell(row, col).cloned()
    }

    /// Text of one row, trailing whitespace trimmed.
    pub fn line(&self, row: u16) -> Option<String> {
        self.engine.read().line(row)
    }

    /// Whole screen as text.
    pub fn text(&self) -> String {
        self.engine.read().text()
    }

    /// Whether the screen shows `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.engine.read().contains_text(needle)
    }

    /// Cursor position and visibility.
    pub fn cursor(&self) -> Cursor {
        self.engine.read().cursor()
    }

    /// Current screen size.
    pub fn dimensions(&self) -> Dimensions {
        self.engine.read().dimensions()
    }

    /// Columns.
    pub fn width(&self) -> u16 {
        self.engine.read().width()
    }

    /// Rows.
    pub fn height(&self) -> u16 {
        self.engine.read().height()
    }

    /// Mode flags.
    pub fn modes(&self) -> ModeFlags {
        self.engine.read().modes()
    }

    /// Window title set by the workload.
    pub fn title(&self) -> String {
        self.engine.read().title().to_string()
    }

    /// Claim the cells changed since the last claim.
    ///
    /// With a delta transform the output pump claims them first.
    pub fn take_dirty(&self) -> Vec<Position> {
        self.engine.take_dirty()
    }

    /// Serializable copy of the screen.
    pub fn snapshot(&self) -> TerminalSnapshot {
        let exit_code = self.exit_code();
        TerminalSnapshot::capture(self.id, &self.engine.read(), exit_code)
    }

    /// Workload exit code, once it has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.engine.exit_code()
    }

    /// The attached workload.
    pub fn workload(&self) -> Option<&Workload> {
        self.engine.workload.as_deref()
    }

    /// The attached presentation.
    pub fn presentation(&self) -> Option<&Presentation> {
        self.engine.presentation.as_deref()
    }

    /// Capabilities of the attached presentation.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.presentation().map(Presentation::capabilities)
    }

    /// State of the output pump, if there is one.
    pub fn output_pump_state(&self) -> Option<PumpState> {
        self.output_pump.as_ref().map(PumpHandle::state)
    }

    /// State of the input pump, if there is one.
    pub fn input_pump_state(&self) -> Option<PumpState> {
        self.input_pump.as_ref().map(|pump| pump.state())
    }

    /// Receive lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TerminalNotification> {
        self.engine.subscribe()
    }

    // ---- injection -----------------------------------------------------

    /// Inject an input event as if the presentation produced it.
    pub async fn send_input(&self, event: InputEvent) -> Result<()> {
        self.engine.inject(event, &self.injector).await
    }

    /// Press a key.
    pub async fn send_key(&self, key: Key) -> Result<()> {
        self.send_input(InputEvent::key(key)).await
    }

    /// Press a key given by name, such as `"Ctrl+c"` or `"Up"`.
    pub async fn send_key_str(&self, key: &str) -> Result<()> {
        self.send_key(Key::parse(key)?).await
    }

    /// Type text.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_input(InputEvent::text(text)).await
    }

    /// Send a mouse event.
    pub async fn send_mouse(&self, event: MouseEvent) -> Result<()> {
        self.send_input(InputEvent::Mouse { event }).await
    }

    /// Paste text, bracketed when the workload asked for it.
    pub async fn send_paste(&self, text: impl Into<String>) -> Result<()> {
        self.send_input(InputEvent::Paste { text: text.into() }).await
    }

    /// Resize the terminal and its workload.
    pub async fn send_resize(&self, dimensions: Dimensions) -> Result<()> {
        self.engine.resize(dimensions).await
    }

    /// Push output bytes through the parser as if a workload wrote them.
    ///
    /// Only available when no workload is attached.
    pub async fn feed(&self, bytes: &[u8]) -> Result<()> {
        if self.engine.workload.is_some() {
            return Err(Error::InvalidInput(
                "feed is only available without a workload".to_string(),
            ));
        }
        let processed = self.engine.process_output(bytes);
        self.engine.deliver(bytes, processed, &self.injector).await;
        Ok(())
    }

    /// Input captured because no workload was attached.
    pub fn take_captured_input(&self) -> Vec<InputEvent> {
        self.engine.take_captured()
    }

    // ---- waiting -------------------------------------------------------

    /// Poll until `condition` holds or its timeout passes.
    ///
    /// Reaching the timeout is not an error; check
    /// [`WaitResult::condition_met`].
    pub async fn wait_for(&self, condition: &WaitCondition) -> Result<WaitResult> {
        let pattern = condition.compile()?;
        let start = Instant::now();
        let idle_threshold = self.settings.idle_threshold();
        let mut last_generation = self.engine.read().generation();
        let mut last_change = Instant::now();

        loop {
            let elapsed = start.elapsed();
            let met = {
                let state = self.engine.read();
                if condition.idle {
                    let generation = state.generation();
                    if generation != last_generation {
                        last_generation = generation;
                        last_change = Instant::now();
                    }
                    last_change.elapsed() >= idle_threshold
                } else {
                    condition.is_met(pattern.as_ref(), &state)
                }
            };
            if met || elapsed >= condition.timeout {
                return Ok(WaitResult {
                    condition_met: met,
                    waited_ms: elapsed.as_millis() as u64,
                    snapshot: self.snapshot(),
                });
            }
            tokio::time::sleep(condition.poll_interval).await;
        }
    }

    /// Wait until the screen shows `text`.
    pub async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<()> {
        let condition = WaitCondition::for_literal(text)
            .with_timeout(timeout)
            .with_poll_interval(self.settings.wait_poll_interval());
        self.require(&condition).await
    }

    /// Wait until the screen has not changed for the idle threshold.
    pub async fn wait_for_idle(&self, timeout: Duration) -> Result<()> {
        let poll = self
            .settings
            .wait_poll_interval()
            .min(self.settings.idle_threshold() / 2)
            .max(Duration::from_millis(1));
        let condition = WaitCondition::for_idle()
            .with_timeout(timeout)
            .with_poll_interval(poll);
        self.require(&condition).await
    }

    async fn require(&self, condition: &WaitCondition) -> Result<()> {
        let result = self.wait_for(condition).await?;
        if result.condition_met {
            Ok(())
        } else {
            Err(Error::WaitTimeout(condition.timeout.as_millis() as u64))
        }
    }

    /// Wait for the workload to disconnect and its output to drain.
    ///
    /// Returns the exit code, if the workload reported one.
    pub async fn wait_for_exit(&self, timeout: Duration) -> Result<Option<i32>> {
        let latch = self.engine.require_workload()?.disconnect();
        let exited = async {
            let disconnect = latch.wait().await;
            if let Some(pump) = &self.output_pump {
                pump.stopped().await;
            }
            disconnect
        };
        match tokio::time::timeout(timeout, exited).await {
            Ok(disconnect) => Ok(disconnect.exit_code),
            Err(_) => Err(Error::WaitTimeout(timeout.as_millis() as u64)),
        }
    }

    // ---- lifecycle -----------------------------------------------------

    /// Put the presentation into raw mode and the alternate screen.
    pub fn enter_interactive_mode(&self) -> Result<()> {
        match self.presentation() {
            Some(presentation) => presentation.enter_interactive_mode(),
            None => Ok(()),
        }
    }

    /// Restore the presentation's normal mode.
    pub fn exit_interactive_mode(&self) -> Result<()> {
        match self.presentation() {
            Some(presentation) => presentation.exit_interactive_mode(),
            None => Ok(()),
        }
    }

    /// Stop both pumps, tear down the workload and restore the
    /// presentation. The last screen stays queryable. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(terminal_id = %self.id, "Shutting down terminal");

        if let Some(pump) = &self.input_pump {
            pump.cancel();
        }
        if let Some(workload) = &self.engine.workload {
            workload.shutdown().await;
        }
        if let Some(pump) = &self.output_pump {
            if tokio::time::timeout(SHUTDOWN_GRACE, pump.stopped())
                .await
                .is_err()
            {
                warn!("Output pump did not drain in time; cancelling");
                pump.cancel();
            }
            pump.join().await;
        }
        if let Some(pump) = &self.input_pump {
            pump.join().await;
        }

        // With both pumps gone the control loop drains its queue and ends.
        if tokio::time::timeout(SHUTDOWN_GRACE, self.control.stopped())
            .await
            .is_err()
        {
            self.control.cancel();
        }
        self.control.join().await;

        if let Some(presentation) = self.presentation() {
            if let Err(e) = presentation.exit_interactive_mode() {
                warn!("Failed to restore presentation: {e}");
            }
            presentation.shutdown();
        }
        self.injector.cancel();
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.injector.cancel();
        if let Some(pump) = &self.input_pump {
            pump.cancel();
        }
        // The remaining handles cancel themselves when dropped.
    }
}
