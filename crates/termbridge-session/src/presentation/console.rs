//! Presentation on the real console via crossterm.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self as ct, Event};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use termbridge_core::{
    Capabilities, Dimensions, Error, InputEvent, Key, Modifiers, MouseButton, MouseEvent,
    MouseEventKind, Result,
};

use crate::cancel::CancelToken;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Which console modes are currently switched on.
#[derive(Debug, Default, Clone, Copy)]
struct ConsoleModes {
    raw: bool,
    alternate_screen: bool,
    mouse_capture: bool,
    bracketed_paste: bool,
}

/// The controlling terminal of this process.
///
/// A dedicated thread reads console events and forwards decoded
/// [`InputEvent`]s; output is written to stdout.
#[derive(Debug)]
pub struct ConsolePresentation {
    capabilities: Capabilities,
    dimensions: Arc<Mutex<Dimensions>>,
    modes: Mutex<ConsoleModes>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<InputEvent>>,
    stop: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ConsolePresentation {
    /// Attach to the console, detecting capabilities from the environment.
    pub fn new() -> Result<Self> {
        Self::with_capabilities(Capabilities::from_env())
    }

    /// Attach to the console with explicit capabilities.
    pub fn with_capabilities(capabilities: Capabilities) -> Result<Self> {
        let dimensions = crossterm::terminal::size()
            .map(|(cols, rows)| Dimensions::new(rows, cols).or_default())
            .unwrap_or_default();
        let dimensions = Arc::new(Mutex::new(dimensions));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let reader = spawn_reader(tx, Arc::clone(&stop), Arc::clone(&dimensions))?;
        info!(?capabilities, "Console presentation attached");

        Ok(Self {
            capabilities,
            dimensions,
            modes: Mutex::new(ConsoleModes::default()),
            events: tokio::sync::Mutex::new(rx),
            stop,
            reader: Mutex::new(Some(reader)),
        })
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn dimensions(&self) -> Dimensions {
        *self
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn write_output(&self, bytes: &[u8]) -> Result<()> {
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()
        })
        .await
        .map_err(|e| Error::Transport(format!("console writer task failed: {e}")))?
        .map_err(Error::Io)
    }

    pub(crate) async fn read_input(&self, cancel: &CancelToken) -> Result<Option<InputEvent>> {
        let mut events = self.events.lock().await;
        tokio::select! {
            biased;
            event = events.recv() => Ok(event),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Switch on raw mode, the alternate screen and whatever input
    /// reporting the capabilities allow. Calling it again is a no-op.
    pub(crate) fn enter_interactive_mode(&self) -> Result<()> {
        let mut modes = self.modes.lock().unwrap_or_else(PoisonError::into_inner);
        if modes.raw {
            return Ok(());
        }

        crossterm::terminal::enable_raw_mode()?;
        modes.raw = true;

        let mut stdout = io::stdout();
        if self.capabilities.alternate_screen {
            crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
            modes.alternate_screen = true;
        }
        if self.capabilities.mouse {
            crossterm::execute!(stdout, ct::EnableMouseCapture)?;
            modes.mouse_capture = true;
        }
        if self.capabilities.bracketed_paste {
            crossterm::execute!(stdout, ct::EnableBracketedPaste)?;
            modes.bracketed_paste = true;
        }
        info!("Console entered interactive mode");
        Ok(())
    }

    /// Undo [`enter_interactive_mode`](Self::enter_interactive_mode) in
    /// reverse order. Failures are logged and cleanup continues.
    pub(crate) fn exit_interactive_mode(&self) -> Result<()> {
        let mut modes = self.modes.lock().unwrap_or_else(PoisonError::into_inner);
        if !modes.raw {
            return Ok(());
        }
        restore_console(&mut modes);
        info!("Console left interactive mode");
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.exit_interactive_mode() {
            warn!("Console cleanup failed: {e}");
        }
    }
}

impl Drop for ConsolePresentation {
    fn drop(&mut self) {
        self.shutdown();
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reader {
            let _ = handle.join();
        }
    }
}

fn restore_console(modes: &mut ConsoleModes) {
    let mut stdout = io::stdout();
    if modes.bracketed_paste {
        if let Err(e) = crossterm::execute!(stdout, ct::DisableBracketedPaste) {
            warn!("Failed to disable bracketed paste: {e}");
        }
        modes.bracketed_paste = false;
    }
    if modes.mouse_capture {
        if let Err(e) = crossterm::execute!(stdout, ct::DisableMouseCapture) {
            warn!("Failed to disable mouse capture: {e}");
        }
        modes.mouse_capture = false;
    }
    let _ = crossterm::execute!(stdout, crossterm::cursor::Show);
    if modes.alternate_screen {
        if let Err(e) = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen) {
            warn!("Failed to leave alternate screen: {e}");
        }
        modes.alternate_screen = false;
    }
    if let Err(e) = crossterm::terminal::disable_raw_mode() {
        warn!("Failed to disable raw mode: {e}");
    }
    modes.raw = false;
}

fn spawn_reader(
    tx: mpsc::UnboundedSender<InputEvent>,
    stop: Arc<AtomicBool>,
    dimensions: Arc<Mutex<Dimensions>>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("termbridge-console-input".to_string())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                match ct::poll(INPUT_POLL_INTERVAL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("Console input poll failed: {e}");
                        break;
                    }
                }
                let event = match ct::read() {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Console input read failed: {e}");
                        break;
                    }
                };
                let Some(mapped) = map_crossterm_event(event) else {
                    continue;
                };
                if let InputEvent::Resize { dimensions: dims } = &mapped {
                    *dimensions.lock().unwrap_or_else(PoisonError::into_inner) = *dims;
                }
                if tx.send(mapped).is_err() {
                    break;
                }
            }
            debug!("Console input reader stopped");
        })?;
    Ok(handle)
}

fn map_crossterm_event(event: Event) -> Option<InputEvent> {
    match event {
        Event::Key(key) => map_key_event(key).map(InputEvent::key),
        Event::Mouse(mouse) => map_mouse_event(mouse).map(|event| InputEvent::Mouse { event }),
        Event::Paste(text) => Some(InputEvent::Paste { text }),
        Event::Resize(cols, rows) => Some(InputEvent::Resize {
            dimensions: Dimensions::new(rows, cols),
        }),
        Event::FocusGained | Event::FocusLost => None,
    }
}

fn map_key_event(event: ct::KeyEvent) -> Option<Key> {
    if event.kind == ct::KeyEventKind::Release {
        return None;
    }
    let ctrl = event.modifiers.contains(ct::KeyModifiers::CONTROL);
    let alt = event.modifiers.contains(ct::KeyModifiers::ALT);
    let shift = event.modifiers.contains(ct::KeyModifiers::SHIFT);

    let key = match event.code {
        ct::KeyCode::Char(c) if ctrl => Key::Ctrl(c.to_ascii_lowercase()),
        ct::KeyCode::Char(c) => Key::Char(c),
        ct::KeyCode::Enter => Key::Enter,
        ct::KeyCode::Tab => Key::Tab,
        ct::KeyCode::BackTab => Key::Shift(Box::new(Key::Tab)),
        ct::KeyCode::Esc => Key::Escape,
        ct::KeyCode::Backspace => Key::Backspace,
        ct::KeyCode::Delete => Key::Delete,
        ct::KeyCode::Insert => Key::Insert,
        ct::KeyCode::Up => Key::Up,
        ct::KeyCode::Down => Key::Down,
        ct::KeyCode::Left => Key::Left,
        ct::KeyCode::Right => Key::Right,
        ct::KeyCode::Home => Key::Home,
        ct::KeyCode::End => Key::End,
        ct::KeyCode::PageUp => Key::PageUp,
        ct::KeyCode::PageDown => Key::PageDown,
        ct::KeyCode::F(n) => Key::F(n),
        _ => return None,
    };

    // Shifted characters already arrive upper-cased.
    let key = match key {
        Key::Up | Key::Down | Key::Left | Key::Right if shift => Key::Shift(Box::new(key)),
        other => other,
    };
    Some(if alt { Key::Alt(Box::new(key)) } else { key })
}

fn map_mouse_event(event: ct::MouseEvent) -> Option<MouseEvent> {
    let kind = match event.kind {
        ct::MouseEventKind::Down(b) => MouseEventKind::Down(map_button(b)),
        ct::MouseEventKind::Up(b) => MouseEventKind::Up(map_button(b)),
        ct::MouseEventKind::Drag(b) => MouseEventKind::Drag(map_button(b)),
        ct::MouseEventKind::Moved => MouseEventKind::Moved,
        ct::MouseEventKind::ScrollUp => MouseEventKind::ScrollUp,
        ct::MouseEventKind::ScrollDown => MouseEventKind::ScrollDown,
        ct::MouseEventKind::ScrollLeft | ct::MouseEventKind::ScrollRight => return None,
    };
    let mut mapped = MouseEvent::new(kind, event.column, event.row);
    mapped.modifiers = map_modifiers(event.modifiers);
    Some(mapped)
}

fn map_button(button: ct::MouseButton) -> MouseButton {
    match button {
        ct::MouseButton::Left => MouseButton::Left,
        ct::MouseButton::Right => MouseButton::Right,
        ct::MouseButton::Middle => MouseButton::Middle,
    }
}

fn map_modifiers(modifiers: ct::KeyModifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    if modifiers.contains(ct::KeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if modifiers.contains(ct::KeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    if modifiers.contains(ct::KeyModifiers::CONTROL) {
        out |= Modifiers::CTRL;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: ct::KeyCode, modifiers: ct::KeyModifiers) -> Event {
        Event::Key(ct::KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_plain_and_control_keys() {
        assert_eq!(
            map_crossterm_event(key(ct::KeyCode::Char('a'), ct::KeyModifiers::NONE)),
            Some(InputEvent::key(Key::Char('a')))
        );
        assert_eq!(
            map_crossterm_event(key(ct::KeyCode::Char('C'), ct::KeyModifiers::CONTROL)),
            Some(InputEvent::key(Key::Ctrl('c')))
        );
        assert_eq!(
            map_crossterm_event(key(ct::KeyCode::BackTab, ct::KeyModifiers::SHIFT)),
            Some(InputEvent::key(Key::Shift(Box::new(Key::Tab))))
        );
    }

    #[test]
    fn test_alt_wraps_key() {
        assert_eq!(
            map_crossterm_event(key(ct::KeyCode::Char('x'), ct::KeyModifiers::ALT)),
            Some(InputEvent::key(Key::Alt(Box::new(Key::Char('x')))))
        );
    }

    #[test]
    fn test_release_is_ignored() {
        let mut event = ct::KeyEvent::new(ct::KeyCode::Enter, ct::KeyModifiers::NONE);
        event.kind = ct::KeyEventKind::Release;
        assert_eq!(map_crossterm_event(Event::Key(event)), None);
    }

    #[test]
    fn test_mouse_and_resize() {
        let mouse = Event::Mouse(ct::MouseEvent {
            kind: ct::MouseEventKind::Down(ct::MouseButton::Left),
            column: 4,
            row: 2,
            modifiers: ct::KeyModifiers::SHIFT,
        });
        let mut expected = MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 4, 2);
        expected.modifiers = Modifiers::SHIFT;
        assert_eq!(
            map_crossterm_event(mouse),
            Some(InputEvent::Mouse { event: expected })
        );

        assert_eq!(
            map_crossterm_event(Event::Resize(100, 30)),
            Some(InputEvent::Resize {
                dimensions: Dimensions::new(30, 100)
            })
        );
        assert_eq!(map_crossterm_event(Event::FocusGained), None);
    }

    #[test]
    fn test_paste() {
        assert_eq!(
            map_crossterm_event(Event::Paste("a\nb".to_string())),
            Some(InputEvent::Paste {
                text: "a\nb".to_string()
            })
        );
    }
}
