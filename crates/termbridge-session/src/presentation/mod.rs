//! Presentation adapters: where the human (or a test) sits.
//!
//! Both variants accept output bytes, deliver decoded input events, report
//! their size and the capabilities fixed when they were attached.

mod console;
mod virtual_sink;

use termbridge_core::{Capabilities, Dimensions, InputEvent, Result};

use crate::cancel::CancelToken;

pub use console::ConsolePresentation;
pub use virtual_sink::{VirtualHandle, VirtualPresentation};

/// Which variant a [`Presentation`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationKind {
    /// The controlling terminal
    Console,
    /// In-memory sink
    Virtual,
}

/// A display surface and input source.
#[derive(Debug)]
pub enum Presentation {
    /// The controlling terminal
    Console(ConsolePresentation),
    /// In-memory sink
    Virtual(VirtualPresentation),
}

impl Presentation {
    /// Attach to the controlling terminal.
    pub fn console() -> Result<Self> {
        ConsolePresentation::new().map(Presentation::Console)
    }

    /// In-memory sink with every capability enabled.
    pub fn virtual_sink(dimensions: Dimensions) -> (Self, VirtualHandle) {
        Self::virtual_with_capabilities(dimensions, Capabilities::virtual_default())
    }

    /// In-memory sink with explicit capabilities.
    pub fn virtual_with_capabilities(
        dimensions: Dimensions,
        capabilities: Capabilities,
    ) -> (Self, VirtualHandle) {
        let (presentation, handle) = VirtualPresentation::new(dimensions, capabilities);
        (Presentation::Virtual(presentation), handle)
    }

    /// Variant tag.
    pub fn kind(&self) -> PresentationKind {
        match self {
            Presentation::Console(_) => PresentationKind::Console,
            Presentation::Virtual(_) => PresentationKind::Virtual,
        }
    }

    /// Whether this is the real console.
    pub fn is_console(&self) -> bool {
        self.kind() == PresentationKind::Console
    }

    /// Capabilities queried when the presentation was attached.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Presentation::Console(p) => p.capabilities(),
            Presentation::Virtual(p) => p.capabilities(),
        }
    }

    /// Current surface size.
    pub fn dimensions(&self) -> Dimensions {
        match self {
            Presentation::Console(p) => p.dimensions(),
            Presentation::Virtual(p) => p.dimensions(),
        }
    }

    /// Display output bytes.
    pub async fn write_output(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match self {
            Presentation::Console(p) => p.write_output(bytes).await,
            Presentation::Virtual(p) => {
                p.write_output(bytes);
                Ok(())
            }
        }
    }

    /// Next decoded input event; `None` once the input side has closed.
    pub async fn read_input(&self, cancel: &CancelToken) -> Result<Option<InputEvent>> {
        match self {
            Presentation::Console(p) => p.read_input(cancel).await,
            Presentation::Virtual(p) => p.read_input(cancel).await,
        }
    }

    /// Enter raw mode and the alternate screen. Idempotent.
    pub fn enter_interactive_mode(&self) -> Result<()> {
        match self {
            Presentation::Console(p) => p.enter_interactive_mode(),
            Presentation::Virtual(p) => {
                p.set_interactive(true);
                Ok(())
            }
        }
    }

    /// Restore the surface to its prior mode. Idempotent.
    pub fn exit_interactive_mode(&self) -> Result<()> {
        match self {
            Presentation::Console(p) => p.exit_interactive_mode(),
            Presentation::Virtual(p) => {
                p.set_interactive(false);
                Ok(())
            }
        }
    }

    /// Stop reading input and restore the surface.
    pub fn shutdown(&self) {
        match self {
            Presentation::Console(p) => p.shutdown(),
            Presentation::Virtual(p) => p.set_interactive(false),
        }
    }
}
