//! # termbridge
//!
//! A terminal-emulation core: run a workload (a child process on a PTY, or
//! an in-process byte source), keep a live character-cell model of what it
//! draws, show it on a presentation (the real console or an in-memory sink)
//! and route input back.
//!
//! ## Architecture
//!
//! This is Layer 3 - a facade over:
//! - termbridge-core: geometry, cells, keys, input events, config, errors
//! - termbridge-emulator: ANSI/VT parser, screen state, PTY bridge
//! - termbridge-session: adapters, pumps and the [`Terminal`] orchestrator
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use termbridge::{Dimensions, SpawnConfig, Terminal};
//!
//! # async fn run() -> termbridge::Result<()> {
//! let terminal = Terminal::builder()
//!     .dimensions(Dimensions::new(24, 80))
//!     .spawn(SpawnConfig::new("/bin/sh").arg("-c").arg("echo hello"))
//!     .build()?;
//! terminal.wait_for_text("hello", Duration::from_secs(5)).await?;
//! let exit_code = terminal.wait_for_exit(Duration::from_secs(5)).await?;
//! println!("exited with {exit_code:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;

pub use logging::init_logging;

pub use termbridge_core::{
    Capabilities, Cell, CellAttributes, Color, Dimensions, Error, InputEvent, Key, Modifiers,
    MouseButton, MouseEvent, MouseEventKind, Position, PumpSettings, Result, SpawnConfig,
    TerminalConfig, TerminalId,
};
pub use termbridge_emulator::{
    AnsiParser, Cursor, ModeFlags, PtyBridge, QueryResponder, TerminalEvent, TerminalState,
};
pub use termbridge_session::{
    CancelToken, DirectHandle, Disconnect, DisconnectReason, OutputTransform, Presentation,
    PumpState, Terminal, TerminalBuilder, TerminalNotification, TerminalSnapshot, VirtualHandle,
    WaitCondition, WaitResult, Workload, WorkloadRead,
};

/// The layer crates, for items not re-exported at the top level.
pub mod layers {
    pub use termbridge_core as core;
    pub use termbridge_emulator as emulator;
    pub use termbridge_session as session;
}
