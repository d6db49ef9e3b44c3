//! # termbridge-emulator
//!
//! Terminal emulation for termbridge.
//!
//! This crate provides:
//! - A streaming ANSI/VT parser that turns bytes into [`TerminalEvent`]s
//! - The screen model: [`ScreenBuffer`], [`DirtySet`] and [`TerminalState`]
//! - [`QueryResponder`], which answers device queries for virtual terminals
//! - A delta renderer that repaints dirty cells on a real terminal
//! - [`PtyBridge`], the native pseudo-terminal bridge
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on termbridge-core
//! and is driven by the pumps in termbridge-session.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dirty;
pub mod event;
pub mod parser;
pub mod pty;
pub mod render;
pub mod responder;
pub mod screen;
pub mod state;

// Re-export commonly used types
pub use dirty::DirtySet;
pub use event::{
    ControlCode, CursorMove, DeviceQuery, EditOp, EraseScope, Mode, ScrollDirection,
    SgrAttribute, TerminalEvent,
};
pub use parser::{AnsiParser, ParsePhase};
pub use pty::{PtyBridge, ReadResult, WaitStatus};
pub use render::{render_delta, render_full};
pub use responder::QueryResponder;
pub use screen::ScreenBuffer;
pub use state::{ActiveBuffer, Cursor, ModeFlags, Pen, TerminalState};
