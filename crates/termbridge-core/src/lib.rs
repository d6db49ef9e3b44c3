//! # termbridge-core
//!
//! Core types for termbridge.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other termbridge crates. It provides:
//!
//! - Geometry types (Position, Bounds, Dimensions)
//! - Cell, color and attribute types for the screen model
//! - Key, mouse and decoded input event types
//! - Capability descriptor and process spawn parameters
//! - Configuration and error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other termbridge crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capabilities;
pub mod cell;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod key;
pub mod mouse;
pub mod spawn;

// Re-export commonly used types
pub use capabilities::Capabilities;
pub use cell::{Cell, CellAttributes, Color};
pub use config::{LoggingSettings, ProcessSettings, PumpSettings, TerminalConfig, TerminalSettings};
pub use error::{Error, Result};
pub use geometry::{Bounds, Dimensions, Position};
pub use input::InputEvent;
pub use key::Key;
pub use mouse::{Modifiers, MouseButton, MouseEvent, MouseEventKind, MouseProtocol, MouseTracking};
pub use spawn::{SpawnConfig, TerminalId};
