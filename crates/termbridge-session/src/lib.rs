//! # termbridge-session
//!
//! Adapters, I/O pumps and the terminal orchestrator for termbridge.
//!
//! This crate provides:
//! - Workload adapters (PTY process, in-process queue, byte stream, null)
//! - Presentation adapters (real console, in-memory sink)
//! - The output and input pumps with cancellation and disconnect signalling
//! - [`Terminal`], which wires adapters, pumps and state together
//! - Wait helpers and serializable snapshots for tests
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on termbridge-core
//! and termbridge-emulator and owns every running task.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod disconnect;
mod engine;
pub mod input;
pub mod presentation;
pub mod pump;
pub mod snapshot;
pub mod terminal;
pub mod wait;
pub mod workload;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use disconnect::{Disconnect, DisconnectLatch, DisconnectReason};
pub use engine::{OutputTransform, TerminalNotification};
pub use input::encode_input;
pub use presentation::{
    ConsolePresentation, Presentation, PresentationKind, VirtualHandle, VirtualPresentation,
};
pub use pump::{PumpHandle, PumpState};
pub use snapshot::TerminalSnapshot;
pub use terminal::{Terminal, TerminalBuilder};
pub use wait::{WaitCondition, WaitResult};
pub use workload::{
    DirectHandle, DirectWorkload, NullWorkload, ProcessWorkload, StreamWorkload, Workload,
    WorkloadKind, WorkloadRead,
};
