//! Decoded input events.
//!
//! This is the only input representation an application sees: presentations
//! decode raw console or transport input into [`InputEvent`]s, and the input
//! pump encodes them back into bytes only when the workload wants bytes.

use serde::{Deserialize, Serialize};

use crate::geometry::Dimensions;
use crate::key::Key;
use crate::mouse::MouseEvent;

/// One decoded input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// A single key press
    Key {
        /// The key
        key: Key,
    },
    /// Literal text typed or injected
    Text {
        /// The text
        text: String,
    },
    /// A mouse event
    Mouse {
        /// The event
        event: MouseEvent,
    },
    /// Pasted text (wrapped in bracketed-paste markers when enabled)
    Paste {
        /// The pasted text
        text: String,
    },
    /// The presentation surface changed size
    Resize {
        /// New dimensions
        dimensions: Dimensions,
    },
    /// Raw bytes passed through unmodified
    Raw {
        /// The bytes
        bytes: Vec<u8>,
    },
}

impl InputEvent {
    /// Convenience constructor for a key event.
    pub fn key(key: Key) -> Self {
        InputEvent::Key { key }
    }

    /// Convenience constructor for a text event.
    pub fn text(text: impl Into<String>) -> Self {
        InputEvent::Text { text: text.into() }
    }
}
