//! Wait conditions for terminal state changes.

use regex::Regex;
use std::time::Duration;

use termbridge_core::{Error, Result};
use termbridge_emulator::TerminalState;

use crate::snapshot::TerminalSnapshot;

/// Condition to wait for in terminal state.
#[derive(Debug, Clone)]
pub struct WaitCondition {
    /// Text pattern to match (regex)
    pub text: Option<String>,

    /// Wait for the pattern to disappear instead of appear
    pub gone: bool,

    /// Wait for the screen to stop changing
    pub idle: bool,

    /// Maximum time to wait
    pub timeout: Duration,

    /// Polling interval between checks
    pub poll_interval: Duration,
}

impl Default for WaitCondition {
    fn default() -> Self {
        Self {
            text: None,
            gone: false,
            idle: false,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WaitCondition {
    /// Create a new wait condition with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a pattern to appear.
    pub fn for_text(pattern: impl Into<String>) -> Self {
        Self {
            text: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Wait for literal text to appear.
    pub fn for_literal(text: &str) -> Self {
        Self::for_text(regex::escape(text))
    }

    /// Wait for a pattern to disappear.
    pub fn for_text_gone(pattern: impl Into<String>) -> Self {
        Self {
            text: Some(pattern.into()),
            gone: true,
            ..Self::default()
        }
    }

    /// Wait for the screen to stop changing.
    pub fn for_idle() -> Self {
        Self {
            idle: true,
            ..Self::default()
        }
    }

    /// Set timeout duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Compile the text pattern, if any.
    pub(crate) fn compile(&self) -> Result<Option<Regex>> {
        self.text
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| Error::InvalidInput(format!("Invalid regex: {e}")))
            })
            .transpose()
    }

    /// Whether `state` satisfies the text part of the condition.
    pub(crate) fn is_met(&self, pattern: Option<&Regex>, state: &TerminalState) -> bool {
        match pattern {
            Some(regex) => {
                let found = regex.is_match(&state.text());
                if self.gone {
                    !found
                } else {
                    found
                }
            }
            None => false,
        }
    }
}

/// Result of a wait operation.
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the condition was met
    pub condition_met: bool,

    /// Time waited in milliseconds
    pub waited_ms: u64,

    /// Terminal state when the condition was met (or at timeout)
    pub snapshot: TerminalSnapshot,
}
