//! Process spawn parameters and terminal identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Dimensions;

/// Unique identifier for a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalId(Uuid);

impl TerminalId {
    /// Create a new random terminal ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TerminalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TerminalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TerminalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for starting a workload process on a pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Executable path or name looked up on `PATH`
    pub program: String,
    /// Arguments (not including the program itself)
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Environment overrides, applied after inheritance
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Start from the parent's environment (true) or an empty one (false)
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
    /// Initial size; zero sides fall back to 80x24
    #[serde(default)]
    pub dimensions: Dimensions,
    /// Start the program as a login shell (`argv[0]` is `-<basename>`).
    /// Unix only; a login shell takes no arguments.
    #[serde(default)]
    pub login: bool,
}

fn default_inherit_env() -> bool {
    true
}

impl SpawnConfig {
    /// Spawn parameters for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            env: Vec::new(),
            inherit_env: true,
            dimensions: Dimensions::default(),
            login: false,
        }
    }

    /// Spawn parameters for the user's shell (`$SHELL`, else `/bin/sh`).
    pub fn shell() -> Self {
        let program = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                if cfg!(windows) {
                    "powershell.exe".to_string()
                } else {
                    "/bin/sh".to_string()
                }
            });
        Self::new(program)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set whether the parent's environment is inherited.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the working directory.
    pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set whether the program runs as a login shell.
    pub fn login(mut self, login: bool) -> Self {
        self.login = login;
        self
    }

    /// Set the initial size.
    pub fn dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// The initial size with the 80x24 fallback applied.
    pub fn effective_dimensions(&self) -> Dimensions {
        self.dimensions.or_default()
    }
}
