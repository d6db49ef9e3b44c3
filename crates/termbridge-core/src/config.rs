//! Configuration for terminals, workloads and pumps.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Dimensions, Error, SpawnConfig};

/// Terminal configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TerminalConfig {
    /// Screen settings
    pub terminal: TerminalSettings,
    /// Child process settings
    pub process: ProcessSettings,
    /// Pump and wait timing
    pub pump: PumpSettings,
    /// Logging
    pub logging: LoggingSettings,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}

impl TerminalConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: TerminalConfig =
            serde_yaml::from_str(yaml).map_err(|e| invalid(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.terminal.default_rows == 0 || self.terminal.default_cols == 0 {
            return Err(invalid("terminal dimensions must be > 0"));
        }

        if self.process.shell.trim().is_empty() {
            return Err(invalid("process.shell cannot be empty"));
        }

        if self.pump.read_chunk_size == 0 {
            return Err(invalid("pump.read_chunk_size must be > 0"));
        }

        if self.pump.poll_interval_ms == 0 || self.pump.wait_poll_interval_ms == 0 {
            return Err(invalid("pump intervals must be > 0"));
        }

        Ok(())
    }

    /// Default screen dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.terminal.default_rows, self.terminal.default_cols)
    }

    /// Spawn parameters for the configured shell, started as a login shell
    /// unless `process.login` is off.
    ///
    /// `TERM` and the configured environment overrides are applied on top of
    /// the inheritance setting.
    pub fn shell_spawn_config(&self) -> SpawnConfig {
        let mut spawn = SpawnConfig::new(self.process.shell.clone())
            .inherit_env(self.process.inherit_env)
            .login(self.process.login)
            .dimensions(self.dimensions())
            .env("TERM", self.terminal.term.clone());
        for (k, v) in &self.process.env {
            spawn = spawn.env(k.clone(), v.clone());
        }
        spawn
    }
}

/// Screen settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerminalSettings {
    /// Default terminal rows
    pub default_rows: u16,
    /// Default terminal columns
    pub default_cols: u16,
    /// TERM environment variable value
    pub term: String,
    /// Auto-wrap (DECAWM) at startup
    pub auto_wrap: bool,
    /// Answer device attribute and status queries from the workload
    pub answer_queries: bool,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            default_rows: 24,
            default_cols: 80,
            term: "xterm-256color".to_string(),
            auto_wrap: true,
            answer_queries: true,
        }
    }
}

/// Child process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessSettings {
    /// Shell used by [`TerminalConfig::shell_spawn_config`]
    pub shell: String,
    /// Inherit the parent's environment
    pub inherit_env: bool,
    /// Environment overrides
    pub env: Vec<(String, String)>,
    /// Run the shell as a login shell
    pub login: bool,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            shell: SpawnConfig::shell().program,
            inherit_env: true,
            env: Vec::new(),
            login: true,
        }
    }
}

/// Pump and wait timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PumpSettings {
    /// Maximum bytes read from a workload at once
    pub read_chunk_size: usize,
    /// How long a process read polls before re-checking cancellation
    pub poll_interval_ms: u64,
    /// Poll interval of wait helpers
    pub wait_poll_interval_ms: u64,
    /// Quiet period that counts as idle
    pub idle_threshold_ms: u64,
    /// Default timeout of wait helpers
    pub wait_timeout_ms: u64,
    /// Cancel the input pump when the workload exits
    pub stop_input_on_exit: bool,
}

impl PumpSettings {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait-helper poll interval as a duration.
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }

    /// Idle threshold as a duration.
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }

    /// Default wait timeout as a duration.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            poll_interval_ms: 50,
            wait_poll_interval_ms: 100,
            idle_threshold_ms: 100,
            wait_timeout_ms: 30_000,
            stop_input_on_exit: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TerminalConfig::default();
        assert_eq!(config.terminal.default_rows, 24);
        assert_eq!(config.terminal.default_cols, 80);
        assert!(config.terminal.auto_wrap);
        assert_eq!(config.pump.read_chunk_size, 4096);
        assert!(config.pump.stop_input_on_exit);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut config = TerminalConfig::default();
        config.terminal.default_rows = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_pump_settings() {
        let mut config = TerminalConfig::default();
        config.pump.read_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = TerminalConfig::default();
        config.pump.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_shell() {
        let mut config = TerminalConfig::default();
        config.process.shell = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
terminal:
  default_rows: 30
  default_cols: 120
  term: "xterm"
  auto_wrap: false

process:
  shell: /bin/sh
  inherit_env: false
  login: false
  env:
    - [LANG, C.UTF-8]

pump:
  read_chunk_size: 1024
  idle_threshold_ms: 250
  stop_input_on_exit: false

logging:
  level: debug
"#;

        let config = TerminalConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.dimensions(), Dimensions::new(30, 120));
        assert_eq!(config.terminal.term, "xterm");
        assert!(!config.terminal.auto_wrap);
        assert_eq!(config.process.shell, "/bin/sh");
        assert!(!config.process.inherit_env);
        assert!(!config.process.login);
        assert_eq!(config.process.env.len(), 1);
        assert_eq!(config.pump.read_chunk_size, 1024);
        assert_eq!(config.pump.idle_threshold(), Duration::from_millis(250));
        // Unspecified fields keep defaults
        assert_eq!(config.pump.poll_interval_ms, 50);
        assert!(!config.pump.stop_input_on_exit);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_yaml() {
        let result = TerminalConfig::from_yaml("terminal: [not, a, map]");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_shell_spawn_config() {
        let mut config = TerminalConfig::default();
        config.process.shell = "/bin/sh".to_string();
        config.process.env = vec![("A".to_string(), "1".to_string())];

        let spawn = config.shell_spawn_config();
        assert_eq!(spawn.program, "/bin/sh");
        assert!(spawn.login);
        assert!(spawn.args.is_empty());
        assert_eq!(spawn.dimensions, Dimensions::new(24, 80));
        assert!(spawn
            .env
            .contains(&("TERM".to_string(), "xterm-256color".to_string())));
        assert!(spawn.env.contains(&("A".to_string(), "1".to_string())));

        config.process.login = false;
        assert!(!config.shell_spawn_config().login);
    }

    #[test]
    fn test_from_file_missing() {
        let result = TerminalConfig::from_file("/definitely/not/here.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
