use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::executor::TmuxExecutor;
use crate::process::SpawnTiming;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".tmuxctl";

/// How the tmux binary is reached.
///
/// ```toml
/// [tmux]
/// binary = "/usr/local/bin/tmux"
/// socket_name = "ci"
/// command_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TmuxSettings {
    #[serde(default = "default_tmux_binary")]
    pub binary: String,
    /// `-L <name>`.
    #[serde(default)]
    pub socket_name: Option<String>,
    /// `-S <path>`; wins over `socket_name`.
    #[serde(default)]
    pub socket_path: Option<String>,
    /// 0 disables the deadline.
    #[serde(default)]
    pub command_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpawnSettings {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_pid_poll_timeout_ms")]
    pub pid_poll_timeout_ms: u64,
    #[serde(default = "default_pid_poll_initial_ms")]
    pub pid_poll_initial_ms: u64,
    #[serde(default = "default_pid_poll_max_ms")]
    pub pid_poll_max_ms: u64,
}

fn default_tmux_binary() -> String {
    "tmux".to_string()
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_pid_poll_timeout_ms() -> u64 {
    1000
}

fn default_pid_poll_initial_ms() -> u64 {
    25
}

fn default_pid_poll_max_ms() -> u64 {
    200
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            binary: default_tmux_binary(),
            socket_name: None,
            socket_path: None,
            command_timeout_ms: 0,
        }
    }
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            pid_poll_timeout_ms: default_pid_poll_timeout_ms(),
            pid_poll_initial_ms: default_pid_poll_initial_ms(),
            pid_poll_max_ms: default_pid_poll_max_ms(),
        }
    }
}

impl TmuxSettings {
    pub fn executor(&self) -> TmuxExecutor {
        let mut exec = TmuxExecutor::new(&self.binary);
        if let Some(ref path) = self.socket_path {
            exec = exec.with_socket_path(path);
        }
        if let Some(ref name) = self.socket_name {
            exec = exec.with_socket_name(name);
        }
        if self.command_timeout_ms > 0 {
            exec = exec.with_timeout(Duration::from_millis(self.command_timeout_ms));
        }
        exec
    }
}

impl SpawnSettings {
    pub fn timing(&self) -> SpawnTiming {
        SpawnTiming {
            settle: Duration::from_millis(self.settle_delay_ms),
            poll_timeout: Duration::from_millis(self.pid_poll_timeout_ms),
            poll_initial: Duration::from_millis(self.pid_poll_initial_ms),
            poll_max: Duration::from_millis(self.pid_poll_max_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tmux: TmuxSettings,
    #[serde(default)]
    pub spawn: SpawnSettings,
}

impl Config {
    /// Search upward from `start` for a `.tmuxctl/config.toml` file and load it.
    /// Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((Config::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}
