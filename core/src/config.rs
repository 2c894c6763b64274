//! Agent configuration
//!
//! YAML configuration loaded from the user config directory, with
//! serde-level defaults so a missing file yields a usable setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "deskpilot.yaml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "deskpilot";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentConfig {
    /// Remote decision server URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Seconds between status reports to the server
    #[serde(default = "default_status_interval")]
    pub status_report_interval_secs: u64,

    /// Reconnect policy for the server link
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Auto-launch policy used when the target window is absent
    #[serde(default)]
    pub auto_launch: AutoLaunchConfig,

    /// Project/workspace the remote session is expected to operate in.
    /// Used for window disambiguation and workspace reconciliation.
    #[serde(default)]
    pub target_project_path: Option<PathBuf>,

    /// Explicit editor executable; when unset the launcher falls back
    /// to the CLI launcher on PATH ("code")
    #[serde(default)]
    pub editor_executable: Option<PathBuf>,

    /// Path to the keymap file
    #[serde(default = "default_keymap_path")]
    pub keymap_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds to wait between attempts
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
    /// 0 means retry forever
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: default_reconnect_delay(),
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AutoLaunchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total time to wait for a launched window to appear
    #[serde(default = "default_launch_timeout")]
    pub timeout_secs: u64,
    /// Sleep between focus attempts while waiting
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for AutoLaunchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_launch_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_server_url() -> String {
    "ws://127.0.0.1:8000/ws/agent".to_string()
}

fn default_status_interval() -> u64 {
    1
}

fn default_reconnect_delay() -> u64 {
    3
}

fn default_launch_timeout() -> u64 {
    15
}

fn default_poll_interval() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_keymap_path() -> PathBuf {
    PathBuf::from("keymaps/vscode.yaml")
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            status_report_interval_secs: default_status_interval(),
            reconnect: ReconnectConfig::default(),
            auto_launch: AutoLaunchConfig::default(),
            target_project_path: None,
            editor_executable: None,
            keymap_path: default_keymap_path(),
        }
    }
}

impl AgentConfig {
    /// Load from the default location, falling back to defaults when no
    /// config file exists yet. A file that exists but does not parse is
    /// an error; silently ignoring a broken config hides real mistakes.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yml::from_str(&text).map_err(|e| AgentError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Folder name of the configured target project, used for window
    /// title matching.
    pub fn target_project_name(&self) -> Option<String> {
        self.target_project_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }
}
