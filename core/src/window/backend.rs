//! OS window primitives
//!
//! Thin seam over the window system so the resolver can be exercised
//! against in-memory fakes. The system implementation shells out to
//! wmctrl/xdotool; an OS-level failure is logged by callers and
//! degrades to "not found" rather than aborting a command.

use std::process::{Command, Stdio};

use crate::error::{AgentError, Result};

/// Low-level window operations consumed by the resolver.
pub trait WindowBackend: Send + Sync {
    /// Titles of all current top-level windows, in enumeration order.
    fn list_window_titles(&self) -> Result<Vec<String>>;

    /// Raise and focus the window with this exact title. False when no
    /// such window exists anymore.
    fn activate(&self, title: &str) -> Result<bool>;

    /// Title of the currently focused window.
    fn active_window_title(&self) -> Result<String>;

    /// Spawn a detached process. Success means the request was issued,
    /// not that a window appeared.
    fn spawn(&self, program: &str, args: &[String]) -> Result<()>;
}

/// wmctrl/xdotool-backed implementation.
pub struct SystemWindowBackend;

impl SystemWindowBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemWindowBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for SystemWindowBackend {
    fn list_window_titles(&self) -> Result<Vec<String>> {
        let output = Command::new("wmctrl")
            .arg("-l")
            .output()
            .map_err(|e| AgentError::WindowBackend {
                message: format!("wmctrl -l: {}", e),
            })?;
        if !output.status.success() {
            return Err(AgentError::WindowBackend {
                message: format!(
                    "wmctrl -l exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        // wmctrl -l lines: <id> <desktop> <host> <title...>
        let titles = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.splitn(4, char::is_whitespace).nth(3))
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .collect();
        Ok(titles)
    }

    fn activate(&self, title: &str) -> Result<bool> {
        let status = Command::new("wmctrl")
            .args(["-a", title])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| AgentError::WindowBackend {
                message: format!("wmctrl -a: {}", e),
            })?;
        Ok(status.success())
    }

    fn active_window_title(&self) -> Result<String> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", "getwindowname"])
            .output()
            .map_err(|e| AgentError::WindowBackend {
                message: format!("xdotool getactivewindow: {}", e),
            })?;
        if !output.status.success() {
            return Err(AgentError::WindowBackend {
                message: format!(
                    "xdotool getactivewindow exited with {}",
                    output.status
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn spawn(&self, program: &str, args: &[String]) -> Result<()> {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AgentError::LaunchFailed {
                app: program.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
