//! Command dispatch
//!
//! One controller owns the window resolver, input actuator and
//! reconciler and routes each parsed command to its handler. Commands
//! run one at a time; a busy flag is raised for the duration of each
//! execution and restored on every exit path, including panics, via a
//! drop guard.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::command::{Command, CommandKind};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::input::{Actuator, InputBackend};
use crate::keymap::Keymap;
use crate::reconcile::Reconciler;
use crate::window::{WindowBackend, WindowResolver};

/// Time for a native open/save dialog to appear and take focus.
const DIALOG_OPEN_DELAY_MS: u64 = 500;

/// Settle time after confirming a dialog.
const DIALOG_SETTLE_MS: u64 = 300;

/// Outcome of one command execution. Always produced; a failed handler
/// reports `success: false` rather than tearing down the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    /// Unix seconds with sub-second precision
    pub timestamp: f64,
}

impl ExecutionResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: now_secs(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: now_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    Idle,
    Busy,
}

/// Point-in-time snapshot reported to the server. Built read-only;
/// backend failures substitute sentinels instead of erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub active_window: String,
    pub target_app_running: bool,
    pub state: AgentState,
    pub current_keymap: String,
    pub timestamp: f64,
}

/// Clears the busy flag when dropped, whatever path the handler took
/// out of `execute`.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct EditorController {
    config: Arc<AgentConfig>,
    keymap: Arc<Keymap>,
    resolver: Arc<WindowResolver>,
    actuator: Arc<Actuator>,
    reconciler: Reconciler,
    busy: Arc<AtomicBool>,
}

impl EditorController {
    pub fn new(
        config: Arc<AgentConfig>,
        keymap: Arc<Keymap>,
        window_backend: Arc<dyn WindowBackend>,
        input_backend: Arc<dyn InputBackend>,
    ) -> Self {
        let resolver = Arc::new(WindowResolver::new(
            window_backend,
            config.editor_executable.clone(),
            config.target_project_path.clone(),
        ));
        let actuator = Arc::new(Actuator::new(input_backend, keymap.clone()));
        let reconciler = Reconciler::new(resolver.clone(), keymap.clone(), config.clone());
        Self {
            config,
            keymap,
            resolver,
            actuator,
            reconciler,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle on the busy flag, shared with status reporting.
    pub fn busy_handle(&self) -> Arc<AtomicBool> {
        self.busy.clone()
    }

    /// Execute one command to completion. Never fails outward: handler
    /// errors become `success: false` results, and the busy flag is
    /// cleared on every path.
    pub async fn execute(&self, command: &Command) -> ExecutionResult {
        let _guard = BusyGuard::raise(&self.busy);
        info!("executing {}", command.kind.type_name());

        if command.kind.is_edit_class() {
            if let Some(target) = command.target_file.as_deref().filter(|t| !t.is_empty()) {
                self.reconciler
                    .ensure_correct_file(
                        target,
                        command.expected_content.as_deref().unwrap_or(""),
                    )
                    .await;
            }
        }

        let result = match &command.kind {
            CommandKind::FocusWindow {
                window_title,
                project_hint,
            } => self.handle_focus_window(window_title, project_hint).await,
            CommandKind::Hotkey { keys } => self.handle_hotkey(keys).await,
            CommandKind::TypeText { content } => self.handle_type_text(content).await,
            CommandKind::CommandPalette { command } => {
                self.handle_command_palette(command).await
            }
            CommandKind::OpenFile { file_path } => self.handle_open_file(file_path).await,
            CommandKind::GotoLine {
                line_number,
                column,
            } => self.handle_goto_line(*line_number, *column).await,
            CommandKind::OpenFolder {
                folder_path,
                new_window,
            } => self.handle_open_folder(folder_path, *new_window).await,
            CommandKind::SaveFile {
                file_name,
                folder_path,
            } => {
                self.handle_save_file(file_name.as_deref(), folder_path.as_deref())
                    .await
            }
        };

        match result {
            Ok(result) => result,
            Err(e) => {
                warn!("{} failed: {}", command.kind.type_name(), e);
                ExecutionResult::failed(format!(
                    "{} failed: {}",
                    command.kind.type_name(),
                    e
                ))
            }
        }
    }

    /// Snapshot of agent state for status reports. Never fails.
    pub fn status(&self) -> AgentStatus {
        let active_window = self
            .resolver
            .active_window_title()
            .unwrap_or_else(|| "Unknown".to_string());
        let target_app_running = self.resolver.app_running(&self.keymap.window_title_pattern);
        let state = if self.busy.load(Ordering::SeqCst) {
            AgentState::Busy
        } else {
            AgentState::Idle
        };
        AgentStatus {
            active_window,
            target_app_running,
            state,
            current_keymap: self.keymap.editor.clone(),
            timestamp: now_secs(),
        }
    }

    async fn handle_focus_window(
        &self,
        window_title: &str,
        project_hint: &str,
    ) -> Result<ExecutionResult> {
        let ok = self
            .resolver
            .ensure(
                window_title,
                project_hint,
                self.config.auto_launch.enabled,
                Duration::from_secs(self.config.auto_launch.timeout_secs),
                Duration::from_millis(self.config.auto_launch.poll_interval_ms),
            )
            .await;
        if ok {
            Ok(ExecutionResult::ok(format!("focused '{}'", window_title)))
        } else {
            Ok(ExecutionResult::failed(format!(
                "window '{}' not found",
                window_title
            )))
        }
    }

    async fn handle_hotkey(&self, keys: &[String]) -> Result<ExecutionResult> {
        self.actuator.send_hotkey(keys).await?;
        Ok(ExecutionResult::ok(format!("sent {}", keys.join("+"))))
    }

    async fn handle_type_text(&self, content: &str) -> Result<ExecutionResult> {
        self.actuator.type_text(content).await?;
        Ok(ExecutionResult::ok(format!(
            "typed: {}",
            preview(content, 30)
        )))
    }

    async fn handle_command_palette(&self, command: &str) -> Result<ExecutionResult> {
        self.actuator.send_palette_command(command).await?;
        Ok(ExecutionResult::ok(format!("palette: {}", command)))
    }

    /// Drives the editor's own open dialog rather than the CLI
    /// launcher, so the open lands in the focused window.
    async fn handle_open_file(&self, file_path: &str) -> Result<ExecutionResult> {
        self.actuator.send_shortcut("open_file", &["ctrl", "o"]).await?;
        sleep_ms(DIALOG_OPEN_DELAY_MS).await;
        self.actuator.type_text(file_path).await?;
        self.actuator.confirm().await?;
        sleep_ms(DIALOG_SETTLE_MS).await;
        Ok(ExecutionResult::ok(format!("opened {}", file_path)))
    }

    async fn handle_goto_line(
        &self,
        line_number: u32,
        column: Option<u32>,
    ) -> Result<ExecutionResult> {
        self.actuator.send_shortcut("goto_line", &["ctrl", "g"]).await?;
        sleep_ms(DIALOG_SETTLE_MS).await;
        let destination = match column {
            Some(col) => format!("{}:{}", line_number, col),
            None => line_number.to_string(),
        };
        self.actuator.type_text(&destination).await?;
        self.actuator.confirm().await?;
        Ok(ExecutionResult::ok(format!("cursor at {}", destination)))
    }

    async fn handle_open_folder(
        &self,
        folder_path: &str,
        new_window: bool,
    ) -> Result<ExecutionResult> {
        if !self.resolver.open_folder(folder_path, new_window) {
            return Ok(ExecutionResult::failed(format!(
                "could not open folder {}",
                folder_path
            )));
        }
        let ok = self
            .resolver
            .ensure(
                &self.keymap.window_title_pattern,
                folder_name(folder_path),
                self.config.auto_launch.enabled,
                Duration::from_secs(self.config.auto_launch.timeout_secs),
                Duration::from_millis(self.config.auto_launch.poll_interval_ms),
            )
            .await;
        if ok {
            Ok(ExecutionResult::ok(format!("opened folder {}", folder_path)))
        } else {
            Ok(ExecutionResult::failed(format!(
                "folder {} opened but window did not appear",
                folder_path
            )))
        }
    }

    /// Unnamed saves are one shortcut. Named saves walk the save-as
    /// dialog: a fixed step sequence ending in an overwrite confirm,
    /// which is harmless when no overwrite prompt appears.
    async fn handle_save_file(
        &self,
        file_name: Option<&str>,
        folder_path: Option<&str>,
    ) -> Result<ExecutionResult> {
        let Some(name) = file_name.filter(|n| !n.is_empty()) else {
            self.actuator.send_shortcut("save", &["ctrl", "s"]).await?;
            return Ok(ExecutionResult::ok("saved"));
        };

        let full_path = match folder_path.filter(|f| !f.is_empty()) {
            Some(folder) => format!("{}/{}", folder.trim_end_matches('/'), name),
            None => name.to_string(),
        };
        self.actuator
            .send_shortcut("save_as", &["ctrl", "shift", "s"])
            .await?;
        sleep_ms(DIALOG_OPEN_DELAY_MS).await;
        self.actuator.type_text(&full_path).await?;
        self.actuator.confirm().await?;
        sleep_ms(DIALOG_SETTLE_MS).await;
        self.actuator.confirm().await?;
        Ok(ExecutionResult::ok(format!("saved as {}", full_path)))
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    }
}

fn folder_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
