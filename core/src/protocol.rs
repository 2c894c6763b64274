//! Server wire protocol
//!
//! JSON messages exchanged with the decision server. Inbound traffic is
//! classified before parsing so lecture-control events never go through
//! the command pipeline; outbound envelopes carry the status heartbeat
//! and per-command completion reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::KNOWN_TYPES;
use crate::controller::{AgentState, AgentStatus, ExecutionResult};

/// Classified inbound server message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// An editor command to execute; the payload still needs
    /// `Command::parse`.
    EditorCommand(Value),
    /// Pause the lecture session; audio stops, commands keep flowing.
    LecturePause { reason: Option<String> },
    LectureResume,
    /// Recognized JSON but no event the agent acts on.
    Other { event: String },
}

/// Classify one raw server frame. Non-JSON text frames yield `None`
/// and are ignored by the caller.
pub fn classify(raw: &str) -> Option<Inbound> {
    let data: Value = serde_json::from_str(raw).ok()?;
    let event = data
        .get("type")
        .or_else(|| data.get("event"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let is_command = event == "editor_sync"
        || data.get("action").is_some()
        || KNOWN_TYPES.contains(&event.as_str());
    if is_command {
        // editor_sync envelopes may nest the command; flat frames are
        // the command themselves.
        let payload = match data.get("command") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => data.clone(),
        };
        return Some(Inbound::EditorCommand(payload));
    }

    match event.as_str() {
        "lecture_pause" => Some(Inbound::LecturePause {
            reason: data
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        "lecture_resume" => Some(Inbound::LectureResume),
        _ => Some(Inbound::Other { event }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// Outbound agent message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Hello {
        message: String,
        timestamp: f64,
    },
    LocalStatus {
        active_window: String,
        target_app_running: bool,
        state: AgentState,
        current_keymap: String,
        is_paused: bool,
        timestamp: f64,
    },
    TaskComplete {
        status: TaskStatus,
        command_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: f64,
    },
}

impl Outbound {
    pub fn hello() -> Self {
        Self::Hello {
            message: "deskpilot agent connected".to_string(),
            timestamp: now_secs(),
        }
    }

    pub fn local_status(status: AgentStatus, is_paused: bool) -> Self {
        Self::LocalStatus {
            active_window: status.active_window,
            target_app_running: status.target_app_running,
            state: status.state,
            current_keymap: status.current_keymap,
            is_paused,
            timestamp: status.timestamp,
        }
    }

    /// Completion report correlated to the command that produced it.
    /// Commands arriving without an id report "unknown".
    pub fn task_complete(result: &ExecutionResult, command_id: Option<&str>) -> Self {
        Self::TaskComplete {
            status: if result.success {
                TaskStatus::Success
            } else {
                TaskStatus::Failed
            },
            command_id: command_id.unwrap_or("unknown").to_string(),
            message: if result.success {
                None
            } else {
                Some(result.message.clone())
            },
            timestamp: result.timestamp,
        }
    }

    /// Acknowledgment for a command frame that never reached execution
    /// because it failed to parse. The server awaits a result for every
    /// command it sends, so rejection must answer too.
    pub fn task_rejected(command_id: Option<&str>, message: &str) -> Self {
        Self::TaskComplete {
            status: TaskStatus::Failed,
            command_id: command_id.unwrap_or("unknown").to_string(),
            message: Some(message.to_string()),
            timestamp: now_secs(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serialization of these shapes cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
