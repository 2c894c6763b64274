//! Editor command model (remote → local)
//!
//! Commands arrive in one of two wire shapes: the canonical
//! `{type, payload}` envelope and a legacy flat `{action, target,
//! content, line, ...}` shape kept for older servers. Both normalize
//! into [`Command`] here, at the parse boundary, so handlers never see
//! raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Command types this agent understands, in canonical wire spelling.
pub const KNOWN_TYPES: &[&str] = &[
    "focus_window",
    "hotkey",
    "type_text",
    "command_palette",
    "open_file",
    "goto_line",
    "open_folder",
    "save_file",
];

/// One editor intent, tagged by `type` with a per-type payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CommandKind {
    FocusWindow {
        window_title: String,
        #[serde(default)]
        project_hint: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    TypeText {
        content: String,
    },
    CommandPalette {
        command: String,
    },
    OpenFile {
        file_path: String,
    },
    GotoLine {
        line_number: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },
    OpenFolder {
        folder_path: String,
        #[serde(default)]
        new_window: bool,
    },
    SaveFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder_path: Option<String>,
    },
}

impl CommandKind {
    /// Wire name of this command type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FocusWindow { .. } => "focus_window",
            Self::Hotkey { .. } => "hotkey",
            Self::TypeText { .. } => "type_text",
            Self::CommandPalette { .. } => "command_palette",
            Self::OpenFile { .. } => "open_file",
            Self::GotoLine { .. } => "goto_line",
            Self::OpenFolder { .. } => "open_folder",
            Self::SaveFile { .. } => "save_file",
        }
    }

    /// Edit-class commands mutate or navigate within a file and require
    /// file-context reconciliation before execution.
    pub fn is_edit_class(&self) -> bool {
        matches!(
            self,
            Self::Hotkey { .. }
                | Self::TypeText { .. }
                | Self::GotoLine { .. }
                | Self::SaveFile { .. }
                | Self::CommandPalette { .. }
        )
    }
}

/// A remote intent plus its envelope metadata.
///
/// `target_file` and `expected_content` carry what the remote side
/// believes is on screen; the reconciler consumes them before
/// edit-class commands run. `audio_url` is opaque here, forwarded by
/// the transport and never fetched or played by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub id: Option<String>,
    pub audio_url: Option<String>,
    pub target_file: Option<String>,
    pub expected_content: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            id: None,
            audio_url: None,
            target_file: None,
            expected_content: None,
        }
    }

    /// Parse either wire shape into a validated command.
    ///
    /// An envelope with a `type` field (and no legacy `action`) takes
    /// the canonical path, which rejects unknown types outright. The
    /// legacy path instead falls back to a harmless empty `TypeText`
    /// for unknown actions. The asymmetry is deliberate and pinned by
    /// tests; see the module tests before unifying it.
    pub fn parse(raw: &Value) -> Result<Command> {
        let obj = raw
            .as_object()
            .ok_or_else(|| AgentError::validation("command envelope must be a JSON object"))?;

        let cmd = if obj.contains_key("type") && !obj.contains_key("action") {
            parse_canonical(obj)?
        } else {
            parse_legacy(obj)?
        };

        cmd.validate()?;
        Ok(cmd)
    }

    /// Serialize to the canonical `{type, payload, ...}` wire shape.
    pub fn to_value(&self) -> Value {
        let mut obj = match serde_json::to_value(&self.kind) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        if let Some(url) = &self.audio_url {
            obj.insert("audio_url".to_string(), Value::String(url.clone()));
        }
        if let Some(f) = &self.target_file {
            obj.insert("target_file".to_string(), Value::String(f.clone()));
        }
        if let Some(c) = &self.expected_content {
            obj.insert("expected_content".to_string(), Value::String(c.clone()));
        }
        Value::Object(obj)
    }

    fn validate(&self) -> Result<()> {
        if let CommandKind::GotoLine {
            line_number,
            column,
        } = &self.kind
        {
            if *line_number < 1 {
                return Err(AgentError::validation("line_number must be >= 1"));
            }
            if let Some(col) = column {
                if *col < 1 {
                    return Err(AgentError::validation("column must be >= 1"));
                }
            }
        }
        Ok(())
    }
}

fn parse_canonical(obj: &Map<String, Value>) -> Result<Command> {
    let cmd_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::validation("'type' must be a string"))?;

    if !KNOWN_TYPES.contains(&cmd_type) {
        return Err(AgentError::UnknownCommandType {
            command_type: cmd_type.to_string(),
        });
    }

    // Missing payload is treated as {} so payload-optional commands
    // (save_file) still parse; required fields surface as validation
    // errors through serde.
    let payload = obj
        .get("payload")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let tagged = serde_json::json!({ "type": cmd_type, "payload": payload });
    let kind: CommandKind = serde_json::from_value(tagged).map_err(|e| {
        AgentError::validation(format!("payload does not match '{}': {}", cmd_type, e))
    })?;

    Ok(Command {
        kind,
        id: opt_string(obj, "id"),
        audio_url: opt_string(obj, "audio_url"),
        target_file: opt_string(obj, "target_file"),
        expected_content: opt_string(obj, "expected_content"),
    })
}

fn parse_legacy(obj: &Map<String, Value>) -> Result<Command> {
    // `params`, when present, wins over top-level fields of the same
    // name. Older servers sent both.
    let mut merged = obj.clone();
    if let Some(Value::Object(params)) = obj.get("params") {
        for (k, v) in params {
            merged.insert(k.clone(), v.clone());
        }
    }

    let action = merged
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    let target = str_field(&merged, "target");
    let content = str_field(&merged, "content");

    let kind = match action.as_str() {
        "type" | "type_code" | "type_text" => CommandKind::TypeText { content },
        "hotkey" => CommandKind::Hotkey {
            keys: legacy_keys(&merged),
        },
        "goto_line" => {
            let line_number = coerce_line(&merged)?;
            let column = match merged.get("column") {
                Some(v) => Some(coerce_u32(v, "column")?),
                None => None,
            };
            CommandKind::GotoLine {
                line_number,
                column,
            }
        }
        "command_palette" => CommandKind::CommandPalette { command: content },
        "open_file" => CommandKind::OpenFile { file_path: content },
        "focus_window" => CommandKind::FocusWindow {
            window_title: if target.is_empty() { content } else { target },
            project_hint: str_field(&merged, "project_hint"),
        },
        "open_folder" => CommandKind::OpenFolder {
            folder_path: {
                let explicit = str_field(&merged, "folder_path");
                if explicit.is_empty() { content } else { explicit }
            },
            new_window: merged
                .get("new_window")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        "save_file" => CommandKind::SaveFile {
            file_name: opt_string(&merged, "file_name").or_else(|| {
                if content.is_empty() {
                    None
                } else {
                    Some(content)
                }
            }),
            folder_path: opt_string(&merged, "folder_path"),
        },
        // Unrecognized or missing action: degrade to a no-op rather
        // than failing, so a stale server cannot wedge the pipeline.
        _ => CommandKind::TypeText {
            content: String::new(),
        },
    };

    Ok(Command {
        kind,
        id: opt_string(&merged, "id"),
        audio_url: opt_string(&merged, "audio_url"),
        target_file: opt_string(&merged, "target_file"),
        expected_content: opt_string(&merged, "expected_content"),
    })
}

/// Legacy hotkeys arrive either as a list of key names or as a
/// "+"-delimited string; empty tokens from stray delimiters are dropped.
fn legacy_keys(merged: &Map<String, Value>) -> Vec<String> {
    match merged.get("content") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .filter(|k| !k.is_empty())
            .collect(),
        Some(Value::String(combo)) => combo
            .split('+')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn coerce_line(merged: &Map<String, Value>) -> Result<u32> {
    let raw = merged
        .get("line")
        .or_else(|| merged.get("line_number"))
        .unwrap_or(&Value::Null);
    match raw {
        Value::Null => Ok(1),
        other => coerce_u32(other, "line"),
    }
}

fn coerce_u32(value: &Value, field: &str) -> Result<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| AgentError::validation(format!("{} out of range", field))),
        Value::String(s) => s.trim().parse::<u32>().map_err(|_| {
            AgentError::validation(format!("{} is not an integer: '{}'", field, s))
        }),
        _ => Err(AgentError::validation(format!(
            "{} must be an integer",
            field
        ))),
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn opt_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}
