//! Static keymap configuration
//!
//! Maps logical editor actions ("save", "goto_line") to key sequences,
//! loaded once at startup from YAML. A missing or malformed keymap is a
//! startup-fatal error; there is no runtime fallback.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AgentError, Result};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Keymap {
    /// Editor identifier, e.g. "vscode"
    pub editor: String,

    /// Title pattern used to find the target application's windows
    pub window_title_pattern: String,

    /// Hint used by the launcher to classify the application
    #[serde(default)]
    pub app_hint: String,

    /// Logical action name → ordered key names
    #[serde(default)]
    pub shortcuts: HashMap<String, Vec<String>>,
}

impl Keymap {
    /// Load a keymap from a YAML file. Read-only after this point.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AgentError::KeymapLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let keymap: Keymap =
            serde_yml::from_str(&text).map_err(|e| AgentError::KeymapLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(keymap)
    }

    pub fn shortcut(&self, name: &str) -> Option<&[String]> {
        self.shortcuts.get(name).map(Vec::as_slice)
    }

    /// Shortcut lookup with a built-in default for actions every keymap
    /// is expected to carry.
    pub fn shortcut_or(&self, name: &str, fallback: &[&str]) -> Vec<String> {
        match self.shortcuts.get(name) {
            Some(keys) => keys.clone(),
            None => fallback.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        let mut shortcuts = HashMap::new();
        for (name, keys) in [
            ("save", vec!["ctrl", "s"]),
            ("save_as", vec!["ctrl", "shift", "s"]),
            ("goto_line", vec!["ctrl", "g"]),
            ("open_file", vec!["ctrl", "o"]),
            ("command_palette", vec!["ctrl", "shift", "p"]),
            ("paste", vec!["ctrl", "v"]),
            ("confirm", vec!["enter"]),
        ] {
            shortcuts.insert(
                name.to_string(),
                keys.into_iter().map(str::to_string).collect(),
            );
        }
        Self {
            editor: "vscode".to_string(),
            window_title_pattern: "Visual Studio Code".to_string(),
            app_hint: "vscode".to_string(),
            shortcuts,
        }
    }
}
