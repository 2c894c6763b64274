//! Keyboard and clipboard actuation
//!
//! Text is injected through the clipboard plus a single paste
//! keystroke. Per-keystroke typing triggers the editor's auto-indent
//! and bracket completion and corrupts multi-line code; a paste is one
//! atomic insertion the editor treats as literal text.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::keymap::Keymap;

/// Settle time after a hotkey, before the next input event.
const HOTKEY_DELAY_MS: u64 = 100;

/// Time for the command palette / dialog to open and take focus.
const PALETTE_OPEN_DELAY_MS: u64 = 300;

/// Settle time after a paste insertion.
const TYPE_SETTLE_MS: u64 = 50;

/// Low-level input operations. Synchronous so tests can record and
/// assert ordering without async plumbing.
pub trait InputBackend: Send + Sync {
    /// Press a key combination, e.g. "ctrl+shift+p".
    fn send_keys(&self, combo: &str) -> Result<()>;

    /// Replace the system clipboard contents.
    fn set_clipboard(&self, text: &str) -> Result<()>;
}

/// xdotool/arboard-backed implementation.
pub struct SystemInputBackend;

impl SystemInputBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemInputBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBackend for SystemInputBackend {
    fn send_keys(&self, combo: &str) -> Result<()> {
        let status = std::process::Command::new("xdotool")
            .args(["key", "--clearmodifiers", combo])
            .status()
            .map_err(|e| AgentError::Input {
                message: format!("xdotool key: {}", e),
            })?;
        if !status.success() {
            return Err(AgentError::Input {
                message: format!("xdotool key '{}' exited with {}", combo, status),
            });
        }
        Ok(())
    }

    fn set_clipboard(&self, text: &str) -> Result<()> {
        // A fresh clipboard handle per call; arboard's Clipboard is not
        // Sync and the agent writes infrequently.
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| AgentError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AgentError::Clipboard(e.to_string()))?;
        Ok(())
    }
}

/// Editor input driver: hotkeys, text injection and palette commands,
/// with the settle delays interactive editors need between events.
pub struct Actuator {
    backend: Arc<dyn InputBackend>,
    keymap: Arc<Keymap>,
}

impl Actuator {
    pub fn new(backend: Arc<dyn InputBackend>, keymap: Arc<Keymap>) -> Self {
        Self { backend, keymap }
    }

    /// Press one key combination and wait for the editor to settle.
    pub async fn send_hotkey(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Err(AgentError::validation("empty key sequence"));
        }
        let combo = keys.join("+");
        debug!("hotkey: {}", combo);
        self.backend.send_keys(&combo)?;
        tokio::time::sleep(Duration::from_millis(HOTKEY_DELAY_MS)).await;
        Ok(())
    }

    /// Press a named shortcut from the keymap, with a fallback for
    /// actions every keymap is expected to carry.
    pub async fn send_shortcut(&self, name: &str, fallback: &[&str]) -> Result<()> {
        let keys = self.keymap.shortcut_or(name, fallback);
        self.send_hotkey(&keys).await
    }

    /// Inject text via clipboard-paste. Empty text is a no-op.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.backend.set_clipboard(text)?;
        let paste = self.keymap.shortcut_or("paste", &["ctrl", "v"]);
        self.backend.send_keys(&paste.join("+"))?;
        tokio::time::sleep(Duration::from_millis(TYPE_SETTLE_MS)).await;
        Ok(())
    }

    /// Open the command palette, type a command, confirm it.
    pub async fn send_palette_command(&self, command: &str) -> Result<()> {
        self.send_shortcut("command_palette", &["ctrl", "shift", "p"])
            .await?;
        tokio::time::sleep(Duration::from_millis(PALETTE_OPEN_DELAY_MS)).await;
        self.type_text(command).await?;
        tokio::time::sleep(Duration::from_millis(PALETTE_OPEN_DELAY_MS)).await;
        self.send_shortcut("confirm", &["enter"]).await
    }

    /// Press confirm (Enter by default).
    pub async fn confirm(&self) -> Result<()> {
        self.send_shortcut("confirm", &["enter"]).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every input event in order.
    #[derive(Default)]
    pub struct MockInputBackend {
        pub events: Mutex<Vec<String>>,
        pub fail_keys: Mutex<bool>,
        /// Invoked on every send_keys, lets a test observe state
        /// mid-execution.
        #[allow(clippy::type_complexity)]
        pub probe: Mutex<Option<Box<dyn Fn() + Send>>>,
    }

    impl MockInputBackend {
        pub fn recorded(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl InputBackend for MockInputBackend {
        fn send_keys(&self, combo: &str) -> Result<()> {
            if *self.fail_keys.lock().unwrap() {
                return Err(AgentError::Input {
                    message: "injection blocked".to_string(),
                });
            }
            if let Some(probe) = self.probe.lock().unwrap().as_ref() {
                probe();
            }
            self.events.lock().unwrap().push(format!("keys:{}", combo));
            Ok(())
        }

        fn set_clipboard(&self, text: &str) -> Result<()> {
            self.events.lock().unwrap().push(format!("clip:{}", text));
            Ok(())
        }
    }

    fn actuator(backend: Arc<MockInputBackend>) -> Actuator {
        Actuator::new(backend, Arc::new(Keymap::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_hotkey_joins_keys() {
        let backend = Arc::new(MockInputBackend::default());
        let a = actuator(backend.clone());
        a.send_hotkey(&["ctrl".to_string(), "shift".to_string(), "p".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.recorded(), vec!["keys:ctrl+shift+p"]);
    }

    #[tokio::test]
    async fn test_empty_hotkey_rejected() {
        let backend = Arc::new(MockInputBackend::default());
        let a = actuator(backend);
        assert!(a.send_hotkey(&[]).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_text_is_clipboard_then_paste() {
        let backend = Arc::new(MockInputBackend::default());
        let a = actuator(backend.clone());
        a.type_text("def main():\n    pass\n").await.unwrap();
        assert_eq!(
            backend.recorded(),
            vec!["clip:def main():\n    pass\n", "keys:ctrl+v"]
        );
    }

    #[tokio::test]
    async fn test_type_empty_text_is_noop() {
        let backend = Arc::new(MockInputBackend::default());
        let a = actuator(backend.clone());
        a.type_text("").await.unwrap();
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_palette_command_sequence() {
        let backend = Arc::new(MockInputBackend::default());
        let a = actuator(backend.clone());
        a.send_palette_command("Format Document").await.unwrap();
        assert_eq!(
            backend.recorded(),
            vec![
                "keys:ctrl+shift+p",
                "clip:Format Document",
                "keys:ctrl+v",
                "keys:enter"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_paste_shortcut_from_keymap() {
        let backend = Arc::new(MockInputBackend::default());
        let mut keymap = Keymap::default();
        keymap.shortcuts.insert(
            "paste".to_string(),
            vec!["ctrl".to_string(), "shift".to_string(), "v".to_string()],
        );
        let a = Actuator::new(backend.clone(), Arc::new(keymap));
        a.type_text("x").await.unwrap();
        assert_eq!(backend.recorded(), vec!["clip:x", "keys:ctrl+shift+v"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(MockInputBackend::default());
        *backend.fail_keys.lock().unwrap() = true;
        let a = actuator(backend);
        assert!(a.send_hotkey(&["ctrl".to_string(), "s".to_string()]).await.is_err());
    }
}
