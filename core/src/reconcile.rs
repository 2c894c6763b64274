//! File context reconciliation
//!
//! The remote session and the local editor drift: the user closes the
//! editor, switches workspaces, opens the wrong file, or the file on
//! disk no longer matches what the session believes is in the buffer.
//! Before an edit command runs, the reconciler walks four ordered
//! checks and repairs each mismatch it finds. Everything here is best
//! effort: a repair that fails is logged and the command still runs,
//! because a missed repair is recoverable and a refused command is not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::keymap::Keymap;
use crate::wait::poll_until;
use crate::window::WindowResolver;

/// Minimum fraction of expected lines that must appear locally for the
/// on-disk file to count as matching.
const OVERLAP_THRESHOLD: f64 = 0.5;

/// How long to wait for the editor to pick up an opened workspace or
/// file before giving up on that check.
const REPAIR_TIMEOUT: Duration = Duration::from_secs(10);
const REPAIR_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What the content check decided to do. Surfaced for logging and for
/// tests; callers do not branch on it.
#[derive(Debug, PartialEq, Eq)]
pub enum ContentOutcome {
    /// File was absent; created with the expected content.
    Created,
    /// File existed but was blank; expected content written.
    Filled,
    /// Expected content already present (containment or line overlap).
    Matched,
    /// Local content diverged too far; replaced with expected content.
    Overwrote,
    /// No expected content supplied; nothing to verify.
    Skipped,
}

pub struct Reconciler {
    resolver: Arc<WindowResolver>,
    keymap: Arc<Keymap>,
    config: Arc<AgentConfig>,
}

impl Reconciler {
    pub fn new(
        resolver: Arc<WindowResolver>,
        keymap: Arc<Keymap>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            resolver,
            keymap,
            config,
        }
    }

    /// Run the four drift checks for `target_file` before an edit
    /// command. Never fails; each repair logs its own outcome.
    pub async fn ensure_correct_file(&self, target_file: &str, expected_content: &str) {
        if target_file.is_empty() {
            return;
        }

        self.check_application().await;
        self.check_workspace().await;
        let path = self.resolve_target_path(target_file);
        self.check_open_file(&path).await;
        let outcome = self.check_content(&path, expected_content);
        match outcome {
            ContentOutcome::Created | ContentOutcome::Filled | ContentOutcome::Overwrote => {
                info!("reconciled content of {}: {:?}", path.display(), outcome);
                // The editor reloads the file from disk; reopen to make
                // sure the refreshed buffer is the one in front.
                self.resolver.open_path(&path.to_string_lossy());
            }
            ContentOutcome::Matched | ContentOutcome::Skipped => {
                debug!("content check for {}: {:?}", path.display(), outcome);
            }
        }
    }

    /// Check 1: the target application is running and focused.
    async fn check_application(&self) {
        let ok = self
            .resolver
            .ensure(
                &self.keymap.window_title_pattern,
                "",
                self.config.auto_launch.enabled,
                Duration::from_secs(self.config.auto_launch.timeout_secs),
                Duration::from_millis(self.config.auto_launch.poll_interval_ms),
            )
            .await;
        if !ok {
            warn!(
                "could not bring up '{}', continuing anyway",
                self.keymap.window_title_pattern
            );
        }
    }

    /// Check 2: the expected workspace is the one open.
    async fn check_workspace(&self) {
        let Some(project) = self.config.target_project_path.clone() else {
            return;
        };
        let Some(name) = self.config.target_project_name() else {
            return;
        };
        if self.window_mentions(&name) {
            return;
        }

        info!("workspace '{}' not open, opening it", name);
        if !self
            .resolver
            .open_folder(&project.to_string_lossy(), false)
        {
            return;
        }
        let appeared = poll_until(
            || self.window_mentions(&name),
            REPAIR_POLL_INTERVAL,
            REPAIR_TIMEOUT,
        )
        .await;
        if !appeared {
            warn!("workspace '{}' did not appear in any window title", name);
        }
    }

    /// Check 3: the target file is the one in front.
    async fn check_open_file(&self, path: &Path) {
        let Some(expected_name) = path.file_name().map(|n| n.to_string_lossy().to_string())
        else {
            return;
        };
        let current = self
            .resolver
            .active_window_title()
            .as_deref()
            .and_then(titled_file_name);
        if current.as_deref() == Some(expected_name.as_str()) {
            return;
        }

        info!(
            "active file is {:?}, expected '{}'",
            current, expected_name
        );
        if !path.exists() {
            if let Err(e) = create_empty_file(path) {
                warn!("could not create {}: {}", path.display(), e);
                return;
            }
        }
        if !self.resolver.open_path(&path.to_string_lossy()) {
            return;
        }
        let opened = poll_until(
            || {
                self.resolver
                    .active_window_title()
                    .as_deref()
                    .and_then(titled_file_name)
                    .as_deref()
                    == Some(expected_name.as_str())
            },
            REPAIR_POLL_INTERVAL,
            REPAIR_TIMEOUT,
        )
        .await;
        if !opened {
            warn!("'{}' did not become the active file", expected_name);
        }
        // The open may have spawned focus elsewhere; put the editor
        // window back in front for the keystrokes that follow.
        self.resolver.focus(&self.keymap.window_title_pattern, "");
        tokio::time::sleep(REPAIR_POLL_INTERVAL).await;
    }

    /// Check 4: what is on disk matches what the session expects.
    fn check_content(&self, path: &Path, expected: &str) -> ContentOutcome {
        if expected.trim().is_empty() {
            return ContentOutcome::Skipped;
        }
        match reconcile_content(path, expected) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("content check failed for {}: {}", path.display(), e);
                ContentOutcome::Skipped
            }
        }
    }

    fn window_mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.resolver
            .active_window_title()
            .map(|t| t.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }

    /// Relative paths are taken against the configured project root.
    fn resolve_target_path(&self, target_file: &str) -> PathBuf {
        let path = Path::new(target_file);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.config.target_project_path {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Apply the content decision ladder to the file at `path`.
fn reconcile_content(path: &Path, expected: &str) -> std::io::Result<ContentOutcome> {
    if !path.exists() {
        write_file(path, expected)?;
        return Ok(ContentOutcome::Created);
    }
    let local = std::fs::read_to_string(path)?;
    if local.trim().is_empty() {
        write_file(path, expected)?;
        return Ok(ContentOutcome::Filled);
    }
    if local.contains(expected.trim()) {
        return Ok(ContentOutcome::Matched);
    }
    if content_overlap(expected, &local) >= OVERLAP_THRESHOLD {
        return Ok(ContentOutcome::Matched);
    }
    write_file(path, expected)?;
    Ok(ContentOutcome::Overwrote)
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)
}

fn create_empty_file(path: &Path) -> std::io::Result<()> {
    write_file(path, "")
}

/// Fraction of non-blank expected lines found verbatim (after trim) in
/// the local text.
pub fn content_overlap(expected: &str, local: &str) -> f64 {
    let local_lines: std::collections::HashSet<&str> =
        local.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let expected_lines: Vec<&str> = expected
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if expected_lines.is_empty() {
        return 1.0;
    }
    let hits = expected_lines
        .iter()
        .filter(|l| local_lines.contains(**l))
        .count();
    hits as f64 / expected_lines.len() as f64
}

/// File name shown in a window title: the leading segment up to the
/// first `" - "`, with the modified-indicator stripped.
pub fn titled_file_name(title: &str) -> Option<String> {
    let leading = title.split(" - ").next()?.trim();
    let name = leading
        .trim_start_matches('●')
        .trim_start_matches('*')
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
