//! Window resolution, focus and launch
//!
//! Finds the target application's window among everything currently on
//! screen, disambiguates between multiple instances, and launches the
//! application when it is absent. Handles are resolved fresh for every
//! operation; titles go stale the moment the user touches anything, so
//! nothing here is cached across commands.

use regex::{Regex, RegexBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::wait::poll_until;

pub mod backend;

pub use backend::{SystemWindowBackend, WindowBackend};

/// Transient reference to one resolved window. Valid only for the
/// focus/launch operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHandle {
    pub title: String,
}

/// Substring tokens that identify the VS Code family of windows.
const VSCODE_HINTS: &[&str] = &["visual studio code", "vs code", "vscode", "code"];

/// Default CLI launcher when no explicit executable is configured.
const VSCODE_LAUNCHER: &str = "code";

pub struct WindowResolver {
    backend: Arc<dyn WindowBackend>,
    editor_executable: Option<PathBuf>,
    target_project_path: Option<PathBuf>,
}

impl WindowResolver {
    pub fn new(
        backend: Arc<dyn WindowBackend>,
        editor_executable: Option<PathBuf>,
        target_project_path: Option<PathBuf>,
    ) -> Self {
        Self {
            backend,
            editor_executable,
            target_project_path,
        }
    }

    /// Find the best-matching window for a title pattern.
    ///
    /// Not-found is a normal outcome (`None`). Backend failures are
    /// logged and also degrade to `None`; refusing to act on a
    /// permission hiccup would stall the whole pipeline.
    pub fn resolve(&self, title_pattern: &str, project_hint: &str) -> Option<WindowHandle> {
        let regex = compile_title_pattern(title_pattern)?;
        let titles = match self.backend.list_window_titles() {
            Ok(titles) => titles,
            Err(e) => {
                warn!("window enumeration failed: {}", e);
                return None;
            }
        };

        let matches: Vec<String> = titles
            .into_iter()
            .filter(|t| regex.is_match(t))
            .collect();

        let project_name = self.target_project_name();
        select_best_title(&matches, project_hint, project_name.as_deref())
            .map(|title| WindowHandle { title })
    }

    /// Resolve and raise. False when the window is not there or the
    /// activation failed.
    pub fn focus(&self, title_pattern: &str, project_hint: &str) -> bool {
        let Some(handle) = self.resolve(title_pattern, project_hint) else {
            return false;
        };
        match self.backend.activate(&handle.title) {
            Ok(activated) => {
                debug!("focused window '{}'", handle.title);
                activated
            }
            Err(e) => {
                warn!("activation failed for '{}': {}", handle.title, e);
                false
            }
        }
    }

    /// Focus the target window, launching the application first when it
    /// is absent and auto-launch is allowed. Bounded wait: one focus
    /// attempt, then launch, then poll until `timeout`.
    pub async fn ensure(
        &self,
        title_pattern: &str,
        project_hint: &str,
        auto_launch: bool,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool {
        if self.focus(title_pattern, project_hint) {
            return true;
        }
        if !auto_launch {
            warn!(
                "window '{}' not found and auto-launch is disabled",
                title_pattern
            );
            return false;
        }
        if !self.launch(title_pattern, project_hint) {
            return false;
        }
        poll_until(
            || self.focus(title_pattern, project_hint),
            poll_interval,
            timeout,
        )
        .await
    }

    /// Issue a launch request for the application behind `app_hint`.
    ///
    /// True means the spawn was issued; whether a window actually
    /// appears is the caller's job to confirm (see [`Self::ensure`]).
    pub fn launch(&self, app_hint: &str, project_hint: &str) -> bool {
        let (program, mut args) = self.launcher_for(app_hint);
        // The configured project path wins; a per-command hint only
        // steers the launch when nothing is configured.
        match &self.target_project_path {
            Some(project) => args.push(project.to_string_lossy().to_string()),
            None if !project_hint.is_empty() => args.push(project_hint.to_string()),
            None => {}
        }
        match self.backend.spawn(&program, &args) {
            Ok(()) => {
                debug!("launch issued: {} {:?}", program, args);
                true
            }
            Err(e) => {
                warn!("launch failed: {}", e);
                false
            }
        }
    }

    /// Open a folder as a workspace via the editor's CLI launcher.
    pub fn open_folder(&self, folder: &str, new_window: bool) -> bool {
        let (program, _) = self.launcher_for("vscode");
        let flag = if new_window { "--new-window" } else { "--reuse-window" };
        let args = vec![flag.to_string(), folder.to_string()];
        match self.backend.spawn(&program, &args) {
            Ok(()) => true,
            Err(e) => {
                warn!("open-folder failed for '{}': {}", folder, e);
                false
            }
        }
    }

    /// Open a single file in the existing editor window.
    pub fn open_path(&self, file: &str) -> bool {
        let (program, _) = self.launcher_for("vscode");
        let args = vec!["--reuse-window".to_string(), file.to_string()];
        match self.backend.spawn(&program, &args) {
            Ok(()) => true,
            Err(e) => {
                warn!("open-file failed for '{}': {}", file, e);
                false
            }
        }
    }

    /// Title of the focused window, or None when the query fails.
    pub fn active_window_title(&self) -> Option<String> {
        match self.backend.active_window_title() {
            Ok(title) => Some(title),
            Err(e) => {
                warn!("active window query failed: {}", e);
                None
            }
        }
    }

    /// Whether any current window matches the pattern.
    pub fn app_running(&self, title_pattern: &str) -> bool {
        self.resolve(title_pattern, "").is_some()
    }

    fn target_project_name(&self) -> Option<String> {
        self.target_project_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }

    /// Classify the app hint and pick the launch mechanism: explicit
    /// executable when configured, else a CLI launcher on PATH.
    fn launcher_for(&self, app_hint: &str) -> (String, Vec<String>) {
        if let Some(exe) = &self.editor_executable {
            return (exe.to_string_lossy().to_string(), Vec::new());
        }
        let lower = app_hint.to_lowercase();
        if VSCODE_HINTS.iter().any(|h| lower.contains(h)) {
            (VSCODE_LAUNCHER.to_string(), Vec::new())
        } else {
            // Unknown app: best effort, try the hint itself as a
            // launcher name.
            (lower.split_whitespace().collect::<Vec<_>>().join("-"), Vec::new())
        }
    }
}

/// Compile a title pattern as case-insensitive substring-or-regex:
/// patterns carrying regex metacharacters are used as-is, everything
/// else is escaped and wrapped in `.*`.
fn compile_title_pattern(pattern: &str) -> Option<Regex> {
    let has_meta = pattern
        .chars()
        .any(|c| ".*+?[](){}|^$\\".contains(c));
    let source = if has_meta {
        pattern.to_string()
    } else {
        format!(".*{}.*", regex::escape(pattern))
    };
    match RegexBuilder::new(&source).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("invalid title pattern '{}': {}", pattern, e);
            // Degrade to a literal substring match.
            RegexBuilder::new(&format!(".*{}.*", regex::escape(pattern)))
                .case_insensitive(true)
                .build()
                .ok()
        }
    }
}

/// Pick one title among multiple matches: project hint containment
/// wins, then the configured target project name, then the first match
/// in enumeration order with a warning.
fn select_best_title(
    matches: &[String],
    project_hint: &str,
    project_name: Option<&str>,
) -> Option<String> {
    match matches {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            if !project_hint.is_empty() {
                let hint = project_hint.to_lowercase();
                if let Some(hit) = matches.iter().find(|t| t.to_lowercase().contains(&hint)) {
                    return Some(hit.clone());
                }
            }
            if let Some(name) = project_name {
                let name = name.to_lowercase();
                if let Some(hit) = matches.iter().find(|t| t.to_lowercase().contains(&name)) {
                    return Some(hit.clone());
                }
            }
            // Best effort beats refusing to act: take the first match
            // and let the operator see what was skipped.
            warn!(
                "ambiguous window match, taking first of: {:?}",
                matches
            );
            Some(matches[0].clone())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use std::sync::Mutex;

    /// In-memory window system for resolver and controller tests.
    #[derive(Default)]
    pub struct MockWindowBackend {
        pub titles: Mutex<Vec<String>>,
        pub active: Mutex<Option<String>>,
        pub activations: Mutex<Vec<String>>,
        pub spawns: Mutex<Vec<(String, Vec<String>)>>,
        /// Title appended to the window list when a spawn is issued,
        /// simulating the launched app's window appearing.
        pub spawn_creates: Mutex<Option<String>>,
        pub fail_listing: Mutex<bool>,
    }

    impl MockWindowBackend {
        pub fn with_titles(titles: &[&str]) -> Arc<Self> {
            let backend = Self::default();
            *backend.titles.lock().unwrap() =
                titles.iter().map(|t| t.to_string()).collect();
            Arc::new(backend)
        }

        pub fn spawn_count(&self) -> usize {
            self.spawns.lock().unwrap().len()
        }
    }

    impl WindowBackend for MockWindowBackend {
        fn list_window_titles(&self) -> Result<Vec<String>> {
            if *self.fail_listing.lock().unwrap() {
                return Err(AgentError::WindowBackend {
                    message: "permission denied".to_string(),
                });
            }
            Ok(self.titles.lock().unwrap().clone())
        }

        fn activate(&self, title: &str) -> Result<bool> {
            let exists = self
                .titles
                .lock()
                .unwrap()
                .iter()
                .any(|t| t == title);
            if exists {
                self.activations.lock().unwrap().push(title.to_string());
                *self.active.lock().unwrap() = Some(title.to_string());
            }
            Ok(exists)
        }

        fn active_window_title(&self) -> Result<String> {
            Ok(self
                .active
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()))
        }

        fn spawn(&self, program: &str, args: &[String]) -> Result<()> {
            self.spawns
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            if let Some(title) = self.spawn_creates.lock().unwrap().clone() {
                self.titles.lock().unwrap().push(title);
            }
            Ok(())
        }
    }

    fn resolver(backend: Arc<MockWindowBackend>) -> WindowResolver {
        WindowResolver::new(backend, None, None)
    }

    #[test]
    fn test_resolve_single_match() {
        let backend = MockWindowBackend::with_titles(&[
            "main.py - Visual Studio Code",
            "Terminal",
        ]);
        let r = resolver(backend);
        let handle = r.resolve("Visual Studio Code", "").unwrap();
        assert_eq!(handle.title, "main.py - Visual Studio Code");
    }

    #[test]
    fn test_resolve_case_insensitive_substring() {
        let backend = MockWindowBackend::with_titles(&["a.py - visual studio code"]);
        let r = resolver(backend);
        assert!(r.resolve("Visual Studio Code", "").is_some());
    }

    #[test]
    fn test_resolve_regex_pattern() {
        let backend = MockWindowBackend::with_titles(&["notes.txt - Mousepad"]);
        let r = resolver(backend);
        assert!(r.resolve(".*mousepad$", "").is_some());
        assert!(r.resolve("^mousepad$", "").is_none());
    }

    #[test]
    fn test_resolve_not_found_is_none() {
        let backend = MockWindowBackend::with_titles(&["Terminal"]);
        let r = resolver(backend);
        assert!(r.resolve("Visual Studio Code", "").is_none());
    }

    #[test]
    fn test_resolve_backend_failure_degrades_to_none() {
        let backend = MockWindowBackend::with_titles(&["x - App"]);
        *backend.fail_listing.lock().unwrap() = true;
        let r = resolver(backend);
        assert!(r.resolve("App", "").is_none());
    }

    #[test]
    fn test_disambiguation_by_project_hint() {
        let backend = MockWindowBackend::with_titles(&[
            "a.py - proj1 - App",
            "b.py - proj2 - App",
        ]);
        let r = resolver(backend);
        let handle = r.resolve("App", "proj2").unwrap();
        assert_eq!(handle.title, "b.py - proj2 - App");
    }

    #[test]
    fn test_disambiguation_hint_case_insensitive() {
        let backend = MockWindowBackend::with_titles(&[
            "a.py - Other-Project - App",
            "b.py - My-Project - App",
        ]);
        let r = resolver(backend);
        let handle = r.resolve("App", "my-project").unwrap();
        assert_eq!(handle.title, "b.py - My-Project - App");
    }

    #[test]
    fn test_disambiguation_falls_back_to_first() {
        let backend = MockWindowBackend::with_titles(&[
            "a.py - proj1 - App",
            "b.py - proj2 - App",
        ]);
        let r = resolver(backend);
        let handle = r.resolve("App", "").unwrap();
        assert_eq!(handle.title, "a.py - proj1 - App");

        let handle = r.resolve("App", "nonexistent").unwrap();
        assert_eq!(handle.title, "a.py - proj1 - App");
    }

    #[test]
    fn test_disambiguation_by_configured_project_name() {
        let backend = MockWindowBackend::with_titles(&[
            "a.py - scratch - App",
            "b.py - PythonWorkspace - App",
        ]);
        let r = WindowResolver::new(
            backend,
            None,
            Some(PathBuf::from("/home/user/PythonWorkspace")),
        );
        let handle = r.resolve("App", "").unwrap();
        assert_eq!(handle.title, "b.py - PythonWorkspace - App");
    }

    #[test]
    fn test_focus_activates_resolved_window() {
        let backend = MockWindowBackend::with_titles(&["main.py - App"]);
        let r = resolver(backend.clone());
        assert!(r.focus("App", ""));
        assert_eq!(
            backend.activations.lock().unwrap().as_slice(),
            &["main.py - App".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ensure_focus_first_success_never_launches() {
        let backend = MockWindowBackend::with_titles(&["main.py - Visual Studio Code"]);
        let r = resolver(backend.clone());
        let ok = r
            .ensure(
                "Visual Studio Code",
                "",
                true,
                Duration::from_secs(5),
                Duration::from_millis(100),
            )
            .await;
        assert!(ok);
        assert_eq!(backend.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_launches_once_then_polls_to_success() {
        let backend = MockWindowBackend::with_titles(&["Terminal"]);
        *backend.spawn_creates.lock().unwrap() =
            Some("Welcome - Visual Studio Code".to_string());
        let r = resolver(backend.clone());
        let ok = r
            .ensure(
                "Visual Studio Code",
                "",
                true,
                Duration::from_secs(5),
                Duration::from_millis(10),
            )
            .await;
        assert!(ok);
        assert_eq!(backend.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_without_auto_launch_fails_fast() {
        let backend = MockWindowBackend::with_titles(&["Terminal"]);
        let r = resolver(backend.clone());
        let ok = r
            .ensure(
                "Visual Studio Code",
                "",
                false,
                Duration::from_secs(5),
                Duration::from_millis(10),
            )
            .await;
        assert!(!ok);
        assert_eq!(backend.spawn_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_times_out_when_window_never_appears() {
        let backend = MockWindowBackend::with_titles(&["Terminal"]);
        let r = resolver(backend.clone());
        let ok = r
            .ensure(
                "Visual Studio Code",
                "",
                true,
                Duration::from_secs(2),
                Duration::from_millis(500),
            )
            .await;
        assert!(!ok);
        assert_eq!(backend.spawn_count(), 1);
    }

    #[test]
    fn test_launch_uses_configured_executable() {
        let backend = MockWindowBackend::with_titles(&[]);
        let r = WindowResolver::new(
            backend.clone(),
            Some(PathBuf::from("/opt/vscode/bin/code")),
            Some(PathBuf::from("/work/proj")),
        );
        assert!(r.launch("Visual Studio Code", ""));
        let spawns = backend.spawns.lock().unwrap();
        assert_eq!(spawns[0].0, "/opt/vscode/bin/code");
        assert_eq!(spawns[0].1, vec!["/work/proj".to_string()]);
    }

    #[test]
    fn test_launch_falls_back_to_cli_launcher() {
        let backend = MockWindowBackend::with_titles(&[]);
        let r = resolver(backend.clone());
        assert!(r.launch("Visual Studio Code", ""));
        let spawns = backend.spawns.lock().unwrap();
        assert_eq!(spawns[0].0, "code");
        assert!(spawns[0].1.is_empty());
    }

    #[test]
    fn test_launch_uses_project_hint_when_nothing_configured() {
        let backend = MockWindowBackend::with_titles(&[]);
        let r = resolver(backend.clone());
        assert!(r.launch("Visual Studio Code", "/work/other"));
        assert_eq!(
            backend.spawns.lock().unwrap()[0].1,
            vec!["/work/other".to_string()]
        );
    }

    #[test]
    fn test_launch_configured_path_wins_over_hint() {
        let backend = MockWindowBackend::with_titles(&[]);
        let r = WindowResolver::new(
            backend.clone(),
            None,
            Some(PathBuf::from("/work/proj")),
        );
        assert!(r.launch("Visual Studio Code", "/work/other"));
        assert_eq!(
            backend.spawns.lock().unwrap()[0].1,
            vec!["/work/proj".to_string()]
        );
    }

    #[test]
    fn test_open_folder_flags() {
        let backend = MockWindowBackend::with_titles(&[]);
        let r = resolver(backend.clone());
        assert!(r.open_folder("/work/proj", true));
        assert!(r.open_folder("/work/proj", false));
        let spawns = backend.spawns.lock().unwrap();
        assert_eq!(spawns[0].1[0], "--new-window");
        assert_eq!(spawns[1].1[0], "--reuse-window");
    }

    #[test]
    fn test_select_best_title_direct() {
        assert_eq!(select_best_title(&[], "", None), None);
        assert_eq!(
            select_best_title(&["only - App".to_string()], "", None),
            Some("only - App".to_string())
        );
    }
}
