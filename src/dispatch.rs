// src/dispatch.rs - Fired gesture → one OS command
use crate::actions::{ActionCommand, ActionTable};
use crate::classifier::Gesture;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{command} is not supported on this platform")]
    Unsupported { command: ActionCommand },
    #[error("none of the tools for {command} are installed ({tried})")]
    ToolNotFound { command: ActionCommand, tried: String },
    #[error("`{program}` exited with {status}")]
    CommandFailed { program: String, status: String },
    #[error("input injection failed: {0}")]
    Input(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Receives fired gestures. Must run the associated command at most once per
/// call.
pub trait ActionDispatcher: Send {
    fn execute(&mut self, gesture: Gesture) -> bool;
}

pub trait CommandRunner: Send {
    fn run(&mut self, command: ActionCommand) -> Result<(), DispatchError>;
}

pub struct SystemController<R: CommandRunner> {
    actions: ActionTable,
    runner: R,
}

impl<R: CommandRunner> SystemController<R> {
    pub fn new(actions: ActionTable, runner: R) -> Self {
        Self { actions, runner }
    }
}

impl<R: CommandRunner> ActionDispatcher for SystemController<R> {
    fn execute(&mut self, gesture: Gesture) -> bool {
        let Some(action) = self.actions.get(gesture) else {
            warn!(%gesture, "no action mapped for gesture");
            return false;
        };

        info!(%gesture, command = %action.command, "executing action: {}", action.description);
        match self.runner.run(action.command) {
            Ok(()) => {
                info!(%gesture, "action completed: {}", action.description);
                true
            }
            Err(e) => {
                error!(%gesture, command = %action.command, error = %e, "action failed");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActionSettings {
    pub browser_url: String,
    /// Defaults to `<data dir>/screenshots` when unset.
    pub screenshots_dir: Option<PathBuf>,
    /// Log fired commands instead of running them. Always on while the
    /// landmark simulation drives the pipeline.
    pub dry_run: bool,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            browser_url: "https://www.google.com".to_string(),
            screenshots_dir: None,
            dry_run: false,
        }
    }
}

/// Executes commands against the desktop: keyboard injection through enigo,
/// everything else through platform tools.
pub struct OsCommandRunner {
    browser_url: String,
    screenshots_dir: PathBuf,
}

impl OsCommandRunner {
    pub fn new(browser_url: impl Into<String>, screenshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            browser_url: browser_url.into(),
            screenshots_dir: screenshots_dir.into(),
        }
    }

    fn open_browser(&self) -> Result<(), DispatchError> {
        let url = self.browser_url.as_str();
        let candidates: Vec<(&str, Vec<&str>)> = if cfg!(target_os = "windows") {
            vec![("cmd", vec!["/C", "start", "", url])]
        } else if cfg!(target_os = "macos") {
            vec![("open", vec![url])]
        } else {
            vec![("xdg-open", vec![url]), ("sensible-browser", vec![url])]
        };
        run_first_available(ActionCommand::OpenBrowser, &candidates)
    }

    fn close_active_window(&self) -> Result<(), DispatchError> {
        if cfg!(target_os = "macos") {
            key_chord(&[Key::Meta], Key::Unicode('w'))
        } else {
            key_chord(&[Key::Alt], Key::F4)
        }
    }

    fn refresh_page(&self) -> Result<(), DispatchError> {
        if cfg!(target_os = "macos") {
            key_chord(&[Key::Meta], Key::Unicode('r'))
        } else {
            key_chord(&[], Key::F5)
        }
    }

    #[cfg(target_os = "windows")]
    fn volume_up(&self) -> Result<(), DispatchError> {
        // Two steps so the change is noticeable
        key_chord(&[], Key::VolumeUp)?;
        key_chord(&[], Key::VolumeUp)
    }

    #[cfg(not(target_os = "windows"))]
    fn volume_up(&self) -> Result<(), DispatchError> {
        let candidates: Vec<(&str, Vec<&str>)> = if cfg!(target_os = "macos") {
            vec![(
                "osascript",
                vec![
                    "-e",
                    "set volume output volume ((output volume of (get volume settings)) + 10)",
                ],
            )]
        } else {
            vec![
                ("pactl", vec!["set-sink-volume", "@DEFAULT_SINK@", "+10%"]),
                ("amixer", vec!["-q", "sset", "Master", "10%+"]),
            ]
        };
        run_first_available(ActionCommand::VolumeUp, &candidates)
    }

    fn take_screenshot(&self) -> Result<(), DispatchError> {
        if cfg!(target_os = "windows") {
            return Err(DispatchError::Unsupported {
                command: ActionCommand::Screenshot,
            });
        }

        std::fs::create_dir_all(&self.screenshots_dir)?;
        let path = screenshot_path(&self.screenshots_dir);
        let target = path.to_string_lossy().into_owned();
        let target = target.as_str();

        let candidates: Vec<(&str, Vec<&str>)> = if cfg!(target_os = "macos") {
            vec![("screencapture", vec!["-x", target])]
        } else {
            vec![
                ("gnome-screenshot", vec!["-f", target]),
                ("grim", vec![target]),
                ("scrot", vec![target]),
                ("import", vec!["-window", "root", target]),
            ]
        };
        run_first_available(ActionCommand::Screenshot, &candidates)?;
        info!(path = %path.display(), "screenshot saved");
        Ok(())
    }
}

impl CommandRunner for OsCommandRunner {
    fn run(&mut self, command: ActionCommand) -> Result<(), DispatchError> {
        match command {
            ActionCommand::OpenBrowser => self.open_browser(),
            ActionCommand::CloseActiveWindow => self.close_active_window(),
            ActionCommand::VolumeUp => self.volume_up(),
            ActionCommand::Screenshot => self.take_screenshot(),
            ActionCommand::PageRefresh => self.refresh_page(),
        }
    }
}

/// Accepts every command without touching the desktop.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&mut self, command: ActionCommand) -> Result<(), DispatchError> {
        info!(%command, "dry run, command not executed");
        Ok(())
    }
}

pub fn screenshot_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!("capture_{}_{}.png", stamp, &suffix[..8]))
}

/// Runs the first installed program of `candidates` exactly once. Programs
/// that are not installed are skipped; a program that runs and fails is not
/// followed by the next candidate.
fn run_first_available(
    command: ActionCommand,
    candidates: &[(&str, Vec<&str>)],
) -> Result<(), DispatchError> {
    for (program, args) in candidates {
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {
                debug!(program, "command succeeded");
                return Ok(());
            }
            Ok(status) => {
                return Err(DispatchError::CommandFailed {
                    program: program.to_string(),
                    status: status.to_string(),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(program, "tool not installed, trying next");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(DispatchError::ToolNotFound {
        command,
        tried: candidates
            .iter()
            .map(|(program, _)| *program)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn key_chord(modifiers: &[Key], key: Key) -> Result<(), DispatchError> {
    let mut enigo =
        Enigo::new(&Settings::default()).map_err(|e| DispatchError::Input(e.to_string()))?;
    let input = |e: enigo::InputError| DispatchError::Input(e.to_string());

    for modifier in modifiers {
        enigo.key(*modifier, Direction::Press).map_err(input)?;
    }
    let clicked = enigo.key(key, Direction::Click).map_err(input);
    // Release modifiers even when the click failed
    for modifier in modifiers.iter().rev() {
        enigo.key(*modifier, Direction::Release).map_err(input)?;
    }
    clicked
}
