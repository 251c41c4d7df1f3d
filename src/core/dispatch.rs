//! Command dispatcher - applies a decoded command through the window backend
//!
//! Window selection:
//!
//! - `setPosition` with `frontmostOnly`: the process's focused window only.
//! - `setPosition` with a non-empty `title`: the first window whose title is
//!   exactly `title`.
//! - `setPosition` otherwise: every window of the process.
//! - `focus`: the first window whose title contains `title` (case-sensitive).
//!
//! Calls for the same pid are serialized; different pids proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use super::command::{Command, Focus, SetPosition};
use super::status::StatusOutcome;
use crate::backend::{Geometry, WindowBackend, WindowRef};

/// Failures while applying a valid command
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("focus requires a non-empty title")]
    MissingTitle,

    #[error("process {0} has no focused window")]
    NoFocusedWindow(i32),

    #[error("no window of process {pid} matched {title:?}")]
    NoMatchingWindow { pid: i32, title: Option<String> },

    #[error("window backend failed: {0}")]
    Backend(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusOutcome {
        StatusOutcome::InternalError
    }
}

/// One async lock per pid with an operation in flight
#[derive(Default)]
struct PidLocks {
    locks: Mutex<HashMap<i32, Arc<tokio::sync::Mutex<()>>>>,
}

impl PidLocks {
    async fn lock(&self, pid: i32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds idle locks
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(pid).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Applies commands against a [`WindowBackend`]
pub struct Dispatcher {
    backend: Arc<dyn WindowBackend>,
    pid_locks: PidLocks,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn WindowBackend>) -> Self {
        Self {
            backend,
            pid_locks: PidLocks::default(),
        }
    }

    /// Apply `command`, holding the lock for its pid throughout
    pub async fn dispatch(&self, command: &Command) -> Result<(), DispatchError> {
        let _guard = self.pid_locks.lock(command.pid()).await;

        match command {
            Command::SetPosition(cmd) => self.set_position(cmd).await,
            Command::Focus(cmd) => self.focus(cmd).await,
        }
    }

    async fn set_position(&self, cmd: &SetPosition) -> Result<(), DispatchError> {
        let geometry = Geometry {
            x: cmd.x,
            y: cmd.y,
            width: cmd.width,
            height: cmd.height,
        };

        if cmd.frontmost_only {
            let window = self
                .backend
                .focused_window(cmd.pid)
                .await?
                .ok_or(DispatchError::NoFocusedWindow(cmd.pid))?;
            self.backend.set_geometry(&window, geometry).await?;
            tracing::debug!(pid = cmd.pid, ?window, ?geometry, "Positioned focused window");
            return Ok(());
        }

        let windows = self.backend.list_windows(cmd.pid).await?;
        let title = cmd.title.as_deref().filter(|t| !t.is_empty());

        let applied = match title {
            Some(title) => match self.find_window(&windows, |t| t == title).await {
                Some(window) => {
                    self.backend.set_geometry(window, geometry).await?;
                    1
                }
                None => 0,
            },
            None => self.apply_to_all(&windows, geometry).await,
        };

        if applied == 0 {
            return Err(DispatchError::NoMatchingWindow {
                pid: cmd.pid,
                title: cmd.title.clone(),
            });
        }

        tracing::debug!(pid = cmd.pid, applied, ?geometry, "Positioned windows");
        Ok(())
    }

    /// Set the geometry of every window, skipping ones that refuse it
    async fn apply_to_all(&self, windows: &[WindowRef], geometry: Geometry) -> usize {
        let mut applied = 0;
        for window in windows {
            match self.backend.set_geometry(window, geometry).await {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!(?window, "Failed to set window geometry: {}", e),
            }
        }
        applied
    }

    async fn focus(&self, cmd: &Focus) -> Result<(), DispatchError> {
        let title = cmd
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(DispatchError::MissingTitle)?;

        let windows = self.backend.list_windows(cmd.pid).await?;
        let window = self
            .find_window(&windows, |t| t.contains(title))
            .await
            .ok_or_else(|| DispatchError::NoMatchingWindow {
                pid: cmd.pid,
                title: cmd.title.clone(),
            })?;

        self.backend.set_main(window).await?;
        self.backend.raise(window).await?;
        tracing::debug!(pid = cmd.pid, ?window, "Focused window");
        Ok(())
    }

    /// First window, in enumeration order, whose title satisfies `matches`
    async fn find_window<'w>(
        &self,
        windows: &'w [WindowRef],
        matches: impl Fn(&str) -> bool,
    ) -> Option<&'w WindowRef> {
        for window in windows {
            match self.backend.window_title(window).await {
                Ok(title) if matches(&title) => return Some(window),
                Ok(_) => {}
                Err(e) => tracing::warn!(?window, "Failed to read window title: {}", e),
            }
        }
        None
    }
}
