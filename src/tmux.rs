//! Hierarchy store over the live tmux server.
//!
//! The tmux server is the source of truth and can be changed by anyone
//! between two calls, so nothing here is cached. Every create issues the
//! tmux command and then re-lists the parent to find the new entity, because
//! tmux's create commands return no structured data.
//!
//! A [`Tmux`] handle holds no mutable state of its own. The entity records
//! it hands out are plain snapshots; sharing them across threads and mutating
//! the same tmux entity concurrently is not synchronized in any way.

use tracing::{debug, info};

use crate::error::{EntityKind, TmuxError};
use crate::executor::{CommandRunner, TmuxExecutor, run_targeted};
use crate::model::{Pane, Session, Window};
use crate::record::{self, PANE_FORMAT, PANE_PID_FORMAT, SESSION_FORMAT, WINDOW_FORMAT};
use crate::target::Target;

/// Split direction for `split-window`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// New pane below the current one.
    #[default]
    Vertical,
    /// New pane to the right of the current one.
    Horizontal,
}

impl Orientation {
    pub fn flag(self) -> &'static str {
        match self {
            Orientation::Vertical => "-v",
            Orientation::Horizontal => "-h",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOptions {
    pub orientation: Orientation,
    /// Title for the new pane, applied with `select-pane -T`.
    pub title: Option<String>,
}

/// Where `capture-pane` writes the captured text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureBuffer {
    /// Return the text (`-p`).
    #[default]
    Stdout,
    /// Store it in a named paste buffer (`-b <name>`); nothing is returned.
    Named(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    pub buffer: CaptureBuffer,
    /// First line to capture (`-S`); negative values reach into history.
    pub start_line: Option<i64>,
    /// Last line to capture (`-E`).
    pub end_line: Option<i64>,
}

impl CaptureOptions {
    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match &self.buffer {
            CaptureBuffer::Stdout => args.push("-p".to_string()),
            CaptureBuffer::Named(name) => {
                args.push("-b".to_string());
                args.push(name.clone());
            }
        }
        if let Some(end) = self.end_line {
            args.push("-E".to_string());
            args.push(end.to_string());
        }
        if let Some(start) = self.start_line {
            args.push("-S".to_string());
            args.push(start.to_string());
        }
        args
    }
}

/// Entry point for every session/window/pane operation.
#[derive(Debug, Clone, Default)]
pub struct Tmux<R = TmuxExecutor> {
    runner: R,
}

impl<R: CommandRunner> Tmux<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    // ── sessions ────────────────────────────────────────────────────────

    /// All sessions on the server. A server that is not running has none.
    pub fn list_sessions(&self) -> Result<Vec<Session>, TmuxError> {
        let output = match self.runner.run("list-sessions", &["-F", SESSION_FORMAT]) {
            Ok(output) => output,
            Err(err) if is_no_server(&err) => {
                debug!("no tmux server running");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        Ok(record::records(&output)
            .map(|line| Session::new(record::parse_session(line)))
            .collect())
    }

    /// Scan sessions with a predicate returning `(matched, keep_going)`.
    ///
    /// Matches are collected in listing order; the scan stops as soon as the
    /// predicate returns `keep_going == false`, after recording that entry's
    /// match.
    pub fn find_sessions<F>(&self, mut predicate: F) -> Result<Vec<Session>, TmuxError>
    where
        F: FnMut(&Session) -> (bool, bool),
    {
        let mut found = Vec::new();
        for session in self.list_sessions()? {
            let (matched, keep_going) = predicate(&session);
            if matched {
                found.push(session);
            }
            if !keep_going {
                break;
            }
        }
        Ok(found)
    }

    /// Session by exact name.
    pub fn session(&self, name: &str) -> Result<Session, TmuxError> {
        self.lookup_session(name)?
            .ok_or_else(|| not_found(EntityKind::Session, name, "tmux server".to_string()))
    }

    fn lookup_session(&self, name: &str) -> Result<Option<Session>, TmuxError> {
        let mut found = self.find_sessions(|s| {
            let hit = s.name == name;
            (hit, !hit)
        })?;
        Ok(found.pop())
    }

    /// Create a detached session. Fails before issuing `new-session` when a
    /// session with this name already exists.
    pub fn new_session(&self, name: &str) -> Result<Session, TmuxError> {
        if self.lookup_session(name)?.is_some() {
            return Err(TmuxError::AlreadyExists {
                kind: EntityKind::Session,
                name: name.to_string(),
                parent: "tmux server".to_string(),
            });
        }

        self.runner.run("new-session", &["-d", "-s", name])?;
        let session = self.session(name)?;
        info!(session = %session.name, "tmux session created");
        Ok(session)
    }

    pub fn kill_session(&self, session: &Session) -> Result<(), TmuxError> {
        run_targeted(&self.runner, session, "kill-session", &[])?;
        info!(session = %session.name, "tmux session killed");
        Ok(())
    }

    /// Shell PIDs of every pane in every window of the session.
    pub fn session_pane_pids(&self, session: &Session) -> Result<Vec<u32>, TmuxError> {
        let output = run_targeted(
            &self.runner,
            session,
            "list-panes",
            &["-s", "-F", PANE_PID_FORMAT],
        )?;
        record::records(&output)
            .map(|line| record::parse_pid(line).map_err(TmuxError::from))
            .collect()
    }

    // ── windows ─────────────────────────────────────────────────────────

    pub fn windows(&self, session: &Session) -> Result<Vec<Window>, TmuxError> {
        let output = match run_targeted(&self.runner, session, "list-windows", &["-F", WINDOW_FORMAT]) {
            Ok(output) => output,
            Err(err @ TmuxError::CommandFailed { .. }) => {
                if self.lookup_session(&session.name)?.is_none() {
                    return Err(not_found(
                        EntityKind::Session,
                        &session.name,
                        "tmux server".to_string(),
                    ));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let mut windows = Vec::new();
        for line in record::records(&output) {
            let rec = record::parse_window(line)?;
            windows.push(Window::from_record(rec, session));
        }
        debug!(session = %session.name, count = windows.len(), "listed windows");
        Ok(windows)
    }

    /// Window by name within the session.
    pub fn window(&self, session: &Session, name: &str) -> Result<Window, TmuxError> {
        self.windows(session)?
            .into_iter()
            .find(|w| w.name == name)
            .ok_or_else(|| not_found(EntityKind::Window, name, describe_session(session)))
    }

    /// Create a window in the session. Fails before issuing `new-window` when
    /// the session already has a window with this name.
    pub fn new_window(&self, session: &Session, name: &str) -> Result<Window, TmuxError> {
        match self.window(session, name) {
            Ok(_) => {
                return Err(TmuxError::AlreadyExists {
                    kind: EntityKind::Window,
                    name: name.to_string(),
                    parent: describe_session(session),
                });
            }
            Err(TmuxError::NotFound {
                kind: EntityKind::Window,
                ..
            }) => {}
            Err(err) => return Err(err),
        }

        run_targeted(&self.runner, session, "new-window", &["-n", name])?;
        let window = self.window(session, name)?;
        info!(session = %session.name, window = %window.name, id = %window.id, "tmux window created");
        Ok(window)
    }

    pub fn kill_window(&self, window: &Window) -> Result<(), TmuxError> {
        run_targeted(&self.runner, window, "kill-window", &[])?;
        info!(target = %window.target(), "tmux window killed");
        Ok(())
    }

    pub fn kill_window_by_name(&self, session: &Session, name: &str) -> Result<(), TmuxError> {
        let window = self.window(session, name)?;
        self.kill_window(&window)
    }

    // ── panes ───────────────────────────────────────────────────────────

    /// Panes of the window. A window with no panes does not exist in tmux, so
    /// listing a window that has disappeared is a not-found error.
    pub fn panes(&self, window: &Window) -> Result<Vec<Pane>, TmuxError> {
        let output = match run_targeted(&self.runner, window, "list-panes", &["-F", PANE_FORMAT]) {
            Ok(output) => output,
            Err(err @ TmuxError::CommandFailed { .. }) => {
                if self.window_gone(window)? {
                    return Err(not_found(
                        EntityKind::Window,
                        &window.name,
                        describe_session(&window.session),
                    ));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let mut panes = Vec::new();
        for line in record::records(&output) {
            let rec = record::parse_pane(line)?;
            panes.push(Pane::from_record(rec, window));
        }
        debug!(target = %window.target(), count = panes.len(), "listed panes");
        Ok(panes)
    }

    fn window_gone(&self, window: &Window) -> Result<bool, TmuxError> {
        match self.windows(&window.session) {
            Ok(windows) => Ok(!windows.iter().any(|w| w.name == window.name)),
            Err(TmuxError::NotFound {
                kind: EntityKind::Session,
                ..
            }) => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Pane by id within the window.
    pub fn pane(&self, window: &Window, id: &str) -> Result<Pane, TmuxError> {
        self.panes(window)?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(EntityKind::Pane, id, describe_window(window)))
    }

    pub fn active_pane(&self, window: &Window) -> Result<Pane, TmuxError> {
        self.panes(window)?
            .into_iter()
            .find(|p| p.active)
            .ok_or_else(|| TmuxError::NoActivePane {
                window: window.target(),
            })
    }

    /// Pane by id, or the window's active pane when `id` is `None`.
    pub fn resolve_pane(&self, window: &Window, id: Option<&str>) -> Result<Pane, TmuxError> {
        match id {
            Some(id) => self.pane(window, id),
            None => self.active_pane(window),
        }
    }

    /// Split `pane_id` (or the active pane) and return the new pane.
    pub fn split_window(
        &self,
        window: &Window,
        pane_id: Option<&str>,
        opts: &SplitOptions,
    ) -> Result<Pane, TmuxError> {
        let pane = self.resolve_pane(window, pane_id)?;
        self.split_pane(&pane, opts)
    }

    /// Split the pane. tmux focuses the new pane, so it is read back as the
    /// window's active pane.
    pub fn split_pane(&self, pane: &Pane, opts: &SplitOptions) -> Result<Pane, TmuxError> {
        run_targeted(&self.runner, pane, "split-window", &[opts.orientation.flag()])?;
        let created = self.active_pane(&pane.window)?;

        let created = match opts.title.as_deref() {
            Some(title) => {
                run_targeted(&self.runner, &created, "select-pane", &["-T", title])?;
                self.pane(&pane.window, &created.id)?
            }
            None => created,
        };

        info!(from = %pane.target(), pane = %created.id, "tmux pane split");
        Ok(created)
    }

    pub fn kill_pane(&self, pane: &Pane) -> Result<(), TmuxError> {
        run_targeted(&self.runner, pane, "kill-pane", &[])?;
        info!(target = %pane.target(), "tmux pane killed");
        Ok(())
    }

    /// Send tmux key names to the pane, e.g. `["ls -l", "Enter"]`.
    pub fn send_keys(&self, pane: &Pane, keys: &[&str]) -> Result<String, TmuxError> {
        debug!(target = %pane.target(), keys = ?keys, "sending keys");
        run_targeted(&self.runner, pane, "send-keys", keys)
    }

    /// Capture pane text. Only [`CaptureBuffer::Stdout`] returns content.
    pub fn capture_pane(&self, pane: &Pane, opts: &CaptureOptions) -> Result<String, TmuxError> {
        let args = opts.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_targeted(&self.runner, pane, "capture-pane", &args)
    }
}

fn is_no_server(err: &TmuxError) -> bool {
    match err {
        TmuxError::CommandFailed { stderr, .. } => {
            stderr.contains("no server running") || stderr.contains("error connecting to")
        }
        _ => false,
    }
}

fn not_found(kind: EntityKind, name: &str, parent: String) -> TmuxError {
    TmuxError::NotFound {
        kind,
        name: name.to_string(),
        parent,
    }
}

fn describe_session(session: &Session) -> String {
    format!("session {:?}", session.name)
}

fn describe_window(window: &Window) -> String {
    format!("window {:?}", window.target())
}
