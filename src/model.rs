//! Session → Window → Pane hierarchy records.
//!
//! These are snapshots of one listing query. Indices in particular are
//! recomputed by tmux on every structural change; re-fetch after any create
//! or kill instead of holding on to them.

use serde::Serialize;

use crate::record::{PaneRecord, WindowRecord};

/// A tmux session, addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub name: String,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A window inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    /// Opaque tmux window id (`@N`), stable across renames.
    pub id: String,
    /// Positional index; unstable across creates/kills.
    pub index: u32,
    pub active: bool,
    pub name: String,
    /// Owning session, kept only to compute the target address.
    #[serde(skip)]
    pub session: Session,
}

impl Window {
    pub(crate) fn from_record(record: WindowRecord, session: &Session) -> Self {
        Self {
            id: record.id,
            index: record.index,
            active: record.active,
            name: record.name,
            session: session.clone(),
        }
    }
}

/// A pane inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pane {
    /// Opaque tmux pane id (`%N`).
    pub id: String,
    pub index: u32,
    pub title: String,
    pub active: bool,
    /// PID of the shell the pane hosts directly.
    pub pid: u32,
    #[serde(skip)]
    pub window: Window,
}

impl Pane {
    pub(crate) fn from_record(record: PaneRecord, window: &Window) -> Self {
        Self {
            id: record.id,
            index: record.index,
            title: record.title,
            active: record.active,
            pid: record.pid,
            window: window.clone(),
        }
    }
}
