//! Error types for tmux control.
//!
//! Every fallible operation in the library returns [`TmuxError`]. Absence of a
//! requested entity is always an explicit [`TmuxError::NotFound`], never an
//! empty result, so callers cannot mistake "missing" for "present but blank".

use std::fmt;
use std::num::ParseIntError;
use std::string::FromUtf8Error;
use std::time::Duration;

use thiserror::Error;

/// Kind of entity named in not-found / duplicate errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Session,
    Window,
    Pane,
    Process,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Session => "session",
            EntityKind::Window => "window",
            EntityKind::Pane => "pane",
            EntityKind::Process => "process",
        };
        f.write_str(label)
    }
}

/// A listing line that does not honor the fixed-field format contract.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{record} record: expected {expected} fields, got {got}")]
    FieldCount {
        record: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{record} record: field `{field}` is not a base-10 integer: {value:?}")]
    InvalidNumber {
        record: &'static str,
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("tmux {command} printed non-UTF-8 output")]
    NotUtf8 {
        command: String,
        #[source]
        source: FromUtf8Error,
    },
}

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux {command} failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to launch tmux: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("tmux {command} did not finish within {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("malformed tmux output: {0}")]
    Decode(#[from] DecodeError),

    #[error("{kind} {name:?} not found in {parent}")]
    NotFound {
        kind: EntityKind,
        name: String,
        parent: String,
    },

    #[error("{kind} {name:?} already exists in {parent}")]
    AlreadyExists {
        kind: EntityKind,
        name: String,
        parent: String,
    },

    #[error("no active pane in window {window:?}")]
    NoActivePane { window: String },

    #[error("no command configured")]
    NoCommand,

    #[error("could not recover PID for new process")]
    PidNotRecovered,

    #[error("nothing to restart: no live PID and no command line")]
    NothingToRestart,

    #[error("process with PID {0} already started")]
    AlreadyRunning(u32),

    #[error("no process with PID {0}")]
    NoSuchProcess(u32),

    #[error("failed to kill PID {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl TmuxError {
    /// True for [`TmuxError::NotFound`] of any entity kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TmuxError::NotFound { .. })
    }
}
