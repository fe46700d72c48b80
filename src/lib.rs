//! Programmatic control of a tmux server.
//!
//! Sessions, windows and panes are read from and written to the live server
//! through the `tmux` binary; nothing is cached. Processes are started inside
//! panes by typing into them, and their PIDs are recovered from the pane's
//! screen and then tracked against the OS process table.

pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod process;
pub mod proctable;
pub mod record;
pub mod target;
pub mod tmux;

#[cfg(test)]
mod test_support;

pub use error::{DecodeError, EntityKind, TmuxError};
pub use executor::{CommandRunner, TmuxExecutor};
pub use model::{Pane, Session, Window};
pub use process::{
    KeystrokeLauncher, Process, ProcessControl, ProcessLauncher, ProcessState, SpawnTiming,
};
pub use proctable::{ProcessInfo, ProcessTable, SystemProcessTable};
pub use target::Target;
pub use tmux::{CaptureBuffer, CaptureOptions, Orientation, SplitOptions, Tmux};
