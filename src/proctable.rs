//! OS process table access: enumerate, look up by PID, kill by PID.
//!
//! tmux's bookkeeping and the kernel's are two independent sources of truth.
//! Anything that claims a PID is alive gets re-checked here before it is
//! acted on.

use std::ffi::OsString;

use serde::Serialize;
use sysinfo::{
    Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, ThreadKind, UpdateKind,
};
use tracing::debug;

use crate::error::TmuxError;

/// One live OS process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: Option<u32>,
    /// Arguments joined with single spaces.
    pub cmdline: String,
}

pub trait ProcessTable {
    /// Every live process.
    fn processes(&self) -> Result<Vec<ProcessInfo>, TmuxError>;

    /// The process with this PID, or `None` if it is not running.
    fn lookup(&self, pid: u32) -> Result<Option<ProcessInfo>, TmuxError>;

    /// Send SIGKILL to the PID.
    fn kill(&self, pid: u32) -> Result<(), TmuxError>;

    fn parent_pid(&self, pid: u32) -> Result<Option<u32>, TmuxError> {
        self.lookup(pid)?
            .map(|p| p.ppid)
            .ok_or(TmuxError::NoSuchProcess(pid))
    }

    fn cmdline(&self, pid: u32) -> Result<String, TmuxError> {
        self.lookup(pid)?
            .map(|p| p.cmdline)
            .ok_or(TmuxError::NoSuchProcess(pid))
    }
}

impl<T: ProcessTable + ?Sized> ProcessTable for &T {
    fn processes(&self) -> Result<Vec<ProcessInfo>, TmuxError> {
        (**self).processes()
    }

    fn lookup(&self, pid: u32) -> Result<Option<ProcessInfo>, TmuxError> {
        (**self).lookup(pid)
    }

    fn kill(&self, pid: u32) -> Result<(), TmuxError> {
        (**self).kill(pid)
    }
}

/// Processes owned by a pane: the pane's shell itself and its direct
/// children. Grandchildren are not included.
pub fn owned_by<T: ProcessTable + ?Sized>(
    table: &T,
    shell_pid: u32,
) -> Result<Vec<ProcessInfo>, TmuxError> {
    Ok(table
        .processes()?
        .into_iter()
        .filter(|p| p.pid == shell_pid || p.ppid == Some(shell_pid))
        .collect())
}

/// Process table backed by the running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        Self
    }

    fn snapshot(which: ProcessesToUpdate<'_>) -> System {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            which,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );
        sys
    }
}

fn to_info(pid: Pid, process: &sysinfo::Process) -> Option<ProcessInfo> {
    // Zombies are already dead; they only wait to be reaped.
    if process.status() == ProcessStatus::Zombie {
        return None;
    }
    // Linux lists a process's threads as tasks parented to it; a TID is not a
    // child process and cannot be killed on its own.
    if matches!(process.thread_kind(), Some(ThreadKind::Userland)) {
        return None;
    }
    Some(ProcessInfo {
        pid: pid.as_u32(),
        ppid: process.parent().map(|p| p.as_u32()),
        cmdline: join_args(process.cmd()),
    })
}

fn join_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

impl ProcessTable for SystemProcessTable {
    fn processes(&self) -> Result<Vec<ProcessInfo>, TmuxError> {
        let sys = Self::snapshot(ProcessesToUpdate::All);
        Ok(sys
            .processes()
            .iter()
            .filter_map(|(pid, process)| to_info(*pid, process))
            .collect())
    }

    fn lookup(&self, pid: u32) -> Result<Option<ProcessInfo>, TmuxError> {
        // A full scan is what tags TIDs as tasks; refreshing `/proc/<tid>`
        // alone would report the thread as a process.
        let target = Pid::from_u32(pid);
        let sys = Self::snapshot(ProcessesToUpdate::All);
        Ok(sys.process(target).and_then(|process| to_info(target, process)))
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> Result<(), TmuxError> {
        let raw = i32::try_from(pid).map_err(|_| TmuxError::NoSuchProcess(pid))?;
        if raw <= 0 {
            return Err(TmuxError::NoSuchProcess(pid));
        }
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
        if rc == 0 {
            debug!(pid, "sent SIGKILL");
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Err(TmuxError::NoSuchProcess(pid));
        }
        Err(TmuxError::Kill { pid, source: err })
    }

    #[cfg(not(unix))]
    fn kill(&self, pid: u32) -> Result<(), TmuxError> {
        let target = Pid::from_u32(pid);
        let sys = Self::snapshot(ProcessesToUpdate::Some(&[target]));
        let process = sys.process(target).ok_or(TmuxError::NoSuchProcess(pid))?;
        if process.kill() {
            debug!(pid, "killed process");
            Ok(())
        } else {
            Err(TmuxError::Kill {
                pid,
                source: std::io::Error::other("kill was refused"),
            })
        }
    }
}
