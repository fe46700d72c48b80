//! Starting, tracking and restarting processes inside panes.
//!
//! tmux has no "spawn and hand me the PID" primitive, so one is synthesized:
//!
//! ```text
//! IDLE       → command line typed into the pane, backgrounded with `&`
//! LAUNCHING  → `echo $!` typed so the shell prints the job's PID
//! PID_PENDING→ pane captured, scanned bottom-up for a digits-only line
//! RUNNING    → PID recovered (not re-verified against the OS here)
//! DEAD       → OS no longer lists the PID
//! → back to IDLE on restart
//! ```
//!
//! The exchange is best effort. A slow shell, a multi-line prompt, output
//! interleaved from another writer or a spawned command that prints a bare
//! number can all make the scrape return the wrong PID or none at all. A
//! failed scrape is never retried by re-sending keystrokes, since that could
//! start the command twice; only the capture is repeated until the poll
//! window closes.

pub mod scrape;

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::TmuxError;
use crate::executor::CommandRunner;
use crate::model::Pane;
use crate::proctable::{self, ProcessTable};
use crate::target::Target;
use crate::tmux::{CaptureOptions, Tmux};

/// Keys that submit the typed line.
const EXECUTE_LINE: &str = "Enter";
/// Shell snippet printing the PID of the last background job.
const ECHO_LAST_JOB_PID: &str = "echo $!";

/// A process started in (or discovered under) a pane.
///
/// `pid == 0` means nothing is known to be running. A non-zero PID is only a
/// claim; [`ProcessControl::status`] re-checks it against the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub pid: u32,
    pub cmdline: String,
    #[serde(skip)]
    pub pane: Pane,
}

impl Process {
    /// An idle record that [`ProcessControl::start`] can launch.
    pub fn new(pane: Pane, cmdline: impl Into<String>) -> Self {
        Self {
            pid: 0,
            cmdline: cmdline.into(),
            pane,
        }
    }
}

/// Liveness of a [`Process`] record as confirmed by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// No PID recorded.
    Idle,
    /// PID recorded and listed by the OS.
    Running,
    /// PID recorded but the OS no longer lists it.
    Dead,
}

/// Timing of the PID scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnTiming {
    /// Wait after typing before the first capture.
    pub settle: Duration,
    /// Give up re-capturing after this long past the first capture.
    pub poll_timeout: Duration,
    /// First back-off between captures; doubles up to `poll_max`.
    pub poll_initial: Duration,
    pub poll_max: Duration,
}

impl Default for SpawnTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(1000),
            poll_initial: Duration::from_millis(25),
            poll_max: Duration::from_millis(200),
        }
    }
}

/// Starts a command line in a pane and returns a handle carrying its PID.
///
/// The keystroke implementation is fragile; anything that can honor this
/// contract (e.g. a wrapper that writes its PID to a file) can replace it.
pub trait ProcessLauncher {
    fn launch(&self, pane: &Pane, cmdline: &str) -> Result<Process, TmuxError>;
}

impl<T: ProcessLauncher + ?Sized> ProcessLauncher for &T {
    fn launch(&self, pane: &Pane, cmdline: &str) -> Result<Process, TmuxError> {
        (**self).launch(pane, cmdline)
    }
}

/// Launcher that types the command into the pane and scrapes `echo $!`.
pub struct KeystrokeLauncher<'a, R> {
    tmux: &'a Tmux<R>,
    timing: SpawnTiming,
}

impl<'a, R: CommandRunner> KeystrokeLauncher<'a, R> {
    pub fn new(tmux: &'a Tmux<R>) -> Self {
        Self {
            tmux,
            timing: SpawnTiming::default(),
        }
    }

    #[must_use]
    pub fn with_timing(mut self, timing: SpawnTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Join `cmd` and `args` with spaces and launch the result.
    pub fn start_process(&self, pane: &Pane, cmd: &str, args: &[&str]) -> Result<Process, TmuxError> {
        let cmdline = std::iter::once(cmd)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.launch(pane, &cmdline)
    }

    fn scrape_pid(&self, pane: &Pane) -> Result<u32, TmuxError> {
        thread::sleep(self.timing.settle);

        let started = Instant::now();
        let mut backoff = self.timing.poll_initial;
        loop {
            let captured = self.tmux.capture_pane(pane, &CaptureOptions::default())?;
            if let Some(pid) = scrape::recover_pid(&captured)? {
                return Ok(pid);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timing.poll_timeout {
                return Err(TmuxError::PidNotRecovered);
            }
            let wait = backoff.min(self.timing.poll_timeout - elapsed);
            debug!(target = %pane.target(), wait_ms = wait.as_millis() as u64, "PID not on screen yet");
            thread::sleep(wait);
            backoff = (backoff * 2).min(self.timing.poll_max);
        }
    }
}

impl<R: CommandRunner> ProcessLauncher for KeystrokeLauncher<'_, R> {
    fn launch(&self, pane: &Pane, cmdline: &str) -> Result<Process, TmuxError> {
        if cmdline.trim().is_empty() {
            return Err(TmuxError::NoCommand);
        }

        // Background the job so the prompt comes back for `echo $!`.
        let cmdline = if requests_background(cmdline) {
            cmdline.to_string()
        } else {
            format!("{cmdline} &")
        };

        debug!(target = %pane.target(), cmdline = %cmdline, "launching");
        self.tmux.send_keys(pane, &[cmdline.as_str(), EXECUTE_LINE])?;
        self.tmux.send_keys(pane, &[ECHO_LAST_JOB_PID, EXECUTE_LINE])?;

        let pid = self.scrape_pid(pane)?;
        info!(target = %pane.target(), pid, cmdline = %cmdline, "process started");
        Ok(Process {
            pid,
            cmdline,
            pane: pane.clone(),
        })
    }
}

fn requests_background(cmdline: &str) -> bool {
    let trimmed = cmdline.trim_end();
    cmdline.split_whitespace().any(|token| token == "&")
        || (trimmed.ends_with('&') && !trimmed.ends_with("&&"))
}

/// Start, kill and restart [`Process`] records, checking every PID claim
/// against the OS process table.
pub struct ProcessControl<L, T> {
    launcher: L,
    table: T,
}

impl<L: ProcessLauncher, T: ProcessTable> ProcessControl<L, T> {
    pub fn new(launcher: L, table: T) -> Self {
        Self { launcher, table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Liveness of the record according to the OS.
    pub fn status(&self, process: &Process) -> Result<ProcessState, TmuxError> {
        if process.pid == 0 {
            return Ok(ProcessState::Idle);
        }
        Ok(match self.table.lookup(process.pid)? {
            Some(_) => ProcessState::Running,
            None => ProcessState::Dead,
        })
    }

    /// Launch the record's command line in its pane.
    ///
    /// Refuses when the recorded PID is still alive. A recorded PID that the
    /// OS no longer lists is cleared first. The record is replaced only once
    /// the new PID has been recovered.
    pub fn start(&self, process: &mut Process) -> Result<(), TmuxError> {
        if process.pid > 0 {
            if self.table.lookup(process.pid)?.is_some() {
                return Err(TmuxError::AlreadyRunning(process.pid));
            }
            debug!(pid = process.pid, "recorded PID is gone; clearing");
            process.pid = 0;
        }

        if process.cmdline.trim().is_empty() {
            return Err(TmuxError::NoCommand);
        }

        let launched = self.launcher.launch(&process.pane, &process.cmdline)?;
        *process = launched;
        Ok(())
    }

    /// Kill the recorded PID. Fails if the OS does not list it.
    pub fn kill(&self, process: &Process) -> Result<(), TmuxError> {
        if self.table.lookup(process.pid)?.is_none() {
            return Err(TmuxError::NoSuchProcess(process.pid));
        }
        self.table.kill(process.pid)?;
        info!(pid = process.pid, target = %process.pane.target(), "process killed");
        Ok(())
    }

    /// Kill the process if it is alive, then launch its command line again.
    ///
    /// A live PID's command line is re-read from the OS, which overrides the
    /// cached one. A recorded PID that is already gone is not an error. The
    /// record is left as it was unless the relaunch succeeds.
    pub fn restart(&self, process: &mut Process) -> Result<(), TmuxError> {
        let mut cmdline = process.cmdline.clone();
        if process.pid > 0 {
            match self.table.lookup(process.pid)? {
                Some(live) => {
                    self.table.kill(process.pid)?;
                    info!(pid = process.pid, "killed for restart");
                    cmdline = live.cmdline;
                }
                None => {
                    warn!(pid = process.pid, "process already gone; restarting anyway");
                }
            }
        }

        if cmdline.trim().is_empty() {
            return Err(TmuxError::NothingToRestart);
        }

        let launched = self.launcher.launch(&process.pane, &cmdline)?;
        *process = launched;
        Ok(())
    }

    /// The pane's shell and its direct children.
    pub fn pane_processes(&self, pane: &Pane) -> Result<Vec<Process>, TmuxError> {
        Ok(proctable::owned_by(&self.table, pane.pid)?
            .into_iter()
            .map(|info| Process {
                pid: info.pid,
                cmdline: info.cmdline,
                pane: pane.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Session, Window};
    use crate::test_support::{FakeProcessTable, ScriptedRunner};
    use std::cell::RefCell;

    fn pane() -> Pane {
        Pane {
            id: "%2".to_string(),
            index: 0,
            title: "host".to_string(),
            active: true,
            pid: 100,
            window: Window {
                id: "@1".to_string(),
                index: 1,
                active: true,
                name: "w1".to_string(),
                session: Session::new("S"),
            },
        }
    }

    fn instant() -> SpawnTiming {
        SpawnTiming {
            settle: Duration::ZERO,
            poll_timeout: Duration::ZERO,
            poll_initial: Duration::ZERO,
            poll_max: Duration::ZERO,
        }
    }

    /// Launcher double that hands out PIDs in sequence.
    #[derive(Default)]
    struct CountingLauncher {
        launched: RefCell<Vec<String>>,
    }

    impl ProcessLauncher for CountingLauncher {
        fn launch(&self, pane: &Pane, cmdline: &str) -> Result<Process, TmuxError> {
            let mut launched = self.launched.borrow_mut();
            launched.push(cmdline.to_string());
            Ok(Process {
                pid: 1000 + launched.len() as u32,
                cmdline: cmdline.to_string(),
                pane: pane.clone(),
            })
        }
    }

    struct FailingLauncher;

    /// Table that lists processes but refuses to kill them.
    struct UnkillableTable(FakeProcessTable);

    impl ProcessTable for UnkillableTable {
        fn processes(&self) -> Result<Vec<crate::proctable::ProcessInfo>, TmuxError> {
            self.0.processes()
        }

        fn lookup(&self, pid: u32) -> Result<Option<crate::proctable::ProcessInfo>, TmuxError> {
            self.0.lookup(pid)
        }

        fn kill(&self, pid: u32) -> Result<(), TmuxError> {
            Err(TmuxError::Kill {
                pid,
                source: std::io::ErrorKind::PermissionDenied.into(),
            })
        }
    }

    impl ProcessLauncher for FailingLauncher {
        fn launch(&self, _pane: &Pane, _cmdline: &str) -> Result<Process, TmuxError> {
            Err(TmuxError::PidNotRecovered)
        }
    }

    #[test]
    fn launch_types_command_then_echo_and_scrapes_pid() {
        let runner = ScriptedRunner::new().reply("capture-pane", "$ vim &\n[1] 4821\n$ echo $!\n4821\n$ \n");
        let tmux = Tmux::new(&runner);
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(instant());

        let process = launcher.launch(&pane(), "vim").unwrap();
        assert_eq!(process.pid, 4821);
        assert_eq!(process.cmdline, "vim &");
        assert_eq!(process.pane.id, "%2");

        assert_eq!(
            runner.subcommands(),
            ["send-keys", "send-keys", "capture-pane"]
        );
        assert_eq!(
            runner.args_of("send-keys", 0),
            ["-t", "=S:=w1.%2", "vim &", "Enter"]
        );
        assert_eq!(
            runner.args_of("send-keys", 1),
            ["-t", "=S:=w1.%2", "echo $!", "Enter"]
        );
        assert_eq!(runner.args_of("capture-pane", 0), ["-t", "=S:=w1.%2", "-p"]);
    }

    #[test]
    fn already_backgrounded_command_is_not_doubled() {
        let runner = ScriptedRunner::new().reply("capture-pane", "77\n");
        let tmux = Tmux::new(&runner);
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(instant());

        let process = launcher.start_process(&pane(), "sleep", &["30", "&"]).unwrap();
        assert_eq!(process.cmdline, "sleep 30 &");
        assert_eq!(runner.args_of("send-keys", 0)[2], "sleep 30 &");
    }

    #[test]
    fn echoed_zero_is_not_a_started_process() {
        let runner = ScriptedRunner::new().reply("capture-pane", "$ vim &\n$ echo $!\n0\n$ \n");
        let tmux = Tmux::new(&runner);
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(instant());

        let err = launcher.launch(&pane(), "vim").unwrap_err();
        assert!(matches!(err, TmuxError::PidNotRecovered));
        assert_eq!(runner.count("send-keys"), 2);
    }

    #[test]
    fn background_detection() {
        assert!(requests_background("sleep 5 &"));
        assert!(requests_background("sleep 5&"));
        assert!(requests_background("a & b"));
        assert!(!requests_background("make && make test"));
        assert!(!requests_background("vim"));
    }

    #[test]
    fn missing_pid_is_hard_failure_without_resend() {
        let runner = ScriptedRunner::new().reply("capture-pane", "$ vim &\n$ echo $!\n");
        let tmux = Tmux::new(&runner);
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(instant());

        let err = launcher.launch(&pane(), "vim").unwrap_err();
        assert!(matches!(err, TmuxError::PidNotRecovered));
        assert_eq!(runner.count("send-keys"), 2);
    }

    #[test]
    fn capture_is_polled_until_pid_appears() {
        let runner = ScriptedRunner::new()
            .reply("capture-pane", "$ vim &\n")
            .reply("capture-pane", "$ vim &\n$ echo $!\n")
            .reply("capture-pane", "$ vim &\n$ echo $!\n912\n");
        let tmux = Tmux::new(&runner);
        let timing = SpawnTiming {
            settle: Duration::ZERO,
            poll_timeout: Duration::from_secs(5),
            poll_initial: Duration::from_millis(1),
            poll_max: Duration::from_millis(2),
        };
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(timing);

        assert_eq!(launcher.launch(&pane(), "vim").unwrap().pid, 912);
        assert_eq!(runner.count("capture-pane"), 3);
        assert_eq!(runner.count("send-keys"), 2);
    }

    #[test]
    fn empty_command_never_touches_tmux() {
        let runner = ScriptedRunner::new();
        let tmux = Tmux::new(&runner);
        let launcher = KeystrokeLauncher::new(&tmux).with_timing(instant());
        let control = ProcessControl::new(launcher, FakeProcessTable::new());

        let mut process = Process::new(pane(), "");
        assert!(matches!(
            control.start(&mut process),
            Err(TmuxError::NoCommand)
        ));
        assert!(runner.calls().is_empty());

        let direct = KeystrokeLauncher::new(&tmux).launch(&pane(), "   ");
        assert!(matches!(direct, Err(TmuxError::NoCommand)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn start_replaces_record_wholesale() {
        let control = ProcessControl::new(CountingLauncher::default(), FakeProcessTable::new());
        let mut process = Process::new(pane(), "top");
        control.start(&mut process).unwrap();
        assert_eq!(process.pid, 1001);
        assert_eq!(process.cmdline, "top");
    }

    #[test]
    fn start_refuses_live_pid() {
        let table = FakeProcessTable::new().with(500, 100, "top");
        let control = ProcessControl::new(CountingLauncher::default(), table);
        let mut process = Process {
            pid: 500,
            cmdline: "top".to_string(),
            pane: pane(),
        };
        assert!(matches!(
            control.start(&mut process),
            Err(TmuxError::AlreadyRunning(500))
        ));
        assert_eq!(process.pid, 500);
    }

    #[test]
    fn start_clears_dead_pid_and_relaunches() {
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, FakeProcessTable::new());
        let mut process = Process {
            pid: 500,
            cmdline: "top".to_string(),
            pane: pane(),
        };
        control.start(&mut process).unwrap();
        assert_eq!(process.pid, 1001);
        assert_eq!(*launcher.launched.borrow(), ["top"]);
    }

    #[test]
    fn failed_start_keeps_previous_command() {
        let control = ProcessControl::new(FailingLauncher, FakeProcessTable::new());
        let mut process = Process::new(pane(), "top");
        assert!(control.start(&mut process).is_err());
        assert_eq!(process.pid, 0);
        assert_eq!(process.cmdline, "top");
    }

    #[test]
    fn restart_live_process_uses_os_cmdline() {
        let table = FakeProcessTable::new().with(500, 100, "vim notes.txt");
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, &table);
        let mut process = Process {
            pid: 500,
            cmdline: "vim &".to_string(),
            pane: pane(),
        };

        control.restart(&mut process).unwrap();
        assert_eq!(table.killed(), [500]);
        assert_eq!(*launcher.launched.borrow(), ["vim notes.txt"]);
        assert_eq!(process.pid, 1001);
    }

    #[test]
    fn failed_kill_leaves_record_untouched() {
        let table = UnkillableTable(FakeProcessTable::new().with(500, 100, "vim notes.txt"));
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, table);
        let mut process = Process {
            pid: 500,
            cmdline: "vim &".to_string(),
            pane: pane(),
        };

        let err = control.restart(&mut process).unwrap_err();
        assert!(matches!(err, TmuxError::Kill { pid: 500, .. }));
        assert_eq!(process.pid, 500);
        assert_eq!(process.cmdline, "vim &");
        assert!(launcher.launched.borrow().is_empty());
    }

    #[test]
    fn failed_relaunch_leaves_record_untouched() {
        let table = FakeProcessTable::new().with(500, 100, "vim notes.txt");
        let control = ProcessControl::new(FailingLauncher, &table);
        let mut process = Process {
            pid: 500,
            cmdline: "vim &".to_string(),
            pane: pane(),
        };

        assert!(control.restart(&mut process).is_err());
        assert_eq!(table.killed(), [500]);
        assert_eq!(process.pid, 500);
        assert_eq!(process.cmdline, "vim &");
    }

    #[test]
    fn restart_dead_process_skips_kill_and_relaunches() {
        let table = FakeProcessTable::new();
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, &table);
        let mut process = Process {
            pid: 500,
            cmdline: "vim &".to_string(),
            pane: pane(),
        };

        control.restart(&mut process).unwrap();
        assert!(table.killed().is_empty());
        assert_eq!(*launcher.launched.borrow(), ["vim &"]);
        assert_eq!(process.pid, 1001);
    }

    #[test]
    fn restart_with_nothing_known_fails() {
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, FakeProcessTable::new());

        let mut idle = Process::new(pane(), "");
        assert!(matches!(
            control.restart(&mut idle),
            Err(TmuxError::NothingToRestart)
        ));

        let mut dead_without_cmd = Process {
            pid: 500,
            cmdline: String::new(),
            pane: pane(),
        };
        assert!(matches!(
            control.restart(&mut dead_without_cmd),
            Err(TmuxError::NothingToRestart)
        ));
        assert!(launcher.launched.borrow().is_empty());
    }

    #[test]
    fn restart_idle_record_with_command_launches() {
        let launcher = CountingLauncher::default();
        let control = ProcessControl::new(&launcher, FakeProcessTable::new());
        let mut process = Process::new(pane(), "htop");
        control.restart(&mut process).unwrap();
        assert_eq!(process.pid, 1001);
    }

    #[test]
    fn kill_requires_live_pid() {
        let table = FakeProcessTable::new().with(500, 100, "top");
        let control = ProcessControl::new(CountingLauncher::default(), &table);
        let process = Process {
            pid: 500,
            cmdline: "top".to_string(),
            pane: pane(),
        };
        control.kill(&process).unwrap();
        assert_eq!(table.killed(), [500]);
        assert!(matches!(
            control.kill(&process),
            Err(TmuxError::NoSuchProcess(500))
        ));
    }

    #[test]
    fn status_reflects_os_table() {
        let table = FakeProcessTable::new().with(500, 100, "top");
        let control = ProcessControl::new(CountingLauncher::default(), &table);
        let mut process = Process::new(pane(), "top");
        assert_eq!(control.status(&process).unwrap(), ProcessState::Idle);
        process.pid = 500;
        assert_eq!(control.status(&process).unwrap(), ProcessState::Running);
        process.pid = 501;
        assert_eq!(control.status(&process).unwrap(), ProcessState::Dead);
    }

    #[test]
    fn pane_processes_are_shell_and_children() {
        let table = FakeProcessTable::new()
            .with(100, 1, "bash")
            .with(200, 100, "vim")
            .with(300, 200, "vim-child")
            .with(400, 1, "unrelated");
        let control = ProcessControl::new(CountingLauncher::default(), table);
        let mut pids: Vec<_> = control
            .pane_processes(&pane())
            .unwrap()
            .into_iter()
            .map(|p| p.pid)
            .collect();
        pids.sort_unstable();
        assert_eq!(pids, [100, 200]);
    }
}
