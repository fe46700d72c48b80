//! Command runner: executes tmux subcommands and captures stdout.
//!
//! [`CommandRunner`] is the seam every other module talks to, so tests can
//! substitute a scripted runner for the real binary.

use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{DecodeError, TmuxError};
use crate::target::Target;

const TIMEOUT_POLL: Duration = Duration::from_millis(10);

/// Runs one tmux subcommand with ordered arguments and returns its stdout.
pub trait CommandRunner {
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String, TmuxError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(subcommand, args)
    }
}

/// Run a subcommand scoped to `target` via `-t <address>`, using the
/// exact-match form of the address.
pub fn run_targeted<R, T>(
    runner: &R,
    target: &T,
    subcommand: &str,
    args: &[&str],
) -> Result<String, TmuxError>
where
    R: CommandRunner + ?Sized,
    T: Target + ?Sized,
{
    let address = target.exact_target();
    let mut full = Vec::with_capacity(args.len() + 2);
    full.push("-t");
    full.push(address.as_str());
    full.extend_from_slice(args);
    runner.run(subcommand, &full)
}

/// Real tmux executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    tmux_bin: String,
    socket_path: Option<String>,
    socket_name: Option<String>,
    timeout: Option<Duration>,
}

impl TmuxExecutor {
    pub fn new(tmux_bin: impl Into<String>) -> Self {
        Self {
            tmux_bin: tmux_bin.into(),
            socket_path: None,
            socket_name: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    /// Kill the tmux client and fail with [`TmuxError::Timeout`] if it runs
    /// longer than `timeout`. Without a timeout a hung binary hangs the caller.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self, subcommand: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.tmux_bin);
        // Socket path takes precedence over socket name
        if let Some(ref path) = self.socket_path {
            cmd.args(["-S", path]);
        } else if let Some(ref name) = self.socket_name {
            cmd.args(["-L", name]);
        }
        cmd.arg(subcommand).args(args);
        cmd
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl CommandRunner for TmuxExecutor {
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String, TmuxError> {
        debug!(subcommand, args = ?args, "running tmux");
        let mut cmd = self.command(subcommand, args);
        let output = match self.timeout {
            Some(limit) => output_with_deadline(&mut cmd, subcommand, limit)?,
            None => cmd.output().map_err(TmuxError::Spawn)?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed {
                command: subcommand.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|source| {
            DecodeError::NotUtf8 {
                command: subcommand.to_string(),
                source,
            }
            .into()
        })
    }
}

fn output_with_deadline(
    cmd: &mut Command,
    subcommand: &str,
    limit: Duration,
) -> Result<Output, TmuxError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(TmuxError::Spawn)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + limit;
    let status = loop {
        if let Some(status) = child.try_wait().map_err(TmuxError::Spawn)? {
            break status;
        }
        if Instant::now() >= deadline {
            abandon(&mut child);
            return Err(TmuxError::Timeout {
                command: subcommand.to_string(),
                after: limit,
            });
        }
        thread::sleep(TIMEOUT_POLL);
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
