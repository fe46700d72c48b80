//! Scripted doubles for the command runner and the process table.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::TmuxError;
use crate::executor::CommandRunner;
use crate::proctable::{ProcessInfo, ProcessTable};

#[derive(Debug, Clone)]
enum Reply {
    Ok(String),
    Fail(String),
}

/// Replays canned replies per subcommand and records every invocation.
///
/// Replies for a subcommand are consumed in order; the last one repeats.
/// Subcommands with no scripted reply return empty stdout.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: RefCell<HashMap<String, VecDeque<Reply>>>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, subcommand: &str, stdout: &str) -> Self {
        self.push(subcommand, Reply::Ok(stdout.to_string()));
        self
    }

    pub fn fail(self, subcommand: &str, stderr: &str) -> Self {
        self.push(subcommand, Reply::Fail(stderr.to_string()));
        self
    }

    fn push(&self, subcommand: &str, reply: Reply) {
        self.replies
            .borrow_mut()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }

    pub fn subcommands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(s, _)| s == subcommand)
            .count()
    }

    /// Arguments of the `n`th call to `subcommand`.
    pub fn args_of(&self, subcommand: &str, n: usize) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|(s, _)| s == subcommand)
            .nth(n)
            .map(|(_, args)| args.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String, TmuxError> {
        self.calls.borrow_mut().push((
            subcommand.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));

        let mut replies = self.replies.borrow_mut();
        let reply = match replies.get_mut(subcommand) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match reply {
            Some(Reply::Ok(out)) => Ok(out),
            Some(Reply::Fail(stderr)) => Err(TmuxError::CommandFailed {
                command: subcommand.to_string(),
                status: "exit status: 1".to_string(),
                stderr,
            }),
            None => Ok(String::new()),
        }
    }
}

/// In-memory process table. `kill` removes the entry.
#[derive(Debug, Default)]
pub struct FakeProcessTable {
    procs: RefCell<BTreeMap<u32, ProcessInfo>>,
    killed: RefCell<Vec<u32>>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, pid: u32, ppid: u32, cmdline: &str) -> Self {
        self.procs.borrow_mut().insert(
            pid,
            ProcessInfo {
                pid,
                ppid: Some(ppid),
                cmdline: cmdline.to_string(),
            },
        );
        self
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.borrow().clone()
    }
}

impl ProcessTable for FakeProcessTable {
    fn processes(&self) -> Result<Vec<ProcessInfo>, TmuxError> {
        Ok(self.procs.borrow().values().cloned().collect())
    }

    fn lookup(&self, pid: u32) -> Result<Option<ProcessInfo>, TmuxError> {
        Ok(self.procs.borrow().get(&pid).cloned())
    }

    fn kill(&self, pid: u32) -> Result<(), TmuxError> {
        if self.procs.borrow_mut().remove(&pid).is_none() {
            return Err(TmuxError::NoSuchProcess(pid));
        }
        self.killed.borrow_mut().push(pid);
        Ok(())
    }
}
