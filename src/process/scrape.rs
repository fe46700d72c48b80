//! PID recovery from captured pane text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::DecodeError;

// ASCII digits only; `\d` would also accept other Unicode digits.
static PID_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("PID line pattern is valid"));

/// The most recent line consisting solely of digits.
///
/// The scan runs from the bottom of the capture upward: the `echo $!` output
/// is expected to be the newest bare number on screen, so earlier numeric
/// program output is skipped. A bare number printed by the spawned command
/// itself after the echo would still be picked up instead.
pub fn last_pid_line(captured: &str) -> Option<&str> {
    captured.lines().rev().find(|line| PID_LINE.is_match(line))
}

/// Decode the PID from a capture, `Ok(None)` when no line qualifies.
///
/// `0` is never a process of ours (`$!` with no job prints nothing, and PID 0
/// is the scheduler), so it counts as not recovered.
pub fn recover_pid(captured: &str) -> Result<Option<u32>, DecodeError> {
    let Some(line) = last_pid_line(captured) else {
        return Ok(None);
    };
    line.parse::<u32>()
        .map(|pid| (pid != 0).then_some(pid))
        .map_err(|source| DecodeError::InvalidNumber {
            record: "pid echo",
            field: "pid",
            value: line.to_string(),
            source,
        })
}
