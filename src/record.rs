//! Strict decoder for tmux listing lines.
//!
//! Each listing command is issued with a `-F` format that emits one
//! single-quoted, space-separated record per line. The decoder strips exactly
//! one quote from each end, splits on single spaces and requires the exact
//! field count for the record type. Extra whitespace, embedded spaces in names
//! and non-numeric numbers are rejected rather than guessed at.

use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::DecodeError;

/// `list-sessions` format: session name.
pub const SESSION_FORMAT: &str = "'#{session_name}'";
/// `list-windows` format: window id, index, active flag, name.
pub const WINDOW_FORMAT: &str = "'#{window_id} #I #{window_active} #W'";
/// `list-panes` format: pane id, index, title, active flag, shell pid.
pub const PANE_FORMAT: &str = "'#D #P #T #{pane_active} #{pane_pid}'";
/// `list-panes` format used for session-wide pid listings.
pub const PANE_PID_FORMAT: &str = "'#{pane_pid}'";

const WINDOW_FIELDS: usize = 4;
const PANE_FIELDS: usize = 5;

/// Decoded window listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub id: String,
    pub index: u32,
    pub active: bool,
    pub name: String,
}

/// Decoded pane listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneRecord {
    pub id: String,
    pub index: u32,
    pub title: String,
    pub active: bool,
    pub pid: u32,
}

/// Remove one leading and one trailing single quote, if present.
pub fn strip_quotes(line: &str) -> &str {
    let line = line.strip_prefix('\'').unwrap_or(line);
    line.strip_suffix('\'').unwrap_or(line)
}

/// Non-empty lines of a listing, in order.
pub fn records(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| !line.is_empty())
}

pub fn parse_session(line: &str) -> String {
    strip_quotes(line).to_string()
}

pub fn parse_window(line: &str) -> Result<WindowRecord, DecodeError> {
    let fields = split_fields(line, "window", WINDOW_FIELDS)?;
    Ok(WindowRecord {
        id: fields[0].to_string(),
        index: parse_number("window", "index", fields[1])?,
        active: parse_flag(fields[2]),
        name: fields[3].to_string(),
    })
}

pub fn parse_pane(line: &str) -> Result<PaneRecord, DecodeError> {
    let fields = split_fields(line, "pane", PANE_FIELDS)?;
    Ok(PaneRecord {
        id: fields[0].to_string(),
        index: parse_number("pane", "index", fields[1])?,
        title: fields[2].to_string(),
        active: parse_flag(fields[3]),
        pid: parse_number("pane", "pid", fields[4])?,
    })
}

pub fn parse_pid(line: &str) -> Result<u32, DecodeError> {
    parse_number("pane pid", "pid", strip_quotes(line))
}

fn split_fields<'a>(
    line: &'a str,
    record: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, DecodeError> {
    let fields: Vec<&str> = strip_quotes(line).split(' ').collect();
    if fields.len() != expected {
        return Err(DecodeError::FieldCount {
            record,
            expected,
            got: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_number<T>(record: &'static str, field: &'static str, value: &str) -> Result<T, DecodeError>
where
    T: FromStr<Err = ParseIntError>,
{
    value.parse().map_err(|source| DecodeError::InvalidNumber {
        record,
        field,
        value: value.to_string(),
        source,
    })
}

// "1" is active; anything else is not.
fn parse_flag(value: &str) -> bool {
    value == "1"
}
