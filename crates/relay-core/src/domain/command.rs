//! Admin command grammar.
//!
//! Admins type one command per line.  Keywords are case-insensitive, the line
//! is trimmed, and anything that matches no grammar is silently ignored.
//!
//! | Command | Grammar                     |
//! |---------|-----------------------------|
//! | List    | `ls` / `ls <substring>`     |
//! | Command | `cmd <targets> <payload>`   |
//! | All     | `cmdall <payload>`          |
//! | Drop    | `drop <id>`                 |
//!
//! `<targets>` is a comma-separated list of session IDs and MAC addresses.
//!
//! # Session ID notation
//!
//! An ID is hexadecimal when it starts with `0x` or contains any of the
//! letters `A`–`F`; otherwise it is decimal.  So `3E8` and `1000` name the
//! same session, while `1001` is always one thousand and one.

use super::mac::MacAddress;
use super::session::SessionId;

/// One element of a `cmd` target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(SessionId),
    Mac(MacAddress),
    /// Neither a MAC nor a number; reported back to the admins verbatim.
    Invalid(String),
}

impl Target {
    /// Classifies a single target string.  MAC notation wins over hex IDs.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(mac) = raw.parse::<MacAddress>() {
            return Target::Mac(mac);
        }
        match parse_session_id(raw) {
            Some(id) => Target::Id(id),
            None => Target::Invalid(raw.to_string()),
        }
    }
}

/// A parsed admin command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// List sessions whose listing line contains `filter` (empty = all).
    List { filter: String },
    /// Send `payload` to each target.
    Command { targets: Vec<Target>, payload: String },
    /// Send `payload` to every connected session.
    CommandAll { payload: String },
    /// Close a session.  `None` means the ID did not parse and the command
    /// is skipped without any output.
    Drop { id: Option<SessionId> },
    Unrecognized,
}

type Matcher = fn(&str, &str) -> Option<AdminCommand>;

/// Grammar matchers in priority order; the first to return `Some` wins.
const MATCHERS: [Matcher; 4] = [match_list, match_command, match_command_all, match_drop];

impl AdminCommand {
    /// Parses one admin line.  Never fails: unknown input is
    /// [`AdminCommand::Unrecognized`].
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return AdminCommand::Unrecognized;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim_start()),
            None => (line, ""),
        };
        let keyword = keyword.to_ascii_lowercase();

        MATCHERS
            .iter()
            .find_map(|matcher| matcher(&keyword, rest))
            .unwrap_or(AdminCommand::Unrecognized)
    }
}

fn match_list(keyword: &str, rest: &str) -> Option<AdminCommand> {
    (keyword == "ls").then(|| AdminCommand::List {
        filter: rest.to_string(),
    })
}

fn match_command(keyword: &str, rest: &str) -> Option<AdminCommand> {
    if keyword != "cmd" {
        return None;
    }
    let (targets, payload) = rest.split_once(char::is_whitespace)?;
    let payload = payload.trim_start();
    if payload.is_empty() {
        return None;
    }
    let targets = targets
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .map(Target::parse)
        .collect();
    Some(AdminCommand::Command {
        targets,
        payload: payload.to_string(),
    })
}

fn match_command_all(keyword: &str, rest: &str) -> Option<AdminCommand> {
    (keyword == "cmdall" && !rest.is_empty()).then(|| AdminCommand::CommandAll {
        payload: rest.to_string(),
    })
}

fn match_drop(keyword: &str, rest: &str) -> Option<AdminCommand> {
    if keyword != "drop" {
        return None;
    }
    let raw = rest.split_whitespace().next()?;
    Some(AdminCommand::Drop {
        id: parse_session_id(raw),
    })
}

/// Parses a session ID using decimal/hex auto-detection.
///
/// Returns `None` for anything that does not parse in the selected base.
pub fn parse_session_id(raw: &str) -> Option<SessionId> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return SessionId::from_str_radix(hex, 16).ok();
    }
    if raw.chars().any(|c| matches!(c, 'a'..='f' | 'A'..='F')) {
        return SessionId::from_str_radix(raw, 16).ok();
    }
    raw.parse().ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
