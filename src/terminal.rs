// src/terminal.rs
//! Terminal widget model: command parsing and append-only history with recall.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::scan::SourceScope;

/// Display category of a history entry or output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(SourceScope),
    /// Empty list resets to all sources.
    Filter(Vec<String>),
    Priority(Option<String>),
    Sources,
    Cached,
    History,
    Help,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("{0}: missing argument")]
    MissingArgument(&'static str),
}

fn split_sources<'a>(args: impl Iterator<Item = &'a str>) -> Vec<String> {
    args.flat_map(|a| a.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(ParseError::Empty)?.to_ascii_lowercase();
        match head.as_str() {
            "scan" => Ok(Command::Scan(SourceScope::from_list(split_sources(words)))),
            "filter" => {
                let list = split_sources(words);
                if list.iter().any(|s| s == "all") {
                    Ok(Command::Filter(Vec::new()))
                } else {
                    Ok(Command::Filter(list))
                }
            }
            "priority" => match words.next().map(|w| w.to_ascii_lowercase()) {
                None => Err(ParseError::MissingArgument("priority")),
                Some(w) if w == "none" => Ok(Command::Priority(None)),
                Some(w) => Ok(Command::Priority(Some(w))),
            },
            "sources" => Ok(Command::Sources),
            "cached" => Ok(Command::Cached),
            "history" => Ok(Command::History),
            "help" => Ok(Command::Help),
            "clear" => Ok(Command::Clear),
            _ => Err(ParseError::Unknown(head)),
        }
    }
}

pub const HELP: &str = "\
scan [all|src ...]     stream trending items
filter [src ...|all]   move sources to the top
priority <src>|none    pin one source above everything
sources                show selected sources
cached                 show the demo cache
history                list previous commands
clear                  clear the screen";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub command: String,
    pub output: String,
    pub at: DateTime<Utc>,
    pub kind: OutputKind,
}

#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: Vec<HistoryEntry>,
    // None = editing a fresh line
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: impl Into<String>, output: impl Into<String>, kind: OutputKind) {
        self.entries.push(HistoryEntry {
            command: command.into(),
            output: output.into(),
            at: Utc::now(),
            kind,
        });
        self.cursor = None;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Arrow-up: step back to an older command.
    pub fn recall_previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = match self.cursor {
            None => self.entries.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(idx);
        Some(self.entries[idx].command.as_str())
    }

    /// Arrow-down: step forward; past the newest returns to an empty line.
    pub fn recall_next(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(i) if i + 1 >= self.entries.len() => {
                self.cursor = None;
                None
            }
            Some(i) => {
                self.cursor = Some(i + 1);
                Some(self.entries[i + 1].command.as_str())
            }
        }
    }
}
