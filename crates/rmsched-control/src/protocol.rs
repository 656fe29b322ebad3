//! Line-oriented command protocol.
//!
//! ```text
//! R, <id>, <period ms>, <budget ms>.   register
//! Y, <id>.                             yield
//! D, <id>.                             deregister
//! S                                    status report
//! ```
//!
//! The comma after the command letter and the whitespace around fields are
//! optional. Every command except `S` must end with a `.`.

use rmsched::{RmScheduler, SchedError, TaskId, TaskInfo, YieldOutcome};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A parsed protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Register a periodic task.
    Register {
        /// Task to register.
        id: TaskId,
        /// Release period.
        period: Duration,
        /// Compute budget per period.
        budget: Duration,
    },
    /// End the task's current job.
    Yield(TaskId),
    /// Remove the task.
    Deregister(TaskId),
    /// Print the registered tasks.
    Status,
}

/// Reasons a line is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(char),

    #[error("command '{0}' must end with '.'")]
    MissingTerminator(char),

    #[error("command '{command}' takes {expected} field(s), found {found}")]
    FieldCount {
        command: char,
        expected: usize,
        found: usize,
    },

    #[error("command '{command}' has an empty field at position {position}")]
    EmptyField { command: char, position: usize },

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

impl Command {
    /// Parse one protocol line.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing the first problem found.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let mut chars = line.chars();
        let letter = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str().trim_start();
        let rest = rest.strip_prefix(',').unwrap_or(rest);

        if letter == 'S' {
            let rest = rest.trim();
            return if rest.is_empty() || rest == "." {
                Ok(Self::Status)
            } else {
                Err(ProtocolError::FieldCount {
                    command: letter,
                    expected: 0,
                    found: rest.trim_end_matches('.').split(',').count(),
                })
            };
        }
        if !matches!(letter, 'R' | 'Y' | 'D') {
            return Err(ProtocolError::UnknownCommand(letter));
        }

        let body = rest
            .trim_end()
            .strip_suffix('.')
            .ok_or(ProtocolError::MissingTerminator(letter))?;
        let fields: Vec<&str> = body.split(',').map(str::trim).collect();

        let expected = if letter == 'R' { 3 } else { 1 };
        if fields.len() != expected {
            return Err(ProtocolError::FieldCount {
                command: letter,
                expected,
                found: fields.len(),
            });
        }
        if let Some(position) = fields.iter().position(|f| f.is_empty()) {
            return Err(ProtocolError::EmptyField {
                command: letter,
                position: position + 1,
            });
        }

        let task = |raw: &str| parse_field(raw, "task id").map(TaskId::new);
        match (letter, fields.as_slice()) {
            ('R', [id, period, budget]) => Ok(Self::Register {
                id: task(*id)?,
                period: Duration::from_millis(parse_field(*period, "period")?),
                budget: Duration::from_millis(parse_field(*budget, "budget")?),
            }),
            ('Y', [id]) => Ok(Self::Yield(task(*id)?)),
            ('D', [id]) => Ok(Self::Deregister(task(*id)?)),
            _ => Err(ProtocolError::FieldCount {
                command: letter,
                expected,
                found: fields.len(),
            }),
        }
    }

    /// Task the command targets, if any.
    #[must_use]
    pub fn task(&self) -> Option<TaskId> {
        match self {
            Self::Register { id, .. } | Self::Yield(id) | Self::Deregister(id) => Some(*id),
            Self::Status => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { id, period, budget } => write!(
                f,
                "R, {}, {}, {}.",
                id,
                period.as_millis(),
                budget.as_millis()
            ),
            Self::Yield(id) => write!(f, "Y, {}.", id),
            Self::Deregister(id) => write!(f, "D, {}.", id),
            Self::Status => f.write_str("S"),
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_owned(),
    })
}

/// What applying a command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Reply {
    Registered(TaskId),
    Yielded(TaskId, YieldOutcome),
    Deregistered(TaskId),
    Status(Vec<TaskInfo>),
}

/// Drive `scheduler` with one command.
///
/// Yields go through [`RmScheduler::begin_yield`] so a single front-end
/// thread can serve every task.
///
/// # Errors
///
/// Propagates the scheduler's rejection of the command.
pub fn apply(scheduler: &RmScheduler, command: &Command) -> Result<Reply, SchedError> {
    match *command {
        Command::Register { id, period, budget } => {
            scheduler.register(id, period, budget)?;
            Ok(Reply::Registered(id))
        }
        Command::Yield(id) => {
            let outcome = scheduler.begin_yield(id)?;
            Ok(Reply::Yielded(id, outcome))
        }
        Command::Deregister(id) => {
            scheduler.deregister(id)?;
            Ok(Reply::Deregistered(id))
        }
        Command::Status => Ok(Reply::Status(scheduler.snapshot()?)),
    }
}
