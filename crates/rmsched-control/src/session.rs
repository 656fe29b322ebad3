//! Drives a scheduler from a stream of protocol lines.

use rmsched::{RmScheduler, SchedulerConfig};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ControlError;
use crate::protocol::{Command, Reply, apply};
use crate::report::format_status;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Lines that parsed and were applied successfully.
    pub applied: usize,
    /// Lines that failed to parse.
    pub malformed: usize,
    /// Commands the scheduler rejected.
    pub rejected: usize,
}

/// Load a [`SchedulerConfig`] from a JSON file. Missing fields take defaults.
///
/// # Errors
///
/// Returns an IO or JSON error, or [`rmsched::SchedError::InvalidConfig`]
/// wrapped in [`ControlError::Scheduler`] if validation fails.
pub fn load_config(path: &Path) -> Result<SchedulerConfig, ControlError> {
    let text = std::fs::read_to_string(path)?;
    let config: SchedulerConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Apply every line of `input` to `scheduler`, writing status reports to `out`.
///
/// Malformed lines and rejected commands are logged and counted; the session
/// carries on. Blank lines and lines starting with `#` are skipped.
///
/// # Errors
///
/// Returns an error only if reading `input` or writing `out` fails.
pub fn run<R, W>(scheduler: &RmScheduler, input: R, mut out: W) -> Result<SessionSummary, ControlError>
where
    R: BufRead,
    W: Write,
{
    let mut summary = SessionSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let command = match Command::parse(trimmed) {
            Ok(command) => command,
            Err(source) => {
                let err = ControlError::Protocol {
                    line: index + 1,
                    source,
                };
                warn!("{}", err);
                summary.malformed += 1;
                continue;
            }
        };

        match apply(scheduler, &command) {
            Ok(Reply::Status(tasks)) => {
                out.write_all(format_status(&tasks).as_bytes())?;
                out.flush()?;
                summary.applied += 1;
            }
            Ok(reply) => {
                debug!("{} -> {:?}", command, reply);
                summary.applied += 1;
            }
            Err(e) => {
                warn!("{} rejected: {}", command, e);
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}
