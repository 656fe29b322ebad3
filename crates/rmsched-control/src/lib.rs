//! Text command front-end for the `rmsched` rate-monotonic scheduler.
//!
//! Processes talk to the scheduler through one-line commands (`R`, `Y`, `D`)
//! and read the registered set back as a status report (`S`).

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod protocol;
pub mod report;
pub mod session;

pub use error::ControlError;
pub use protocol::{Command, ProtocolError, Reply, apply};
pub use report::format_status;
pub use session::{SessionSummary, load_config, run};
