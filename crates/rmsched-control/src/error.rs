//! Error types for the control front-end.

use thiserror::Error;

use crate::protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Protocol error on line {line}: {source}")]
    Protocol {
        line: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] rmsched::SchedError),
}
