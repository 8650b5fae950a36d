//! Protocol Errors

use thiserror::Error;

/// Errors produced while decoding a wire line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Missing {0} field")]
    MissingField(&'static str),

    #[error("Invalid number format: '{0}'")]
    InvalidNumber(String),

    #[error("Invalid delay value: '{0}'")]
    InvalidDelay(String),

    #[error("Delay must not be negative, got {0}")]
    NegativeDelay(i64),

    #[error("Invalid node id: '{0}'")]
    InvalidNodeId(String),
}
