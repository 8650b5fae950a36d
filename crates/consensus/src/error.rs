//! Coordination errors

use ledger_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

use crate::types::RunOutcome;

/// Failure talking to a single worker node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    Closed,

    #[error("malformed reply: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a run ended without a verified result.
///
/// The display text is what the client sees after `ERROR:`.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid greeting from client")]
    InvalidGreeting,

    #[error("Invalid input: {0}")]
    Input(#[from] ProtocolError),

    #[error("Client did not send a request within {0:?}")]
    ClientTimeout(Duration),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Client I/O error: {0}")]
    ClientIo(#[from] std::io::Error),

    #[error("Not enough nodes connected. Need at least {required}, got {joined}")]
    Quorum { joined: usize, required: usize },

    #[error("Not all nodes responded. Node {node_id} failed: {source}")]
    NodeUnresponsive { node_id: u32, source: NodeError },

    /// Per-node deadlines only cover the reply. A node that stops reading
    /// stalls the task write itself, which only the group timeout bounds.
    #[error("Nodes did not finish within {0:?}")]
    DispatchTimeout(Duration),

    #[error("Consensus failed. Only {agreed} out of {total} nodes agreed")]
    Consensus { agreed: usize, total: usize },
}

impl RunError {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            RunError::Consensus { .. } => RunOutcome::Failure,
            _ => RunOutcome::Aborted,
        }
    }
}

/// Invalid leader configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("min_nodes must be at least 1")]
    EmptyQuorum,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}
