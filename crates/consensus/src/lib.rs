//! Ledger Consensus - leader-based summing with peer verification
//!
//! Architecture:
//! - A client hands the leader a list of numbers and a per-element work delay
//! - The leader waits for a quorum of worker nodes and splits the list among them
//! - Nodes return partial sums; a single silent node aborts the run
//! - Each node recomputes its ring neighbour's chunk and votes on the claimed sum
//! - A strict majority of agreeing votes releases the total to the client

pub mod client;
pub mod error;
pub mod leader;
pub mod partition;
pub mod session;
pub mod transport;
pub mod types;
pub mod verification;
pub mod worker;

#[cfg(test)]
mod tests;

pub use client::{ClientOutcome, ClientReport, ClientSession, DEFAULT_GREETING};
pub use error::{ConfigError, NodeError, RunError};
pub use leader::{Coordinator, CoordinatorBuilder};
pub use partition::{chunk_sum, partition};
pub use session::{NodeSession, Vote};
pub use types::*;
pub use verification::{VerificationEdge, VerificationReport, VerificationRound};
pub use worker::{WorkerNode, WorkerNodeBuilder, WorkerSummary};
