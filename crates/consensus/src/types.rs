//! Core types for task coordination

use crate::client::DEFAULT_GREETING;
use crate::error::ConfigError;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Default leader port
pub const DEFAULT_PORT: u16 = 8000;

/// Nodes required before a task is dispatched
pub const MIN_NODES: usize = 3;

/// How long the leader waits for the quorum to assemble
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(90);

/// Deadline for a node's partial sum
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for a node's verification vote
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for each line the client must send (greeting, workload)
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack on top of the response timeout for the whole dispatch group
pub const DISPATCH_GRACE: Duration = Duration::from_secs(1);

/// A client's workload. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Numbers to sum, in order
    pub numbers: Vec<i64>,
    /// Simulated processing time per element
    pub delay: Duration,
}

impl Task {
    pub fn new(numbers: Vec<i64>, delay: Duration) -> Self {
        Self { numbers, delay }
    }
}

/// Agreement tally of a verification round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Edges that answered YES
    pub agreed: usize,
    /// Nodes taking part in the round
    pub total: usize,
}

impl Decision {
    pub fn new(agreed: usize, total: usize) -> Self {
        Self { agreed, total }
    }

    /// Strict majority: more than half of the nodes agreed
    pub fn is_majority(&self) -> bool {
        self.agreed > self.total / 2
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Verified result sent to the client
    Success,
    /// All partial sums collected but the majority did not agree
    Failure,
    /// Run ended before a decision (bad input, no quorum, silent node)
    Aborted,
}

/// How a worker node misbehaves, for exercising verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultMode {
    /// Honest arithmetic
    #[default]
    None,
    /// Corrupts only its recomputation during verification
    Verify,
    /// Corrupts both its partial sum and its verification recomputations
    All,
}

impl FaultMode {
    pub fn corrupts_partial(&self) -> bool {
        matches!(self, FaultMode::All)
    }

    pub fn corrupts_verification(&self) -> bool {
        matches!(self, FaultMode::Verify | FaultMode::All)
    }

    /// Add random noise in `1..=10`
    pub fn corrupt(sum: i64) -> i64 {
        sum.wrapping_add(rand::thread_rng().gen_range(1..=10))
    }
}

/// Configuration for the leader
#[derive(Debug, Clone)]
pub struct LeaderConfig {
    /// Address clients and nodes connect to
    pub bind_addr: String,
    /// Quorum size; exactly this many nodes are admitted per run
    pub min_nodes: usize,
    /// Wait for the quorum before giving up on the run
    pub join_timeout: Duration,
    /// Per-node deadline for the partial sum
    pub response_timeout: Duration,
    /// Per-node deadline for a verification vote
    pub verify_timeout: Duration,
    /// Per-line deadline while reading the client's request
    pub client_timeout: Duration,
    /// Run the sequential baseline before dispatching
    pub baseline: bool,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            min_nodes: MIN_NODES,
            join_timeout: JOIN_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            verify_timeout: VERIFY_TIMEOUT,
            client_timeout: CLIENT_TIMEOUT,
            baseline: true,
        }
    }
}

impl LeaderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_nodes == 0 {
            return Err(ConfigError::EmptyQuorum);
        }
        let timeouts = [
            ("join_timeout", self.join_timeout),
            ("response_timeout", self.response_timeout),
            ("verify_timeout", self.verify_timeout),
            ("client_timeout", self.client_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        Ok(())
    }
}

/// Configuration for a worker node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Leader address to connect to
    pub leader_addr: String,
    /// Fault injection
    pub fault: FaultMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            leader_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            fault: FaultMode::None,
        }
    }
}

/// Configuration for a client run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Leader address to connect to
    pub leader_addr: String,
    pub greeting: String,
    /// Workload to sum
    pub numbers: Vec<i64>,
    /// Simulated work per element, in milliseconds
    pub delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            leader_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            greeting: DEFAULT_GREETING.to_string(),
            numbers: vec![1, 2, 3, 4, 5, 6],
            delay_ms: 50,
        }
    }
}

/// Counters over the leader's lifetime
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaderStats {
    pub runs_started: u64,
    pub succeeded: u64,
    pub consensus_failures: u64,
    pub rejected_inputs: u64,
    pub quorum_failures: u64,
    pub node_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_is_strict() {
        assert!(Decision::new(4, 5).is_majority());
        assert!(Decision::new(3, 5).is_majority());
        assert!(!Decision::new(2, 5).is_majority());
        assert!(!Decision::new(1, 3).is_majority());
        assert!(Decision::new(2, 3).is_majority());
        assert!(!Decision::new(2, 4).is_majority());
        assert!(Decision::new(1, 1).is_majority());
    }

    #[test]
    fn test_fault_modes() {
        assert!(!FaultMode::None.corrupts_partial());
        assert!(!FaultMode::None.corrupts_verification());
        assert!(!FaultMode::Verify.corrupts_partial());
        assert!(FaultMode::Verify.corrupts_verification());
        assert!(FaultMode::All.corrupts_partial());
        assert!(FaultMode::All.corrupts_verification());
    }

    #[test]
    fn test_corrupt_always_changes_sum() {
        for _ in 0..100 {
            let noisy = FaultMode::corrupt(21);
            assert!((22..=31).contains(&noisy));
        }
    }

    #[test]
    fn test_leader_config_validation() {
        assert!(LeaderConfig::default().validate().is_ok());

        let config = LeaderConfig {
            min_nodes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyQuorum)));

        let config = LeaderConfig {
            verify_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroTimeout("verify_timeout"))
        ));
    }
}
