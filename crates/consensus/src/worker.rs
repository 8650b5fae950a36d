//! Worker node - sums its assigned chunk and checks other nodes' sums

use crate::partition::{chunk_sum, sum_with_delay};
use crate::transport::LineConnection;
use crate::types::{FaultMode, NodeConfig};
use ledger_protocol::{NodeCommand, NodeReply};
use parking_lot::Mutex;
use std::time::Duration;

/// What a node did before the leader let it go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Ordinal assigned by the leader, once a task arrived
    pub node_id: Option<u32>,
    pub ready_received: bool,
    pub tasks_completed: usize,
    pub verifications: usize,
}

/// Worker node that computes partial sums for the leader
pub struct WorkerNode {
    /// Connection to the leader, taken by `run`
    connection: Mutex<Option<LineConnection>>,
    config: NodeConfig,
}

impl WorkerNode {
    /// Create a new worker node
    pub fn new(config: NodeConfig) -> Self {
        if config.fault != FaultMode::None {
            tracing::warn!(
                "Node is set to faulty mode ({:?}). It will return incorrect calculations.",
                config.fault
            );
        }
        Self {
            connection: Mutex::new(None),
            config,
        }
    }

    /// Connect to the leader
    pub async fn connect(&self) -> anyhow::Result<()> {
        let conn = LineConnection::connect(&self.config.leader_addr).await?;
        *self.connection.lock() = Some(conn);
        tracing::info!("Node connected to leader at {}", self.config.leader_addr);
        Ok(())
    }

    /// Handle leader messages until `CLOSE` or disconnect
    pub async fn run(&self) -> anyhow::Result<WorkerSummary> {
        let mut conn = self
            .connection
            .lock()
            .take()
            .ok_or_else(|| anyhow::anyhow!("Not connected to leader"))?;

        let mut summary = WorkerSummary::default();

        while let Some(line) = conn.recv_line().await? {
            match line.parse::<NodeCommand>() {
                Ok(NodeCommand::Ready) => {
                    tracing::info!("Leader is ready, waiting for task");
                    summary.ready_received = true;
                }
                Ok(NodeCommand::Task {
                    numbers,
                    node_id,
                    delay_ms,
                }) => {
                    tracing::info!("Received task from leader as node {}: {}", node_id, line);
                    let sum = self
                        .compute_partial(&numbers, Duration::from_millis(delay_ms))
                        .await;
                    conn.send(&NodeReply::PartialSum(sum)).await?;
                    tracing::info!("Partial sum sent to leader: {}", sum);
                    summary.node_id = Some(node_id);
                    summary.tasks_completed += 1;
                }
                Ok(NodeCommand::Verify {
                    claimed_sum,
                    numbers,
                }) => {
                    let reply = self.check(claimed_sum, &numbers);
                    conn.send(&reply).await?;
                    tracing::info!(
                        "Verification of sum {}: sent {} to leader",
                        claimed_sum,
                        reply
                    );
                    summary.verifications += 1;
                }
                Ok(NodeCommand::Close) => {
                    tracing::info!("Received CLOSE from leader. Closing connection.");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Unexpected message from leader: {} ({})", line, e);
                }
            }
        }

        conn.shutdown().await;
        Ok(summary)
    }

    async fn compute_partial(&self, numbers: &[i64], delay: Duration) -> i64 {
        let sum = sum_with_delay(numbers, delay).await;
        if self.config.fault.corrupts_partial() {
            let corrupted = FaultMode::corrupt(sum);
            tracing::warn!("Node is faulty. Sending incorrect sum: {}", corrupted);
            return corrupted;
        }
        sum
    }

    /// Recompute another node's chunk and vote on its claim
    fn check(&self, claimed_sum: i64, numbers: &[i64]) -> NodeReply {
        let mut recomputed = chunk_sum(numbers);
        if self.config.fault.corrupts_verification() {
            recomputed = FaultMode::corrupt(recomputed);
            tracing::warn!("Node is faulty during verification. Recomputed: {}", recomputed);
        }
        if recomputed == claimed_sum {
            NodeReply::Agree
        } else {
            NodeReply::Disagree
        }
    }
}

/// Builder for WorkerNode
pub struct WorkerNodeBuilder {
    config: NodeConfig,
}

impl WorkerNodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
        }
    }

    pub fn leader_addr(mut self, addr: &str) -> Self {
        self.config.leader_addr = addr.to_string();
        self
    }

    pub fn fault(mut self, fault: FaultMode) -> Self {
        self.config.fault = fault;
        self
    }

    pub fn build(self) -> WorkerNode {
        WorkerNode::new(self.config)
    }
}

impl Default for WorkerNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn node(fault: FaultMode) -> WorkerNode {
        WorkerNodeBuilder::new().fault(fault).build()
    }

    #[test]
    fn test_honest_check() {
        let worker = node(FaultMode::None);
        assert_eq!(worker.check(11, &[5, 6]), NodeReply::Agree);
        assert_eq!(worker.check(12, &[5, 6]), NodeReply::Disagree);
        assert_eq!(worker.check(0, &[]), NodeReply::Agree);
    }

    #[test]
    fn test_faulty_check_never_agrees_with_truth() {
        for fault in [FaultMode::Verify, FaultMode::All] {
            let worker = node(fault);
            for _ in 0..50 {
                assert_eq!(worker.check(11, &[5, 6]), NodeReply::Disagree);
            }
        }
    }

    #[tokio::test]
    async fn test_partial_sum_corruption() {
        assert_eq!(
            node(FaultMode::Verify).compute_partial(&[1, 2], Duration::ZERO).await,
            3
        );
        let corrupted = node(FaultMode::All)
            .compute_partial(&[1, 2], Duration::ZERO)
            .await;
        assert!((4..=13).contains(&corrupted));
    }

    #[tokio::test]
    async fn test_run_requires_connection() {
        assert!(node(FaultMode::None).run().await.is_err());
    }

    #[tokio::test]
    async fn test_conversation_with_leader() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let worker = WorkerNodeBuilder::new().leader_addr(&addr).build();
        let handle = tokio::spawn(async move {
            worker.connect().await.unwrap();
            worker.run().await.unwrap()
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut leader = LineConnection::new(stream);
        leader.send(&NodeCommand::Ready).await.unwrap();
        leader.send("TASK: 3,4 NODE_ID: 2").await.unwrap();
        assert_eq!(
            leader.recv_line().await.unwrap().as_deref(),
            Some("Partial sum: 7")
        );
        leader.send("something odd").await.unwrap();
        leader.send("VERIFY_SUM: 11, TASK: 5,6").await.unwrap();
        assert_eq!(leader.recv_line().await.unwrap().as_deref(), Some("YES"));
        leader.send(&NodeCommand::Close).await.unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(
            summary,
            WorkerSummary {
                node_id: Some(2),
                ready_received: true,
                tasks_completed: 1,
                verifications: 1,
            }
        );
    }
}
