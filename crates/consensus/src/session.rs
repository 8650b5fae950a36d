//! Leader-side handle for one worker node

use crate::error::NodeError;
use crate::partition::work_time;
use crate::transport::LineConnection;
use ledger_protocol::{format_numbers, NodeCommand, NodeReply};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Time allowed for the best-effort `CLOSE` during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of one verification challenge.
///
/// Errors never count as agreement.
#[derive(Debug)]
pub enum Vote {
    Agree,
    Disagree,
    Error(NodeError),
}

impl Vote {
    pub fn is_agree(&self) -> bool {
        matches!(self, Vote::Agree)
    }
}

/// Connection to a joined node plus what the leader knows about it
pub struct NodeSession {
    /// Join-order ordinal, starting at 1
    id: u32,
    conn: LineConnection,
    /// Chunk assigned at dispatch
    chunk: Vec<i64>,
    response_timeout: Duration,
    verify_timeout: Duration,
}

impl NodeSession {
    pub fn new(
        id: u32,
        stream: TcpStream,
        response_timeout: Duration,
        verify_timeout: Duration,
    ) -> Self {
        Self {
            id,
            conn: LineConnection::new(stream),
            chunk: Vec::new(),
            response_timeout,
            verify_timeout,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn chunk(&self) -> &[i64] {
        &self.chunk
    }

    /// Tell the node the quorum is complete
    pub async fn send_ready(&mut self) -> Result<(), NodeError> {
        self.conn.send(&NodeCommand::Ready).await?;
        tracing::debug!("Sent READY to node {}", self.id);
        Ok(())
    }

    /// Send the chunk and wait for the node's partial sum.
    ///
    /// The deadline is the response timeout plus the simulated work the
    /// chunk asks for.
    pub async fn dispatch(&mut self, chunk: Vec<i64>, delay: Duration) -> Result<i64, NodeError> {
        let command = NodeCommand::Task {
            numbers: chunk.clone(),
            node_id: self.id,
            delay_ms: delay.as_millis() as u64,
        };
        self.conn.send(&command).await?;
        tracing::info!("Sent task to node {}: [{}]", self.id, format_numbers(&chunk));
        let deadline = self
            .response_timeout
            .saturating_add(work_time(chunk.len(), delay));
        self.chunk = chunk;

        let line = self.recv_within(deadline).await?;
        match line.parse::<NodeReply>()? {
            NodeReply::PartialSum(sum) => {
                tracing::info!("Received partial sum from node {}: {}", self.id, sum);
                Ok(sum)
            }
            other => Err(NodeError::UnexpectedReply(other.to_string())),
        }
    }

    /// Ask the node to recompute `chunk` and compare against `claimed_sum`
    pub async fn verify(&mut self, claimed_sum: i64, chunk: &[i64]) -> Vote {
        match self.challenge(claimed_sum, chunk).await {
            Ok(vote) => vote,
            Err(e) => {
                tracing::warn!("Verification with node {} failed: {}", self.id, e);
                Vote::Error(e)
            }
        }
    }

    async fn challenge(&mut self, claimed_sum: i64, chunk: &[i64]) -> Result<Vote, NodeError> {
        let command = NodeCommand::Verify {
            claimed_sum,
            numbers: chunk.to_vec(),
        };
        self.conn.send(&command).await?;
        tracing::debug!("Sent to node {}: {}", self.id, command);

        let line = self.recv_within(self.verify_timeout).await?;
        match line.parse::<NodeReply>()? {
            NodeReply::Agree => Ok(Vote::Agree),
            NodeReply::Disagree => Ok(Vote::Disagree),
            other => Err(NodeError::UnexpectedReply(other.to_string())),
        }
    }

    async fn recv_within(&mut self, deadline: Duration) -> Result<String, NodeError> {
        match timeout(deadline, self.conn.recv_line()).await {
            Err(_) => Err(NodeError::Timeout(deadline)),
            Ok(Err(e)) => Err(NodeError::Io(e)),
            Ok(Ok(None)) => Err(NodeError::Closed),
            Ok(Ok(Some(line))) => {
                tracing::debug!("Node {} says: {}", self.id, line);
                Ok(line)
            }
        }
    }

    /// Send `CLOSE` if the node is still listening, then drop the socket
    pub async fn close(mut self) {
        let sent = timeout(CLOSE_TIMEOUT, self.conn.send(&NodeCommand::Close)).await;
        if !matches!(sent, Ok(Ok(()))) {
            tracing::debug!("Could not send CLOSE to node {}", self.id);
        }
        self.conn.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Session on the leader side plus the raw node side of the socket
    async fn session_pair(timeout: Duration) -> (NodeSession, LineConnection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = tokio::spawn(async move { LineConnection::connect(&addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let session = NodeSession::new(1, stream, timeout, timeout);
        (session, node.await.unwrap())
    }

    #[tokio::test]
    async fn test_dispatch_returns_partial_sum() {
        let (mut session, mut node) = session_pair(Duration::from_secs(2)).await;

        let fake = tokio::spawn(async move {
            let line = node.recv_line().await.unwrap().unwrap();
            node.send(&NodeReply::PartialSum(7)).await.unwrap();
            line
        });

        let sum = session.dispatch(vec![3, 4], Duration::ZERO).await.unwrap();
        assert_eq!(sum, 7);
        assert_eq!(session.chunk(), &[3, 4]);
        assert_eq!(fake.await.unwrap(), "TASK: 3,4 NODE_ID: 1");
    }

    #[tokio::test]
    async fn test_dispatch_times_out() {
        let (mut session, _node) = session_pair(Duration::from_millis(100)).await;

        let result = session.dispatch(vec![1], Duration::ZERO).await;
        assert!(matches!(result, Err(NodeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_dispatch_deadline_covers_delayed_work() {
        let (mut session, mut node) = session_pair(Duration::from_millis(100)).await;

        // 3 elements at 100ms each: the node answers well after the bare timeout
        tokio::spawn(async move {
            node.recv_line().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            node.send(&NodeReply::PartialSum(6)).await.unwrap();
        });

        let sum = session
            .dispatch(vec![1, 2, 3], Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(sum, 6);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_malformed_reply() {
        let (mut session, mut node) = session_pair(Duration::from_secs(2)).await;

        tokio::spawn(async move {
            node.recv_line().await.unwrap();
            node.send("Partial sum: many").await.unwrap();
        });

        let result = session.dispatch(vec![1], Duration::ZERO).await;
        assert!(matches!(result, Err(NodeError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_dispatch_detects_closed_connection() {
        let (mut session, node) = session_pair(Duration::from_secs(2)).await;
        drop(node);

        let result = session.dispatch(vec![1], Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_verify_votes() {
        let (mut session, mut node) = session_pair(Duration::from_secs(2)).await;

        tokio::spawn(async move {
            let challenge = node.recv_line().await.unwrap().unwrap();
            assert_eq!(challenge, "VERIFY_SUM: 11, TASK: 5,6");
            node.send(&NodeReply::Agree).await.unwrap();
            node.recv_line().await.unwrap();
            node.send(&NodeReply::Disagree).await.unwrap();
            node.recv_line().await.unwrap();
            node.send("PERHAPS").await.unwrap();
        });

        assert!(matches!(session.verify(11, &[5, 6]).await, Vote::Agree));
        assert!(matches!(session.verify(12, &[5, 6]).await, Vote::Disagree));
        let vote = session.verify(11, &[5, 6]).await;
        assert!(matches!(vote, Vote::Error(NodeError::Malformed(_))));
        assert!(!vote.is_agree());
    }

    #[tokio::test]
    async fn test_verify_fails_closed_on_timeout() {
        let (mut session, _node) = session_pair(Duration::from_millis(100)).await;

        let vote = session.verify(1, &[1]).await;
        assert!(matches!(vote, Vote::Error(NodeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_close_sends_close() {
        let (session, mut node) = session_pair(Duration::from_secs(2)).await;

        session.close().await;
        assert_eq!(node.recv_line().await.unwrap().as_deref(), Some("CLOSE"));
        assert_eq!(node.recv_line().await.unwrap(), None);
    }
}
