//! Client session - submits a workload and reads the leader's verdict

use crate::transport::LineConnection;
use crate::types::ClientConfig;
use ledger_protocol::{ClientRequest, LeaderReply};

pub const DEFAULT_GREETING: &str = "Hello Leader!";

/// Final word from the leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// Verified distributed sum
    Result(i64),
    /// Leader reported an error
    Error(String),
    /// Connection closed without a result or error
    NoResponse,
}

/// Everything the leader told the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    /// Greeting and workload acknowledgements
    pub acknowledgements: Vec<String>,
    /// Sequential baseline `(sum, elapsed_ms)`
    pub baseline: Option<(i64, u64)>,
    pub outcome: ClientOutcome,
    /// Lines that did not parse as leader replies
    pub unexpected: Vec<String>,
}

impl Default for ClientReport {
    fn default() -> Self {
        Self {
            acknowledgements: Vec::new(),
            baseline: None,
            outcome: ClientOutcome::NoResponse,
            unexpected: Vec::new(),
        }
    }
}

impl ClientReport {
    /// Classify one leader line
    fn absorb(&mut self, line: &str) {
        match line.parse::<LeaderReply>() {
            Ok(LeaderReply::Acknowledged(_)) | Ok(LeaderReply::NumbersAccepted) => {
                tracing::info!("Leader says: {}", line);
                self.acknowledgements.push(line.to_string());
            }
            Ok(LeaderReply::SingleResult { sum, elapsed_ms }) => {
                tracing::info!(
                    "Single sum calculation result: {}, Time Taken: {} ms",
                    sum,
                    elapsed_ms
                );
                self.baseline = Some((sum, elapsed_ms));
            }
            Ok(LeaderReply::Result(sum)) => {
                tracing::info!("Final result received from leader: {}", sum);
                self.outcome = ClientOutcome::Result(sum);
            }
            Ok(LeaderReply::Error(reason)) => {
                tracing::warn!("Leader reported an error: {}", reason);
                self.outcome = ClientOutcome::Error(reason);
            }
            Err(_) => {
                tracing::warn!("Unexpected message from leader: {}", line);
                self.unexpected.push(line.to_string());
            }
        }
    }

    fn failed(&self) -> bool {
        matches!(self.outcome, ClientOutcome::Error(_))
    }
}

/// One client conversation with the leader
pub struct ClientSession {
    conn: LineConnection,
    report: ClientReport,
}

impl ClientSession {
    /// Connect to the leader
    pub async fn connect(leader_addr: &str) -> anyhow::Result<Self> {
        let conn = LineConnection::connect(leader_addr).await?;
        tracing::info!("Client connected to leader at {}", leader_addr);
        Ok(Self {
            conn,
            report: ClientReport::default(),
        })
    }

    /// Send greeting and workload, reading the acknowledgement of each.
    ///
    /// Stops early when the leader rejects the greeting.
    pub async fn submit(
        &mut self,
        greeting: &str,
        numbers: Vec<i64>,
        delay_ms: u64,
    ) -> anyhow::Result<()> {
        self.conn
            .send(&ClientRequest::Greeting(greeting.to_string()))
            .await?;
        if !self.read_one().await? || self.report.failed() {
            return Ok(());
        }

        self.conn
            .send(&ClientRequest::Submit { numbers, delay_ms })
            .await?;
        self.read_one().await?;
        Ok(())
    }

    /// Read leader messages until the connection closes
    pub async fn collect(mut self) -> anyhow::Result<ClientReport> {
        while self.read_one().await? {}
        Ok(self.report)
    }

    /// Connect, submit and collect in one go
    pub async fn run(config: &ClientConfig) -> anyhow::Result<ClientReport> {
        let mut session = Self::connect(&config.leader_addr).await?;
        session
            .submit(&config.greeting, config.numbers.clone(), config.delay_ms)
            .await?;
        session.collect().await
    }

    /// Returns false once the leader closed the connection
    async fn read_one(&mut self) -> anyhow::Result<bool> {
        match self.conn.recv_line().await? {
            Some(line) => {
                self.report.absorb(&line);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
