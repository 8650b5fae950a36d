//! Leader - partitions a client's workload across nodes and decides the result

use crate::error::{ConfigError, RunError};
use crate::partition::{chunk_sum, partition, sum_with_delay, work_time};
use crate::session::NodeSession;
use crate::transport::LineConnection;
use crate::types::{Decision, LeaderConfig, LeaderStats, RunOutcome, Task, DISPATCH_GRACE};
use crate::verification::VerificationRound;
use futures::future::join_all;
use ledger_protocol::{ClientRequest, LeaderReply};
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Everything one client request owns. Dropped when the run ends.
struct RunContext {
    task: Task,
    sessions: Vec<NodeSession>,
}

impl RunContext {
    /// Close every node connection
    async fn close(self) {
        join_all(self.sessions.into_iter().map(NodeSession::close)).await;
    }
}

/// Leader that serves one client run at a time
pub struct Coordinator {
    config: LeaderConfig,
    stats: RwLock<LeaderStats>,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(config: LeaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            stats: RwLock::new(LeaderStats::default()),
        })
    }

    pub fn config(&self) -> &LeaderConfig {
        &self.config
    }

    /// Bind the listening socket clients and nodes connect to
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            "Leader listening on {} (quorum: {} nodes)",
            listener.local_addr()?,
            self.config.min_nodes
        );
        Ok(listener)
    }

    /// Serve runs back to back until the listener fails
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let outcome = self.run_once(&listener).await?;
            let stats = self.stats();
            tracing::info!(
                "Run finished: {:?} ({} runs, {} succeeded)",
                outcome,
                stats.runs_started,
                stats.succeeded
            );
        }
    }

    /// Serve a single client: the first connection accepted is the client,
    /// the following ones are nodes.
    pub async fn run_once(&self, listener: &TcpListener) -> anyhow::Result<RunOutcome> {
        tracing::info!("Waiting for client connection...");
        let (stream, peer) = listener.accept().await?;
        tracing::info!("Client connected from {}", peer);

        self.stats.write().runs_started += 1;
        let mut client = LineConnection::new(stream);

        let reply = match self.run_client(listener, &mut client).await {
            Ok(total) => {
                tracing::info!("Total sum calculated by leader: {}", total);
                Ok(LeaderReply::Result(total))
            }
            Err(e) => {
                tracing::warn!("Run failed: {}", e);
                Err(e)
            }
        };

        let outcome = self.record(&reply);
        let message = match reply {
            Ok(reply) => reply,
            Err(e) => LeaderReply::Error(e.to_string()),
        };
        if let Err(e) = client.send(&message).await {
            tracing::warn!("Could not send final reply to client: {}", e);
        }
        client.shutdown().await;

        Ok(outcome)
    }

    /// Get current stats
    pub fn stats(&self) -> LeaderStats {
        self.stats.read().clone()
    }

    fn record(&self, reply: &Result<LeaderReply, RunError>) -> RunOutcome {
        let mut stats = self.stats.write();
        match reply {
            Ok(_) => {
                stats.succeeded += 1;
                RunOutcome::Success
            }
            Err(e) => {
                match e {
                    RunError::Consensus { .. } => stats.consensus_failures += 1,
                    RunError::Quorum { .. } => stats.quorum_failures += 1,
                    RunError::NodeUnresponsive { .. } | RunError::DispatchTimeout(_) => {
                        stats.node_failures += 1
                    }
                    _ => stats.rejected_inputs += 1,
                }
                e.outcome()
            }
        }
    }

    async fn run_client(
        &self,
        listener: &TcpListener,
        client: &mut LineConnection,
    ) -> Result<i64, RunError> {
        let task = self.await_task(client).await?;

        if self.config.baseline {
            self.baseline(&task, client).await?;
        }

        let sessions = self.await_quorum(listener).await;
        let mut run = RunContext { task, sessions };
        let result = self.execute(&mut run).await;
        run.close().await;
        result
    }

    /// Read the greeting and the workload
    async fn await_task(&self, client: &mut LineConnection) -> Result<Task, RunError> {
        let greeting = self.read_client_line(client).await?;
        tracing::info!("Received from client: {}", greeting);
        let text = match greeting.parse::<ClientRequest>() {
            Ok(ClientRequest::Greeting(text)) => text,
            _ => return Err(RunError::InvalidGreeting),
        };
        client.send(&LeaderReply::Acknowledged(text)).await?;

        let request = self.read_client_line(client).await?;
        let (numbers, delay_ms) = match request.parse::<ClientRequest>()? {
            ClientRequest::Submit { numbers, delay_ms } => (numbers, delay_ms),
            ClientRequest::Greeting(_) => {
                return Err(RunError::Input(ledger_protocol::ProtocolError::MissingField(
                    "NUMBERS",
                )))
            }
        };
        client.send(&LeaderReply::NumbersAccepted).await?;
        tracing::info!(
            "Received {} numbers with {}ms delay per element",
            numbers.len(),
            delay_ms
        );

        Ok(Task::new(numbers, Duration::from_millis(delay_ms)))
    }

    async fn read_client_line(&self, client: &mut LineConnection) -> Result<String, RunError> {
        match timeout(self.config.client_timeout, client.recv_line()).await {
            Err(_) => Err(RunError::ClientTimeout(self.config.client_timeout)),
            Ok(Err(e)) => Err(RunError::ClientIo(e)),
            Ok(Ok(None)) => Err(RunError::ClientDisconnected),
            Ok(Ok(Some(line))) => Ok(line),
        }
    }

    /// Sequential sum with the same per-element delay, for latency comparison
    async fn baseline(&self, task: &Task, client: &mut LineConnection) -> Result<(), RunError> {
        tracing::info!("Performing single-sum calculation for comparison...");
        let started = Instant::now();
        let sum = sum_with_delay(&task.numbers, task.delay).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Single-sum calculation completed. Result: {}, Time Taken: {} ms",
            sum,
            elapsed_ms
        );
        client
            .send(&LeaderReply::SingleResult { sum, elapsed_ms })
            .await?;
        Ok(())
    }

    /// Admit nodes until the quorum is reached or the join timeout passes
    async fn await_quorum(&self, listener: &TcpListener) -> Vec<NodeSession> {
        tracing::info!(
            "Waiting for at least {} node connections...",
            self.config.min_nodes
        );
        let deadline = tokio::time::Instant::now() + self.config.join_timeout;
        let mut sessions: Vec<NodeSession> = Vec::with_capacity(self.config.min_nodes);

        while sessions.len() < self.config.min_nodes {
            match tokio::time::timeout_at(deadline, listener.accept()).await {
                Err(_) => break,
                Ok(Ok((stream, peer))) => {
                    let id = sessions.len() as u32 + 1;
                    sessions.push(NodeSession::new(
                        id,
                        stream,
                        self.config.response_timeout,
                        self.config.verify_timeout,
                    ));
                    tracing::info!(
                        "Node {} connected from {}. Total connected nodes: {}",
                        id,
                        peer,
                        sessions.len()
                    );
                }
                Ok(Err(e)) => tracing::warn!("Node accept error: {}", e),
            }
        }

        sessions
    }

    /// Ready signal, dispatch, verification and decision
    async fn execute(&self, run: &mut RunContext) -> Result<i64, RunError> {
        let joined = run.sessions.len();
        if joined < self.config.min_nodes {
            return Err(RunError::Quorum {
                joined,
                required: self.config.min_nodes,
            });
        }

        tracing::info!("All required nodes connected. Sending READY to nodes...");
        for session in run.sessions.iter_mut() {
            if let Err(e) = session.send_ready().await {
                tracing::warn!("Error sending READY to node {}: {}", session.id(), e);
            }
        }

        let partial_sums = self.dispatch(run).await?;

        let round = VerificationRound::ring(joined);
        let report = round.run(&mut run.sessions, &partial_sums).await;
        let decision = Decision::new(report.agreed(), report.total());

        if decision.is_majority() {
            tracing::info!(
                "Consensus achieved. {} out of {} nodes agreed",
                decision.agreed,
                decision.total
            );
            // Reported sums are aggregated as-is, including any node a peer disagreed with
            Ok(chunk_sum(&partial_sums))
        } else {
            Err(RunError::Consensus {
                agreed: decision.agreed,
                total: decision.total,
            })
        }
    }

    /// Send every chunk at once and wait for all nodes before looking at results
    async fn dispatch(&self, run: &mut RunContext) -> Result<Vec<i64>, RunError> {
        let chunks = partition(&run.task.numbers, run.sessions.len());
        let delay = run.task.delay;

        // Nodes sleep the delay per element, so the slowest chunk sets the bound
        let longest = chunks.iter().map(Vec::len).max().unwrap_or(0);
        let group_timeout = self
            .config
            .response_timeout
            .saturating_add(work_time(longest, delay))
            .saturating_add(DISPATCH_GRACE);
        let dispatches = run
            .sessions
            .iter_mut()
            .zip(chunks)
            .map(|(session, chunk)| session.dispatch(chunk, delay));
        let results = timeout(group_timeout, join_all(dispatches))
            .await
            .map_err(|_| RunError::DispatchTimeout(group_timeout))?;

        let mut partial_sums = Vec::with_capacity(results.len());
        for (session, result) in run.sessions.iter().zip(results) {
            match result {
                Ok(sum) => partial_sums.push(sum),
                Err(source) => {
                    tracing::warn!("Node {} did not respond: {}", session.id(), source);
                    return Err(RunError::NodeUnresponsive {
                        node_id: session.id(),
                        source,
                    });
                }
            }
        }

        Ok(partial_sums)
    }
}

/// Builder for Coordinator
pub struct CoordinatorBuilder {
    config: LeaderConfig,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: LeaderConfig::default(),
        }
    }

    pub fn config(mut self, config: LeaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind_addr(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn min_nodes(mut self, min_nodes: usize) -> Self {
        self.config.min_nodes = min_nodes;
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    pub fn verify_timeout(mut self, timeout: Duration) -> Self {
        self.config.verify_timeout = timeout;
        self
    }

    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.config.client_timeout = timeout;
        self
    }

    pub fn baseline(mut self, enabled: bool) -> Self {
        self.config.baseline = enabled;
        self
    }

    pub fn build(self) -> Result<Coordinator, ConfigError> {
        Coordinator::new(self.config)
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
