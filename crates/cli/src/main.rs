//! Ledger
//!
//! Distributed sum with peer verification. One binary, three roles:
//! the leader coordinates runs, nodes compute partial sums, the client
//! submits numbers and prints the verdict.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use ledger_consensus::{
    ClientConfig, ClientOutcome, ClientSession, CoordinatorBuilder, FaultMode, LeaderConfig,
    LeaderStats, WorkerNodeBuilder, DEFAULT_GREETING, DEFAULT_PORT,
};
use ledger_protocol::parse_numbers;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::LeaderFileConfig;

/// Process role
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Accept a client, partition its numbers across nodes, verify and reply
    Leader,
    /// Compute partial sums and verify other nodes' sums
    Node,
    /// Submit numbers to the leader and print the result
    Client,
}

/// Node fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Fault {
    None,
    Verify,
    All,
}

impl From<Fault> for FaultMode {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::None => FaultMode::None,
            Fault::Verify => FaultMode::Verify,
            Fault::All => FaultMode::All,
        }
    }
}

/// Leader/node distributed sum
#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Distributed sum with ring verification and majority decision", long_about = None)]
struct Args {
    /// Role of this process
    #[arg(long, value_enum, default_value = "leader")]
    mode: Mode,

    /// Leader address (bind address in leader mode)
    #[arg(long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    addr: String,

    /// JSON config file for the leader
    #[arg(long)]
    config: Option<PathBuf>,

    /// Nodes required before dispatch (leader mode)
    #[arg(long)]
    min_nodes: Option<usize>,

    /// Seconds to wait for the quorum (leader mode)
    #[arg(long)]
    join_timeout_secs: Option<u64>,

    /// Milliseconds to wait for each partial sum (leader mode)
    #[arg(long)]
    response_timeout_ms: Option<u64>,

    /// Milliseconds to wait for each verification vote (leader mode)
    #[arg(long)]
    verify_timeout_ms: Option<u64>,

    /// Skip the sequential baseline (leader mode)
    #[arg(long)]
    no_baseline: bool,

    /// Serve a single client and exit (leader mode)
    #[arg(long)]
    once: bool,

    /// Fault injection (node mode)
    #[arg(long, value_enum, default_value = "none")]
    fault: Fault,

    /// Comma-separated numbers to sum (client mode)
    #[arg(long, default_value = "1,2,3,4,5,6")]
    numbers: String,

    /// Simulated work per element in milliseconds (client mode)
    #[arg(long, default_value = "50")]
    delay_ms: u64,

    /// Greeting sent to the leader (client mode)
    #[arg(long, default_value = DEFAULT_GREETING)]
    greeting: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Defaults, then the config file, then explicit flags
    fn leader_config(&self) -> Result<LeaderConfig> {
        let mut config = LeaderConfig {
            bind_addr: self.addr.clone(),
            ..Default::default()
        };
        if let Some(path) = &self.config {
            LeaderFileConfig::load(path)?.apply(&mut config);
        }
        if let Some(min_nodes) = self.min_nodes {
            config.min_nodes = min_nodes;
        }
        if let Some(secs) = self.join_timeout_secs {
            config.join_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.response_timeout_ms {
            config.response_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.verify_timeout_ms {
            config.verify_timeout = Duration::from_millis(ms);
        }
        if self.no_baseline {
            config.baseline = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            leader_addr: self.addr.clone(),
            greeting: self.greeting.clone(),
            numbers: parse_numbers(&self.numbers)?,
            delay_ms: self.delay_ms,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.mode {
        Mode::Leader => run_leader(args).await,
        Mode::Node => run_node(args).await,
        Mode::Client => run_client(args).await,
    }
}

/// Run in leader mode - serve clients until Ctrl+C
async fn run_leader(args: Args) -> Result<()> {
    let config = args.leader_config()?;
    tracing::info!("Starting leader");
    tracing::info!("  Address: {}", config.bind_addr);
    tracing::info!("  Quorum: {} nodes", config.min_nodes);
    tracing::info!("  Join timeout: {:?}", config.join_timeout);
    tracing::info!("  Response timeout: {:?}", config.response_timeout);
    tracing::info!("  Verify timeout: {:?}", config.verify_timeout);

    let coordinator = CoordinatorBuilder::new().config(config).build()?;
    let listener = coordinator.bind().await?;

    if args.once {
        let outcome = coordinator.run_once(&listener).await?;
        tracing::info!("Run finished: {:?}", outcome);
        return Ok(());
    }

    tracing::info!("Press Ctrl+C to stop.");
    tokio::select! {
        result = coordinator.serve(listener) => {
            if let Err(e) = result {
                tracing::error!("Leader error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down leader...");
        }
    }

    tracing::info!("Leader stopped. Stats: {}", stats_json(&coordinator.stats())?);

    Ok(())
}

/// One-line JSON summary of the leader's counters
fn stats_json(stats: &LeaderStats) -> Result<String> {
    Ok(serde_json::to_string(stats)?)
}

/// Run in node mode - work for the leader until it lets us go
async fn run_node(args: Args) -> Result<()> {
    tracing::info!("Starting node, connecting to leader: {}", args.addr);

    let node = WorkerNodeBuilder::new()
        .leader_addr(&args.addr)
        .fault(args.fault.into())
        .build();

    node.connect().await?;

    tokio::select! {
        result = node.run() => {
            let summary = result?;
            tracing::info!(
                "Node finished: {} task(s), {} verification(s)",
                summary.tasks_completed,
                summary.verifications
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down node...");
        }
    }

    Ok(())
}

/// Run in client mode - submit the numbers and report the verdict
async fn run_client(args: Args) -> Result<()> {
    let config = args.client_config()?;
    tracing::info!(
        "Submitting {} numbers with {}ms delay to {}",
        config.numbers.len(),
        config.delay_ms,
        config.leader_addr
    );

    let report = ClientSession::run(&config).await?;

    if let Some((sum, elapsed_ms)) = report.baseline {
        tracing::info!("Single sum: {} in {} ms", sum, elapsed_ms);
    }
    match report.outcome {
        ClientOutcome::Result(sum) => {
            tracing::info!("Final result: {}", sum);
            Ok(())
        }
        ClientOutcome::Error(reason) => anyhow::bail!("Leader reported an error: {}", reason),
        ClientOutcome::NoResponse => anyhow::bail!("Leader closed the connection without a result"),
    }
}
