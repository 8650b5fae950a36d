//! End-to-end runs over loopback TCP
//!
//! Each test starts a real leader, then joins real worker nodes and/or
//! scripted fake nodes in a fixed order so node ordinals are predictable.


use crate::{
    chunk_sum, ClientSession, Coordinator, CoordinatorBuilder, FaultMode, RunOutcome,
    WorkerNodeBuilder, WorkerSummary, DEFAULT_GREETING,
};
use crate::transport::LineConnection;
use ledger_protocol::{NodeCommand, NodeReply};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Leader running a single client run in the background
pub(crate) struct TestLeader {
    pub coordinator: Arc<Coordinator>,
    pub addr: String,
    pub run: JoinHandle<RunOutcome>,
}

pub(crate) async fn start_leader(builder: CoordinatorBuilder) -> TestLeader {
    let coordinator = Arc::new(builder.bind_addr("127.0.0.1:0").build().unwrap());
    let listener = coordinator.bind().await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let leader = coordinator.clone();
    let run = tokio::spawn(async move { leader.run_once(&listener).await.unwrap() });

    TestLeader {
        coordinator,
        addr,
        run,
    }
}

/// Connect a client and submit the workload. Once this returns the leader
/// has taken this connection as its client, so nodes can join safely.
pub(crate) async fn submit(addr: &str, numbers: Vec<i64>, delay_ms: u64) -> ClientSession {
    let mut client = ClientSession::connect(addr).await.unwrap();
    client
        .submit(DEFAULT_GREETING, numbers, delay_ms)
        .await
        .unwrap();
    client
}

/// Connect a worker node now and let it run in the background
pub(crate) async fn join_worker(addr: &str, fault: FaultMode) -> JoinHandle<WorkerSummary> {
    let worker = WorkerNodeBuilder::new().leader_addr(addr).fault(fault).build();
    worker.connect().await.unwrap();
    tokio::spawn(async move { worker.run().await.unwrap() })
}

/// Behaviour of a fake node that only the tests can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    /// Accepts the task but never answers
    Silent,
    /// Correct partial sum, but answers NO to every challenge
    AlwaysDisagree,
}

/// Connect a scripted node; the handle yields every line it received
pub(crate) async fn join_scripted(addr: &str, script: Script) -> JoinHandle<Vec<String>> {
    let mut conn = LineConnection::connect(addr).await.unwrap();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(Some(line)) = conn.recv_line().await {
            seen.push(line.clone());
            match line.parse::<NodeCommand>() {
                Ok(NodeCommand::Task { numbers, .. }) if script != Script::Silent => {
                    let _ = conn.send(&NodeReply::PartialSum(chunk_sum(&numbers))).await;
                }
                Ok(NodeCommand::Verify { .. }) => {
                    let _ = conn.send(&NodeReply::Disagree).await;
                }
                Ok(NodeCommand::Close) => break,
                _ => {}
            }
        }
        seen
    })
}
