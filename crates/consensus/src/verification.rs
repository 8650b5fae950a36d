//! Ring verification of partial sums
//!
//! Node `i` recomputes the chunk of node `(i + 1) mod N` and votes on whether
//! that node's reported sum is right. Every node verifies once and is verified
//! once, so a round costs N challenges rather than N². Two adjacent nodes that
//! collude are not caught.

use crate::session::{NodeSession, Vote};
use futures::future::join_all;

/// Directed check: `verifier` recomputes the chunk of `verified` (indices into the session list)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationEdge {
    pub verifier: usize,
    pub verified: usize,
}

/// Outcome of one edge
#[derive(Debug)]
pub struct EdgeResult {
    pub verifier_id: u32,
    pub verified_id: u32,
    pub claimed_sum: i64,
    pub vote: Vote,
}

/// Votes collected by a round
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub edges: Vec<EdgeResult>,
}

impl VerificationReport {
    pub fn agreed(&self) -> usize {
        self.edges.iter().filter(|e| e.vote.is_agree()).count()
    }

    pub fn total(&self) -> usize {
        self.edges.len()
    }
}

/// A ring of verification edges over N nodes
#[derive(Debug, Clone)]
pub struct VerificationRound {
    edges: Vec<VerificationEdge>,
}

impl VerificationRound {
    /// Build the ring `i -> (i + 1) mod n`
    pub fn ring(n: usize) -> Self {
        let edges = (0..n)
            .map(|i| VerificationEdge {
                verifier: i,
                verified: (i + 1) % n,
            })
            .collect();
        Self { edges }
    }

    pub fn edges(&self) -> &[VerificationEdge] {
        &self.edges
    }

    /// Challenge every verifier concurrently and wait for all votes.
    ///
    /// `partial_sums[i]` is the sum reported by `sessions[i]`. Failed edges are
    /// recorded as `Vote::Error` and not retried.
    pub async fn run(
        &self,
        sessions: &mut [NodeSession],
        partial_sums: &[i64],
    ) -> VerificationReport {
        debug_assert_eq!(sessions.len(), self.edges.len());
        debug_assert_eq!(sessions.len(), partial_sums.len());

        if self.edges.len() == 1 {
            tracing::warn!(
                "Only one node joined; it verifies its own sum, so the check is not independent"
            );
        }

        let claims: Vec<(u32, i64, Vec<i64>)> = self
            .edges
            .iter()
            .map(|edge| {
                let target = &sessions[edge.verified];
                (
                    target.id(),
                    partial_sums[edge.verified],
                    target.chunk().to_vec(),
                )
            })
            .collect();

        // Edge i has verifier i, so sessions and claims line up
        let challenges = sessions.iter_mut().zip(claims).map(
            |(session, (verified_id, claimed_sum, chunk))| async move {
                let vote = session.verify(claimed_sum, &chunk).await;
                match &vote {
                    Vote::Agree => tracing::info!(
                        "Node {} agrees with sum {} from node {}",
                        session.id(),
                        claimed_sum,
                        verified_id
                    ),
                    Vote::Disagree => tracing::info!(
                        "Node {} disagrees with sum {} from node {}",
                        session.id(),
                        claimed_sum,
                        verified_id
                    ),
                    Vote::Error(e) => tracing::warn!(
                        "Node {} could not verify node {}: {}",
                        session.id(),
                        verified_id,
                        e
                    ),
                }
                EdgeResult {
                    verifier_id: session.id(),
                    verified_id,
                    claimed_sum,
                    vote,
                }
            },
        );

        VerificationReport {
            edges: join_all(challenges).await,
        }
    }
}
