//! Proposals and votes exchanged over a consensus channel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::task::epoch_now;

/// Lifecycle state of a [`Proposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Active,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

/// A decision put to a swarm for a vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub proposer: String,
    pub status: ProposalStatus,

    /// Unix epoch seconds.
    pub created_at: f64,

    /// Unix epoch seconds; `None` means the proposal never expires on its
    /// own.
    pub expires_at: Option<f64>,

    pub metadata: Map<String, Value>,

    /// Votes as reconciled from the log: at most one entry per voter, the
    /// most recently posted vote for that voter winning.
    pub votes: Vec<Vote>,
}

impl Proposal {
    /// Build a new `Pending` proposal with no votes.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        proposer: impl Into<String>,
        expires_at: Option<f64>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            proposer: proposer.into(),
            status: ProposalStatus::Pending,
            created_at: epoch_now(),
            expires_at,
            metadata,
            votes: Vec::new(),
        }
    }
}

/// A single node's vote on a [`Proposal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter: String,
    pub approve: bool,

    /// Clamped to `[0, 1]` at construction time.
    pub confidence: f64,

    pub reasoning: String,

    /// Unix epoch seconds.
    pub voted_at: f64,
}

impl Vote {
    /// Build a new vote, clamping `confidence` into `[0, 1]`.
    pub fn new(
        proposal_id: impl Into<String>,
        voter: impl Into<String>,
        approve: bool,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            voter: voter.into(),
            approve,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            voted_at: epoch_now(),
        }
    }
}

/// Outcome of [`crate::services::consensus::SwarmNode::evaluate_proposal`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub weighted_approval: f64,
    pub approved: bool,
    pub vote_count: usize,
}
