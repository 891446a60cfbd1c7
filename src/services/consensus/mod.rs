//! Append-only consensus log and the node that evaluates it.
//!
//! Grounded on `systems/swarm/swarm_channel.py` (wire format and scan
//! semantics) and `systems/swarm/swarm_node.py` (node convenience methods).
//! `WeightedConfidenceCalculator`'s body is not present in the retrieved
//! source (only referenced from `swarm_node.py`); it is reconstructed here
//! from the weighted-approval formula and threshold comparison both state.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use crate::domain::error::CoreResult;
use crate::domain::models::consensus::{EvaluationResult, Proposal, ProposalStatus, Vote};

const PROPOSAL_PREFIX: &str = "SWARM_PROPOSAL:";
const VOTE_PREFIX: &str = "SWARM_VOTE:";

/// A shared append-only log file two or more [`SwarmNode`]s communicate
/// through.
pub struct SwarmChannel {
    log_path: PathBuf,
}

impl SwarmChannel {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    fn append_line(&self, line: &str) -> CoreResult<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.lock_exclusive()?;
        let result = writeln!(file, "{line}").map_err(Into::into);
        let _ = FileExt::unlock(&file);
        result
    }

    fn read_lines(&self) -> CoreResult<Vec<String>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_path)?;
        Ok(BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .collect())
    }

    /// Append a proposal line. Never rewrites prior lines.
    pub fn post_proposal(&self, proposal: &Proposal) -> CoreResult<()> {
        self.append_line(&format!("{PROPOSAL_PREFIX}{}", serde_json::to_string(proposal)?))
    }

    /// Append a vote line. Never rewrites prior lines.
    pub fn post_vote(&self, vote: &Vote) -> CoreResult<()> {
        self.append_line(&format!("{VOTE_PREFIX}{}", serde_json::to_string(vote)?))
    }

    /// Scan from the beginning of the log for every well-formed proposal
    /// line. Malformed lines are skipped.
    pub fn find_proposals(&self) -> CoreResult<Vec<Proposal>> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| {
                line.strip_prefix(PROPOSAL_PREFIX)
                    .and_then(|json| serde_json::from_str(json).ok())
            })
            .collect())
    }

    /// Scan from the beginning of the log for every well-formed vote line
    /// addressed to `proposal_id`. Malformed lines are skipped.
    pub fn find_votes_for_proposal(&self, proposal_id: &str) -> CoreResult<Vec<Vote>> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| {
                line.strip_prefix(VOTE_PREFIX)
                    .and_then(|json| serde_json::from_str::<Vote>(json).ok())
            })
            .filter(|v| v.proposal_id == proposal_id)
            .collect())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Folds a proposal's votes into a single weighted-approval decision.
///
/// `weighted_approval = Σ confᵢ·1[approveᵢ] / Σ confᵢ`; zero votes yields
/// `weighted_approval = 0`, `approved = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedConfidenceCalculator;

impl WeightedConfidenceCalculator {
    /// Reconcile `votes` to "last write wins per voter", then compute the
    /// weighted-approval decision against `threshold`.
    pub fn evaluate(&self, votes: &[Vote], threshold: f64) -> EvaluationResult {
        let reconciled = reconcile_last_vote_per_voter(votes);
        if reconciled.is_empty() {
            return EvaluationResult {
                weighted_approval: 0.0,
                approved: false,
                vote_count: 0,
            };
        }

        let total_confidence: f64 = reconciled.iter().map(|v| v.confidence).sum();
        let approved_confidence: f64 = reconciled
            .iter()
            .filter(|v| v.approve)
            .map(|v| v.confidence)
            .sum();

        let weighted_approval = if total_confidence > 0.0 {
            approved_confidence / total_confidence
        } else {
            0.0
        };

        EvaluationResult {
            weighted_approval,
            approved: weighted_approval >= threshold,
            vote_count: reconciled.len(),
        }
    }
}

/// At most one vote per voter: later entries in `votes` replace earlier ones
/// from the same voter, matching the log's append-only "last write wins"
/// reconciliation rule.
fn reconcile_last_vote_per_voter(votes: &[Vote]) -> Vec<Vote> {
    let mut by_voter: Vec<Vote> = Vec::new();
    for vote in votes {
        if let Some(existing) = by_voter.iter_mut().find(|v| v.voter == vote.voter) {
            *existing = vote.clone();
        } else {
            by_voter.push(vote.clone());
        }
    }
    by_voter
}

/// A node participating in swarm consensus over a shared [`SwarmChannel`].
pub struct SwarmNode {
    node_id: String,
    channel: SwarmChannel,
    threshold: f64,
    calculator: WeightedConfidenceCalculator,
}

impl SwarmNode {
    pub fn new(node_id: impl Into<String>, log_path: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            node_id: node_id.into(),
            channel: SwarmChannel::new(log_path),
            threshold,
            calculator: WeightedConfidenceCalculator,
        }
    }

    pub fn create_proposal(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Proposal {
        Proposal::new(
            Uuid::new_v4().to_string(),
            title,
            description,
            self.node_id.clone(),
            None,
            metadata,
        )
    }

    pub fn create_vote(
        &self,
        proposal_id: impl Into<String>,
        approve: bool,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Vote {
        Vote::new(proposal_id, self.node_id.clone(), approve, confidence, reasoning)
    }

    pub fn broadcast_proposal(&self, proposal: &Proposal) -> CoreResult<()> {
        self.channel.post_proposal(proposal)
    }

    pub fn broadcast_vote(&self, vote: &Vote) -> CoreResult<()> {
        self.channel.post_vote(vote)
    }

    pub fn check_for_proposals(&self) -> CoreResult<Vec<Proposal>> {
        self.channel.find_proposals()
    }

    pub fn collect_votes(&self, proposal_id: &str) -> CoreResult<Vec<Vote>> {
        self.channel.find_votes_for_proposal(proposal_id)
    }

    /// Evaluate `proposal` against `threshold` (falling back to this node's
    /// configured default), updating `proposal.status` in place.
    pub fn evaluate_proposal(
        &self,
        proposal: &mut Proposal,
        threshold: Option<f64>,
    ) -> CoreResult<EvaluationResult> {
        let votes = self.collect_votes(&proposal.id)?;
        let effective_threshold = threshold.unwrap_or(self.threshold);
        let outcome = self.calculator.evaluate(&votes, effective_threshold);

        proposal.votes = reconcile_last_vote_per_voter(&votes);
        proposal.status = if outcome.approved {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };

        Ok(outcome)
    }

    /// Create a proposal, cast this node's own vote on it, and broadcast
    /// both in one call.
    pub fn propose_and_vote(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        approve: bool,
        confidence: f64,
        reasoning: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> CoreResult<Proposal> {
        let mut proposal = self.create_proposal(title, description, metadata);
        let vote = self.create_vote(proposal.id.clone(), approve, confidence, reasoning);
        proposal.votes.push(vote.clone());
        proposal.status = ProposalStatus::Active;

        self.broadcast_proposal(&proposal)?;
        self.broadcast_vote(&vote)?;
        Ok(proposal)
    }
}
