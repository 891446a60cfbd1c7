//! `swarmctl`: operator tooling over the coordination core's host-surface
//! API. Every command is a thin wrapper over
//! `crate::services::{board, coordinator, consensus}` — this module adds no
//! new core semantics, only argument parsing and terminal rendering, split
//! into `commands` (handlers) and `output` (rendering).

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Operator CLI over a swarm coordination process's task board, event bus,
/// and consensus log.
#[derive(Parser)]
#[command(name = "swarmctl")]
#[command(about = "Swarm Core operator CLI: task board, event bus, consensus channel")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output machine-readable JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the task board's storage root (defaults to config/`.swarm/board`).
    #[arg(long, global = true)]
    pub board_root: Option<PathBuf>,

    /// Override the consensus log path (defaults to config/`.swarm/consensus.log`).
    #[arg(long, global = true)]
    pub log_path: Option<PathBuf>,

    /// Load configuration from this file instead of the project's `.swarm/` directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Task board operations: post, claim, complete, and inspect work items.
    #[command(subcommand)]
    Board(BoardCommands),

    /// Map/reduce fan-out and aggregation over the task board.
    #[command(subcommand)]
    Coordinator(CoordinatorCommands),

    /// Event bus operations. The bus is in-process only: `demo` runs a
    /// short-lived subscriber within the command itself to show wildcard
    /// routing; there is no persistent daemon to publish into.
    #[command(subcommand)]
    Bus(BusCommands),

    /// Consensus channel operations: propose, vote, and evaluate.
    #[command(subcommand)]
    Consensus(ConsensusCommands),

    /// Run a claim/execute/complete loop against the board until it is
    /// drained. Not part of the public surface; used by process-level
    /// concurrency tests and as a minimal standalone worker.
    #[command(hide = true)]
    WorkerLoop {
        /// This worker's node id, recorded as `claimed_by`.
        #[arg(long)]
        node_id: String,

        /// Stop after this many completed tasks (0 = run until drained).
        #[arg(long, default_value_t = 0)]
        max_tasks: usize,
    },
}

#[derive(Subcommand)]
pub enum BoardCommands {
    /// Post a new task.
    Post {
        id: String,
        kind: String,
        description: String,
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// JSON object literal for the task payload.
        #[arg(long, default_value = "{}")]
        payload: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Fetch one task by id.
    Get { id: String },
    /// Claim a pending task.
    Claim {
        id: String,
        #[arg(long)]
        node_id: String,
    },
    /// Advance a claimed task to in-progress.
    Start { id: String },
    /// Complete a claimed/in-progress task.
    Complete {
        id: String,
        /// JSON object literal for the result.
        #[arg(long, default_value = "{}")]
        result: String,
    },
    /// Fail a claimed/in-progress task.
    Fail {
        id: String,
        #[arg(long)]
        error: String,
    },
    /// Cancel a non-terminal task.
    Cancel { id: String },
    /// List pending tasks, sorted by priority then creation time.
    Pending,
    /// List every task on the board, regardless of status.
    List,
    /// Reclaim stale claims older than `timeout_secs` back to pending.
    ReclaimStale {
        #[arg(long)]
        timeout_secs: f64,
    },
}

#[derive(Subcommand)]
pub enum CoordinatorCommands {
    /// Post one subtask per `--payload` occurrence under a fresh parent id.
    Map {
        kind: String,
        description: String,
        #[arg(long = "payload", required = true)]
        payloads: Vec<String>,
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// Fold a map group's completed subtasks using the named strategy.
    Reduce {
        parent_id: String,
        /// One of: first, best-score, merge-all, majority-vote.
        strategy: String,
        /// Required for best-score/majority-vote: the payload key to compare.
        #[arg(long)]
        key: Option<String>,
    },
    /// Aggregate counts for a map group's subtasks.
    Progress { parent_id: String },
}

#[derive(Subcommand)]
pub enum BusCommands {
    /// Subscribe to `task.**` and `task.claimed`, publish a short run of
    /// task/build signals, and print what each subscriber received.
    Demo,
}

#[derive(Subcommand)]
pub enum ConsensusCommands {
    /// Create a proposal, cast the proposer's own vote, and append both.
    Propose {
        title: String,
        description: String,
        #[arg(long)]
        node_id: String,
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        confidence: f64,
        #[arg(long, default_value = "")]
        reasoning: String,
    },
    /// Cast a vote on an existing proposal.
    Vote {
        proposal_id: String,
        #[arg(long)]
        node_id: String,
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        confidence: f64,
        #[arg(long, default_value = "")]
        reasoning: String,
    },
    /// Evaluate a proposal's weighted-confidence approval.
    Evaluate {
        proposal_id: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// List every proposal recorded on the log.
    List,
}
