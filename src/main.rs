//! `swarmctl` — operator CLI over a swarm coordination process.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use swarm_core::cli::{BoardCommands, BusCommands, Cli, Commands, ConsensusCommands, CoordinatorCommands};
use swarm_core::infrastructure::config::ConfigLoader;
use swarm_core::infrastructure::logging::logger::LoggerImpl;
use swarm_core::services::consensus::SwarmNode;
use swarm_core::services::coordinator::Coordinator;
use swarm_core::services::TaskBoard;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    let _logger_guard = LoggerImpl::init(&config.logging).context("failed to initialize logging")?;

    let board_root = cli.board_root.clone().unwrap_or(config.board.root.clone());
    let log_path = cli.log_path.clone().unwrap_or(config.consensus.log_path.clone());

    match cli.command {
        Commands::Board(cmd) => {
            let board = TaskBoard::new(board_root)?;
            run_board_command(&board, cmd, cli.json)?;
        }
        Commands::Coordinator(cmd) => {
            let board = Arc::new(TaskBoard::new(board_root)?);
            let coordinator = Coordinator::new(board);
            run_coordinator_command(&coordinator, cmd, cli.json)?;
        }
        Commands::Bus(BusCommands::Demo) => {
            swarm_core::cli::commands::bus_demo()?;
        }
        Commands::Consensus(cmd) => {
            run_consensus_command(log_path, config.consensus.default_threshold, cmd, cli.json)?;
        }
        Commands::WorkerLoop { node_id, max_tasks } => {
            let board = Arc::new(TaskBoard::new(board_root)?);
            swarm_core::cli::commands::worker_loop(board, node_id, max_tasks)?;
        }
    }

    Ok(())
}

fn run_board_command(board: &TaskBoard, cmd: BoardCommands, json: bool) -> Result<()> {
    use swarm_core::cli::commands::*;
    match cmd {
        BoardCommands::Post { id, kind, description, priority, payload, overwrite } => {
            board_post(board, id, kind, description, priority, &payload, overwrite, json)
        }
        BoardCommands::Get { id } => board_get(board, &id, json),
        BoardCommands::Claim { id, node_id } => board_claim(board, &id, &node_id, json),
        BoardCommands::Start { id } => board_start(board, &id, json),
        BoardCommands::Complete { id, result } => board_complete(board, &id, &result, json),
        BoardCommands::Fail { id, error } => board_fail(board, &id, error, json),
        BoardCommands::Cancel { id } => board_cancel(board, &id, json),
        BoardCommands::Pending => board_pending(board, json),
        BoardCommands::List => board_list(board, json),
        BoardCommands::ReclaimStale { timeout_secs } => board_reclaim_stale(board, timeout_secs, json),
    }
}

fn run_coordinator_command(coordinator: &Coordinator, cmd: CoordinatorCommands, json: bool) -> Result<()> {
    use swarm_core::cli::commands::*;
    match cmd {
        CoordinatorCommands::Map { kind, description, payloads, priority } => {
            coordinator_map(coordinator, &kind, &description, payloads, priority, json)
        }
        CoordinatorCommands::Reduce { parent_id, strategy, key } => {
            coordinator_reduce(coordinator, &parent_id, &strategy, key, json)
        }
        CoordinatorCommands::Progress { parent_id } => coordinator_progress(coordinator, &parent_id, json),
    }
}

fn run_consensus_command(
    log_path: std::path::PathBuf,
    default_threshold: f64,
    cmd: ConsensusCommands,
    json: bool,
) -> Result<()> {
    use swarm_core::cli::commands::*;
    match cmd {
        ConsensusCommands::Propose { title, description, node_id, approve, confidence, reasoning } => {
            let node = SwarmNode::new(node_id, log_path, default_threshold);
            consensus_propose(&node, title, description, approve, confidence, reasoning, json)
        }
        ConsensusCommands::Vote { proposal_id, node_id, approve, confidence, reasoning } => {
            let node = SwarmNode::new(node_id, log_path, default_threshold);
            consensus_vote(&node, proposal_id, approve, confidence, reasoning, json)
        }
        ConsensusCommands::Evaluate { proposal_id, threshold } => {
            let node = SwarmNode::new("swarmctl", log_path, default_threshold);
            consensus_evaluate(&node, &proposal_id, threshold, json)
        }
        ConsensusCommands::List => {
            let node = SwarmNode::new("swarmctl", log_path, default_threshold);
            consensus_list(&node, json)
        }
    }
}
