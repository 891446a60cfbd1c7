//! Handlers for each `swarmctl` subcommand. Each function borrows the
//! service object it needs and returns `anyhow::Result`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::domain::models::task::{PayloadMap, Task};
use crate::services::board::TaskBoard;
use crate::services::bus::Bus;
use crate::services::consensus::SwarmNode;
use crate::services::coordinator::{Coordinator, ReduceStrategy};

use super::output;

fn parse_payload(raw: &str) -> Result<PayloadMap> {
    match serde_json::from_str::<Value>(raw).context("payload/result must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("payload/result must be a JSON object"),
    }
}

pub fn board_post(
    board: &TaskBoard,
    id: String,
    kind: String,
    description: String,
    priority: i64,
    payload: &str,
    overwrite: bool,
    json: bool,
) -> Result<()> {
    let task = Task::new(id, kind, description, priority, parse_payload(payload)?);
    board.post(&task, overwrite)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_get(board: &TaskBoard, id: &str, json: bool) -> Result<()> {
    let task = board.get(id)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_claim(board: &TaskBoard, id: &str, node_id: &str, json: bool) -> Result<()> {
    let task = board.claim(id, node_id)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_start(board: &TaskBoard, id: &str, json: bool) -> Result<()> {
    let task = board.start(id)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_complete(board: &TaskBoard, id: &str, result: &str, json: bool) -> Result<()> {
    let task = board.complete(id, parse_payload(result)?)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_fail(board: &TaskBoard, id: &str, error: String, json: bool) -> Result<()> {
    let task = board.fail(id, error)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_cancel(board: &TaskBoard, id: &str, json: bool) -> Result<()> {
    let task = board.cancel(id)?;
    output::print_task(&task, json);
    Ok(())
}

pub fn board_pending(board: &TaskBoard, json: bool) -> Result<()> {
    output::print_tasks(&board.pending()?, json);
    Ok(())
}

pub fn board_list(board: &TaskBoard, json: bool) -> Result<()> {
    output::print_tasks(&board.list_all()?, json);
    Ok(())
}

pub fn board_reclaim_stale(board: &TaskBoard, timeout_secs: f64, json: bool) -> Result<()> {
    let ids = board.reclaim_stale(timeout_secs)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else if ids.is_empty() {
        println!("no stale claims past {timeout_secs}s");
    } else {
        println!("reclaimed: {}", ids.join(", "));
    }
    Ok(())
}

pub fn coordinator_map(
    coordinator: &Coordinator,
    kind: &str,
    description: &str,
    payloads: Vec<String>,
    priority: i64,
    json: bool,
) -> Result<()> {
    let payloads: Result<Vec<PayloadMap>> = payloads.iter().map(|p| parse_payload(p)).collect();
    let parent_id = coordinator.map(kind, description, payloads?, priority)?;
    if json {
        println!("{}", serde_json::json!({ "parent_id": parent_id }));
    } else {
        println!("parent_id: {parent_id}");
    }
    Ok(())
}

fn parse_strategy(name: &str, key: Option<String>) -> Result<ReduceStrategy> {
    Ok(match name {
        "first" => ReduceStrategy::First,
        "best-score" => ReduceStrategy::BestScore {
            score_key: key.context("best-score requires --key")?,
        },
        "merge-all" => ReduceStrategy::MergeAll,
        "majority-vote" => ReduceStrategy::MajorityVote {
            vote_key: key.context("majority-vote requires --key")?,
        },
        other => bail!("unknown reduce strategy: {other}"),
    })
}

pub fn coordinator_reduce(
    coordinator: &Coordinator,
    parent_id: &str,
    strategy: &str,
    key: Option<String>,
    json: bool,
) -> Result<()> {
    let strategy = parse_strategy(strategy, key)?;
    match coordinator.reduce(parent_id, &strategy)? {
        Some(result) => println!("{}", render_map(&result, json)),
        None => println!("{}", if json { "null".to_string() } else { "no completed subtasks yet".to_string() }),
    }
    Ok(())
}

pub fn coordinator_progress(coordinator: &Coordinator, parent_id: &str, json: bool) -> Result<()> {
    let progress = coordinator.progress(parent_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        output::print_progress(&progress);
    }
    Ok(())
}

fn render_map(map: &Map<String, Value>, json: bool) -> String {
    if json {
        serde_json::to_string_pretty(map).unwrap_or_default()
    } else {
        Value::Object(map.clone()).to_string()
    }
}

pub fn bus_demo() -> Result<()> {
    let bus = Bus::new("swarmctl-demo", 100);
    let a_log = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let b_log = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));

    let a = Arc::clone(&a_log);
    bus.subscribe(
        "task.**",
        Arc::new(move |signal| {
            a.lock().unwrap().push(signal.topic.clone());
            Ok(())
        }),
    )?;
    let b = Arc::clone(&b_log);
    bus.subscribe(
        "task.claimed",
        Arc::new(move |signal| {
            b.lock().unwrap().push(signal.topic.clone());
            Ok(())
        }),
    )?;

    for topic in ["task.available", "task.claimed", "task.completed", "build.success"] {
        bus.publish(topic, Map::new(), None)?;
    }

    println!("task.** observed:     {:?}", a_log.lock().unwrap());
    println!("task.claimed observed: {:?}", b_log.lock().unwrap());
    Ok(())
}

pub fn consensus_propose(
    node: &SwarmNode,
    title: String,
    description: String,
    approve: bool,
    confidence: f64,
    reasoning: String,
    json: bool,
) -> Result<()> {
    let proposal = node.propose_and_vote(title, description, approve, confidence, reasoning, Map::new())?;
    output::print_proposal(&proposal, json);
    Ok(())
}

pub fn consensus_vote(
    node: &SwarmNode,
    proposal_id: String,
    approve: bool,
    confidence: f64,
    reasoning: String,
    json: bool,
) -> Result<()> {
    let vote = node.create_vote(proposal_id, approve, confidence, reasoning);
    node.broadcast_vote(&vote)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&vote)?);
    } else {
        println!("vote recorded: {} approve={} confidence={}", vote.proposal_id, vote.approve, vote.confidence);
    }
    Ok(())
}

pub fn consensus_evaluate(node: &SwarmNode, proposal_id: &str, threshold: Option<f64>, json: bool) -> Result<()> {
    let mut proposal = node
        .check_for_proposals()?
        .into_iter()
        .find(|p| p.id == proposal_id)
        .with_context(|| format!("no proposal with id {proposal_id}"))?;
    let outcome = node.evaluate_proposal(&mut proposal, threshold)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::print_evaluation(&proposal, &outcome);
    }
    Ok(())
}

pub fn consensus_list(node: &SwarmNode, json: bool) -> Result<()> {
    let proposals = node.check_for_proposals()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&proposals)?);
    } else {
        output::print_proposals(&proposals);
    }
    Ok(())
}

/// `swarmctl worker-loop`: claim/execute/complete until the board drains or
/// `max_tasks` completions are reached. The only handler registered echoes
/// `{"done": true, "worker": node_id}`, a fixed shape process-level tests
/// can assert on without a custom handler binary.
pub fn worker_loop(board: Arc<TaskBoard>, node_id: String, max_tasks: usize) -> Result<()> {
    use crate::services::agent::{Handler, SwarmAgent};

    let worker_id = node_id.clone();
    let handler: Handler = Arc::new(move |_task| {
        let mut result = PayloadMap::new();
        result.insert("done".into(), Value::Bool(true));
        result.insert("worker".into(), Value::String(worker_id.clone()));
        Ok(result)
    });

    let agent = SwarmAgent::new(node_id, Arc::clone(&board)).with_handler("ANALYZE", handler);

    let mut completed = 0;
    loop {
        match agent.work_cycle()? {
            Some(_) => {
                completed += 1;
                if max_tasks > 0 && completed >= max_tasks {
                    break;
                }
            }
            None => break,
        }
    }
    println!("completed {completed} task(s)");
    Ok(())
}
