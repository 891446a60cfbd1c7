//! Terminal rendering for `swarmctl`: comfy-table for tabular listings,
//! plain JSON for `--json`.

use comfy_table::{presets::UTF8_FULL, Cell, Table};
use console::style;

use crate::domain::models::consensus::{EvaluationResult, Proposal};
use crate::domain::models::task::{Task, TaskStatus};
use crate::services::coordinator::Progress;

fn status_cell(status: TaskStatus) -> Cell {
    let label = format!("{status:?}");
    match status {
        TaskStatus::Completed => Cell::new(label).fg(comfy_table::Color::Green),
        TaskStatus::Failed => Cell::new(label).fg(comfy_table::Color::Red),
        TaskStatus::Cancelled => Cell::new(label).fg(comfy_table::Color::DarkGrey),
        TaskStatus::Claimed | TaskStatus::InProgress => Cell::new(label).fg(comfy_table::Color::Yellow),
        TaskStatus::Pending => Cell::new(label),
    }
}

pub fn print_task(task: &Task, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(task).unwrap_or_default());
        return;
    }
    println!(
        "{} {} [{}] priority={} claimed_by={}",
        style(&task.id).bold(),
        task.kind,
        format!("{:?}", task.status),
        task.priority,
        task.claimed_by.as_deref().unwrap_or("-"),
    );
}

pub fn print_tasks(tasks: &[Task], json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(tasks).unwrap_or_default());
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "id", "kind", "status", "priority", "claimed_by", "description",
    ]);
    for task in tasks {
        table.add_row(vec![
            Cell::new(&task.id),
            Cell::new(&task.kind),
            status_cell(task.status),
            Cell::new(task.priority),
            Cell::new(task.claimed_by.as_deref().unwrap_or("-")),
            Cell::new(&task.description),
        ]);
    }
    println!("{table}");
}

pub fn print_progress(progress: &Progress) {
    println!(
        "total={} completed={} failed={} pending={} in_progress={} ({:.1}%) complete={}",
        progress.total,
        progress.completed,
        progress.failed,
        progress.pending,
        progress.in_progress,
        progress.progress_pct,
        progress.is_complete,
    );
}

pub fn print_proposal(proposal: &Proposal, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(proposal).unwrap_or_default());
        return;
    }
    println!(
        "{} \"{}\" by {} [{}] votes={}",
        style(&proposal.id).bold(),
        proposal.title,
        proposal.proposer,
        format!("{:?}", proposal.status),
        proposal.votes.len(),
    );
}

pub fn print_proposals(proposals: &[Proposal]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["id", "title", "proposer", "status", "votes"]);
    for proposal in proposals {
        table.add_row(vec![
            Cell::new(&proposal.id),
            Cell::new(&proposal.title),
            Cell::new(&proposal.proposer),
            Cell::new(format!("{:?}", proposal.status)),
            Cell::new(proposal.votes.len()),
        ]);
    }
    println!("{table}");
}

pub fn print_evaluation(proposal: &Proposal, outcome: &EvaluationResult) {
    println!(
        "{} weighted_approval={:.3} approved={} vote_count={} -> status={:?}",
        style(&proposal.id).bold(),
        outcome.weighted_approval,
        outcome.approved,
        outcome.vote_count,
        proposal.status,
    );
}
