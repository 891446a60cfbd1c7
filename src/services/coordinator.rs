//! Map/reduce fan-out and result aggregation over a [`TaskBoard`].
//!
//! Grounded on `systems/swarm/swarm_coordinator.py` and `reduction.py`; a
//! stateless helper that mints a `parent_id`, posts subtasks tagged with it,
//! and later folds their completed results.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::error::CoreResult;
use crate::domain::models::task::{PayloadMap, Task};
use crate::services::board::TaskBoard;

/// A named result-folding strategy for [`Coordinator::reduce`].
#[derive(Debug, Clone)]
pub enum ReduceStrategy {
    /// The first completed result, by scan order.
    First,
    /// The result with the highest `score_key` value; ties keep the
    /// first-seen result.
    BestScore { score_key: String },
    /// For every key seen across all results, concatenate values into a
    /// list; a scalar value becomes a one-element list.
    MergeAll,
    /// The most common `vote_key` value; ties keep the first-seen value.
    MajorityVote { vote_key: String },
}

/// Aggregate status of a map/reduce group, derived from a single board scan.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub progress_pct: f64,
    pub is_complete: bool,
}

/// Stateless map/reduce helper over a shared [`TaskBoard`].
pub struct Coordinator {
    board: Arc<TaskBoard>,
}

impl Coordinator {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self { board }
    }

    /// Mint a fresh `parent_id` and post one subtask per payload, each
    /// stamped with `payload.parent_id`. Returns immediately: execution is
    /// driven by agents polling the board.
    pub fn map(
        &self,
        kind: &str,
        description: &str,
        payloads: Vec<PayloadMap>,
        priority: i64,
    ) -> CoreResult<String> {
        let parent_id = Uuid::new_v4().to_string();
        for (i, mut payload) in payloads.into_iter().enumerate() {
            payload.insert("parent_id".into(), json!(parent_id));
            let task_id = format!("{parent_id}-{i}");
            let task = Task::new(task_id, kind, description, priority, payload);
            self.board.post(&task, false)?;
        }
        Ok(parent_id)
    }

    /// Convenience wrapper over [`Self::map`] for callers that think in
    /// terms of a single `mapreduce()` entry point: map, then return the
    /// parent id immediately. No semantics beyond [`Self::map`].
    pub fn map_reduce_start(
        &self,
        kind: &str,
        description: &str,
        payloads: Vec<PayloadMap>,
        priority: i64,
    ) -> CoreResult<String> {
        self.map(kind, description, payloads, priority)
    }

    /// Fold completed subtasks of `parent_id` using `strategy`. `None` if no
    /// subtask has completed yet. Safe to call repeatedly; pure function of
    /// current board state.
    pub fn reduce(
        &self,
        parent_id: &str,
        strategy: &ReduceStrategy,
    ) -> CoreResult<Option<PayloadMap>> {
        let results: Vec<PayloadMap> = self
            .board
            .results_by_parent(parent_id)?
            .into_iter()
            .filter_map(|t| t.result)
            .collect();

        if results.is_empty() {
            return Ok(None);
        }

        Ok(match strategy {
            ReduceStrategy::First => Some(results[0].clone()),
            ReduceStrategy::BestScore { score_key } => Some(best_score(&results, score_key)),
            ReduceStrategy::MergeAll => Some(merge_all(&results)),
            ReduceStrategy::MajorityVote { vote_key } => majority_vote(&results, vote_key),
        })
    }

    /// Aggregate counts for every subtask of `parent_id`, regardless of
    /// status.
    pub fn progress(&self, parent_id: &str) -> CoreResult<Progress> {
        let subtasks: Vec<Task> = self
            .board
            .list_all()?
            .into_iter()
            .filter(|t| t.parent_id() == Some(parent_id))
            .collect();

        let total = subtasks.len();
        let mut completed = 0;
        let mut failed = 0;
        let mut pending = 0;
        let mut in_progress = 0;
        for t in &subtasks {
            use crate::domain::models::task::TaskStatus::{
                Cancelled, Claimed, Completed, Failed, InProgress, Pending,
            };
            match t.status {
                Pending => pending += 1,
                Claimed | InProgress => in_progress += 1,
                Completed => completed += 1,
                // Cancelled subtasks will never complete; counted with
                // `failed` so the buckets always sum to `total`.
                Failed | Cancelled => failed += 1,
            }
        }

        let progress_pct = if total == 0 {
            0.0
        } else {
            (completed + failed) as f64 / total as f64 * 100.0
        };

        Ok(Progress {
            total,
            completed,
            failed,
            pending,
            in_progress,
            progress_pct,
            is_complete: total > 0 && pending == 0 && in_progress == 0,
        })
    }
}

fn best_score(results: &[PayloadMap], score_key: &str) -> PayloadMap {
    let mut best = &results[0];
    let mut best_score = score_of(best, score_key);
    for result in &results[1..] {
        let score = score_of(result, score_key);
        if score > best_score {
            best = result;
            best_score = score;
        }
    }
    best.clone()
}

fn score_of(result: &PayloadMap, score_key: &str) -> f64 {
    result.get(score_key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn merge_all(results: &[PayloadMap]) -> PayloadMap {
    let mut merged = PayloadMap::new();
    for result in results {
        for (key, value) in result {
            let entry = merged.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                if let Value::Array(items) = value {
                    list.extend(items.clone());
                } else {
                    list.push(value.clone());
                }
            }
        }
    }
    merged
}

fn majority_vote(results: &[PayloadMap], vote_key: &str) -> Option<PayloadMap> {
    let mut seen: Vec<(Value, usize)> = Vec::new();
    for result in results {
        let Some(vote) = result.get(vote_key) else {
            continue;
        };
        match seen.iter_mut().find(|(v, _)| v == vote) {
            Some((_, count)) => *count += 1,
            None => seen.push((vote.clone(), 1)),
        }
    }

    // `Iterator::max_by_key` returns the *last* maximum on a tie; ties here
    // break by first-seen, so scan manually keeping only strictly-greater
    // counts.
    let mut winner: Option<(Value, usize)> = None;
    for (value, count) in seen {
        if winner.as_ref().is_none_or(|(_, best)| count > *best) {
            winner = Some((value, count));
        }
    }

    // No result carries `vote_key` at all: fall back to the first result,
    // matching the original's `results[0]` default.
    let Some((winning_vote, _)) = winner else {
        return Some(results[0].clone());
    };

    // Return the first full result carrying the winning vote, not a
    // one-key reconstruction.
    results
        .iter()
        .find(|r| r.get(vote_key) == Some(&winning_vote))
        .cloned()
}
