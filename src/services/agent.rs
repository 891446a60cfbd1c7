//! Polling/reactive worker that claims, executes, and reports on tasks.
//!
//! Grounded on `systems/swarm/swarm_agent.py`'s `work_cycle`. The original
//! additionally consults an `EpisodicMemory` around execution; memory is out
//! of scope here, so only the hook point survives as `before_execute`/
//! `after_complete` observer callbacks a host can wire its own memory system
//! into.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::task::{PayloadMap, Task};
use crate::services::board::TaskBoard;
use crate::services::bus::Bus;

/// Produces a result mapping for a claimed task, or fails with the error
/// text recorded via `TaskBoard::fail`.
pub type Handler = Arc<dyn Fn(&Task) -> CoreResult<PayloadMap> + Send + Sync>;

/// Observer invoked just before a claimed task's handler runs.
pub type BeforeExecuteHook = Arc<dyn Fn(&Task) + Send + Sync>;

/// Observer invoked just after a task completes successfully.
pub type AfterCompleteHook = Arc<dyn Fn(&Task, &PayloadMap) + Send + Sync>;

/// A coordination object that pulls work from a [`TaskBoard`] and optionally
/// reacts to a [`Bus`].
pub struct SwarmAgent {
    node_id: String,
    board: Arc<TaskBoard>,
    /// `None` means the agent accepts every task kind.
    capabilities: Option<Vec<String>>,
    handlers: HashMap<String, Handler>,
    bus: Option<Arc<Bus>>,
    before_execute: Option<BeforeExecuteHook>,
    after_complete: Option<AfterCompleteHook>,
}

impl SwarmAgent {
    pub fn new(node_id: impl Into<String>, board: Arc<TaskBoard>) -> Self {
        Self {
            node_id: node_id.into(),
            board,
            capabilities: None,
            handlers: HashMap::new(),
            bus: None,
            before_execute: None,
            after_complete: None,
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    #[must_use]
    pub fn with_handler(mut self, kind: impl Into<String>, handler: Handler) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: Arc<Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_before_execute(mut self, hook: BeforeExecuteHook) -> Self {
        self.before_execute = Some(hook);
        self
    }

    #[must_use]
    pub fn with_after_complete(mut self, hook: AfterCompleteHook) -> Self {
        self.after_complete = Some(hook);
        self
    }

    fn can_handle(&self, kind: &str) -> bool {
        self.capabilities
            .as_ref()
            .is_none_or(|caps| caps.iter().any(|c| c == kind))
    }

    /// One claim+execute+complete/fail sequence.
    ///
    /// Scans `Pending()` for the first task this agent can handle, attempts
    /// to claim it, and on success runs it to a terminal state. Returns
    /// `None` if nothing could be claimed; races lost to other claimants are
    /// not errors, the scan simply continues to the next candidate.
    pub fn work_cycle(&self) -> CoreResult<Option<Task>> {
        for task in self.board.pending()? {
            if !self.can_handle(&task.kind) {
                continue;
            }
            match self.board.claim(&task.id, &self.node_id) {
                Ok(claimed) => return self.execute(claimed).map(Some),
                Err(e) if e.is_already_claimed() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn execute(&self, task: Task) -> CoreResult<Task> {
        self.board.start(&task.id)?;

        if let Some(hook) = &self.before_execute {
            hook(&task);
        }

        let Some(handler) = self.handlers.get(&task.kind) else {
            return self.board.fail(
                &task.id,
                format!("no handler registered for task kind {}", task.kind),
            );
        };

        match handler(&task) {
            Ok(result) => {
                let completed = self.board.complete(&task.id, result.clone())?;
                if let Some(hook) = &self.after_complete {
                    hook(&completed, &result);
                }
                Ok(completed)
            }
            Err(e) => self.board.fail(&task.id, e.to_string()),
        }
    }

    /// Subscribe to `task.available` and run a deferred [`Self::work_cycle`]
    /// on each notification.
    ///
    /// The claim attempt is scheduled on a fresh task via `tokio::spawn`
    /// after a short sleep rather than run inline, so it never re-enters the
    /// board lock held by the publishing `Post`/`Claim` call (mirroring the
    /// original's 10 ms `threading.Timer`).
    pub fn subscribe_auto_claim(self: &Arc<Self>) -> CoreResult<String> {
        let bus = self.bus.clone().ok_or_else(|| {
            CoreError::InvalidState("agent has no bus to subscribe auto-claim on".into())
        })?;
        let agent = Arc::clone(self);
        bus.subscribe(
            "task.available",
            Arc::new(move |_signal| {
                let agent = Arc::clone(&agent);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    if let Err(e) = agent.work_cycle() {
                        tracing::warn!(error = %e, "auto-claim work cycle failed");
                    }
                });
                Ok(())
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn board() -> (Arc<TaskBoard>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (Arc::new(TaskBoard::new(dir.path()).unwrap()), dir)
    }

    #[test]
    fn work_cycle_claims_executes_and_completes() {
        let (board, _dir) = board();
        board
            .post(
                &Task::new("t1", "ANALYZE", "d", 5, PayloadMap::new()),
                false,
            )
            .unwrap();

        let handler: Handler = Arc::new(|task| {
            let mut result = PayloadMap::new();
            result.insert("echo".into(), json!(task.id));
            Ok(result)
        });
        let agent = SwarmAgent::new("node-a", Arc::clone(&board)).with_handler("ANALYZE", handler);

        let completed = agent.work_cycle().unwrap().unwrap();
        assert_eq!(completed.status, crate::domain::models::task::TaskStatus::Completed);
        assert_eq!(
            completed.result.unwrap().get("echo").unwrap().as_str(),
            Some("t1")
        );
    }

    #[test]
    fn work_cycle_skips_tasks_outside_capabilities() {
        let (board, _dir) = board();
        board
            .post(
                &Task::new("t1", "BUILD", "d", 5, PayloadMap::new()),
                false,
            )
            .unwrap();

        let agent = SwarmAgent::new("node-a", Arc::clone(&board))
            .with_capabilities(vec!["ANALYZE".to_string()]);
        assert!(agent.work_cycle().unwrap().is_none());
    }

    #[test]
    fn handler_failure_fails_the_task() {
        let (board, _dir) = board();
        board
            .post(
                &Task::new("t1", "ANALYZE", "d", 5, PayloadMap::new()),
                false,
            )
            .unwrap();

        let handler: Handler = Arc::new(|_task| Err(CoreError::InvalidState("boom".into())));
        let agent = SwarmAgent::new("node-a", Arc::clone(&board)).with_handler("ANALYZE", handler);

        let failed = agent.work_cycle().unwrap().unwrap();
        assert_eq!(failed.status, crate::domain::models::task::TaskStatus::Failed);
    }

    #[test]
    fn unhandled_kind_fails_the_task_rather_than_erroring_the_cycle() {
        let (board, _dir) = board();
        board
            .post(
                &Task::new("t1", "MYSTERY", "d", 5, PayloadMap::new()),
                false,
            )
            .unwrap();

        let agent = SwarmAgent::new("node-a", Arc::clone(&board));
        let failed = agent.work_cycle().unwrap().unwrap();
        assert_eq!(failed.status, crate::domain::models::task::TaskStatus::Failed);
    }
}
