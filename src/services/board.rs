//! Durable, file-backed, single-claim task store.
//!
//! Grounded on `systems/swarm/task_board.py`: one JSON file per task under a
//! storage root, mutations serialized by an advisory exclusive lock on a
//! sentinel file. `fcntl.flock` becomes [`fs2::FileExt`] here.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde_json::json;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::task::{epoch_now, PayloadMap, Task, TaskStatus};
use crate::services::bus::Bus;

/// A durable store of [`Task`] records rooted at a storage directory.
///
/// Every mutating operation, and every scan, is performed while holding an
/// exclusive lock on `<root>/.board.lock`, so the critical section is
/// bounded by one operation rather than the board's lifetime.
pub struct TaskBoard {
    root: PathBuf,
    bus: Option<Arc<Bus>>,
}

impl TaskBoard {
    /// Open (creating if necessary) a board rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, bus: None })
    }

    /// Attach a bus that lifecycle events (`task.available`, `task.claimed`,
    /// ...) are published to. Without one, the board is silent.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(".board.lock")
    }

    fn task_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;
        let result = f();
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn read_task_file(path: &Path) -> CoreResult<Task> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::CorruptRecord(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| CoreError::CorruptRecord(format!("{}: {e}", path.display())))
    }

    fn read_task(&self, id: &str) -> CoreResult<Task> {
        let path = self.task_path(id);
        if !path.exists() {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Self::read_task_file(&path)
    }

    fn write_task(&self, task: &Task) -> CoreResult<()> {
        let path = self.task_path(&task.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(task)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Defensive snapshot of every parseable task file, corrupt files
    /// silently skipped. Callers holding the lock already must not call
    /// this re-entrantly; use the private scan helpers instead.
    fn scan(&self) -> CoreResult<Vec<Task>> {
        let mut tasks = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(task) = Self::read_task_file(&path) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    fn emit(&self, topic: &str, payload: PayloadMap) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.publish(topic, payload, None) {
                tracing::warn!(error = %e, topic, "failed to emit board event");
            }
        }
    }

    /// Persist a new task. Fails with [`CoreError::InvalidState`] if the id
    /// already exists and `overwrite` is false.
    pub fn post(&self, task: &Task, overwrite: bool) -> CoreResult<()> {
        self.with_lock(|| {
            if self.task_path(&task.id).exists() && !overwrite {
                return Err(CoreError::InvalidState(format!(
                    "task {} already exists",
                    task.id
                )));
            }
            self.write_task(task)
        })?;

        let mut payload = PayloadMap::new();
        payload.insert("task_id".into(), json!(task.id));
        payload.insert("task_type".into(), json!(task.kind));
        payload.insert("description".into(), json!(task.description));
        payload.insert("priority".into(), json!(task.priority));
        self.emit("task.available", payload);
        Ok(())
    }

    /// Read a single task by id.
    pub fn get(&self, id: &str) -> CoreResult<Task> {
        self.with_lock(|| self.read_task(id))
    }

    /// Atomically claim a `Pending` task for `node_id`.
    ///
    /// Exactly one concurrent caller across any number of processes racing
    /// on the same task id succeeds; the rest observe
    /// [`CoreError::AlreadyClaimed`].
    pub fn claim(&self, id: &str, node_id: &str) -> CoreResult<Task> {
        let task = self.with_lock(|| {
            let mut task = self.read_task(id)?;
            if task.status != TaskStatus::Pending {
                return Err(CoreError::AlreadyClaimed(id.to_string()));
            }
            task.status = TaskStatus::Claimed;
            task.claimed_by = Some(node_id.to_string());
            task.claimed_at = Some(epoch_now());
            self.write_task(&task)?;
            Ok(task)
        })?;

        let mut payload = PayloadMap::new();
        payload.insert("task_id".into(), json!(task.id));
        payload.insert("claimed_by".into(), json!(node_id));
        self.emit("task.claimed", payload);
        Ok(task)
    }

    /// `Claimed -> InProgress`.
    pub fn start(&self, id: &str) -> CoreResult<Task> {
        self.with_lock(|| {
            let mut task = self.read_task(id)?;
            if task.status != TaskStatus::Claimed {
                return Err(CoreError::InvalidState(format!(
                    "cannot start task {id} from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::InProgress;
            self.write_task(&task)?;
            Ok(task)
        })
    }

    /// Transition a `Claimed`/`InProgress` task to `Completed`, recording
    /// `result`. Advances `Claimed -> InProgress` first if needed.
    pub fn complete(&self, id: &str, result: PayloadMap) -> CoreResult<Task> {
        let task = self.with_lock(|| {
            let mut task = self.read_task(id)?;
            if !task.status.is_claimed_or_running() {
                return Err(CoreError::InvalidState(format!(
                    "cannot complete task {id} from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::Completed;
            task.result = Some(result);
            self.write_task(&task)?;
            Ok(task)
        })?;

        let mut payload = PayloadMap::new();
        payload.insert("task_id".into(), json!(task.id));
        payload.insert("result".into(), json!(task.result));
        self.emit("task.completed", payload);
        Ok(task)
    }

    /// Transition a `Claimed`/`InProgress` task to `Failed`, recording
    /// `{"error": error}` as the result.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> CoreResult<Task> {
        let task = self.with_lock(|| {
            let mut task = self.read_task(id)?;
            if !task.status.is_claimed_or_running() {
                return Err(CoreError::InvalidState(format!(
                    "cannot fail task {id} from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::Failed;
            let mut result = PayloadMap::new();
            result.insert("error".into(), json!(error.into()));
            task.result = Some(result);
            self.write_task(&task)?;
            Ok(task)
        })?;

        let mut payload = PayloadMap::new();
        payload.insert("task_id".into(), json!(task.id));
        payload.insert("result".into(), json!(task.result));
        self.emit("task.failed", payload);
        Ok(task)
    }

    /// Move any non-terminal task to `Cancelled`.
    pub fn cancel(&self, id: &str) -> CoreResult<Task> {
        let task = self.with_lock(|| {
            let mut task = self.read_task(id)?;
            if task.status.is_terminal() {
                return Err(CoreError::InvalidState(format!(
                    "cannot cancel task {id} from {:?}",
                    task.status
                )));
            }
            task.status = TaskStatus::Cancelled;
            self.write_task(&task)?;
            Ok(task)
        })?;

        let mut payload = PayloadMap::new();
        payload.insert("task_id".into(), json!(task.id));
        self.emit("task.cancelled", payload);
        Ok(task)
    }

    /// `Pending` tasks sorted by ascending priority, then ascending
    /// `created_at`.
    pub fn pending(&self) -> CoreResult<Vec<Task>> {
        self.with_lock(|| {
            let mut tasks: Vec<Task> = self
                .scan()?
                .into_iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .collect();
            tasks.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.created_at.total_cmp(&b.created_at))
            });
            Ok(tasks)
        })
    }

    /// All tasks whose `kind` equals `kind`.
    pub fn by_type(&self, kind: &str) -> CoreResult<Vec<Task>> {
        self.with_lock(|| Ok(self.scan()?.into_iter().filter(|t| t.kind == kind).collect()))
    }

    /// Completed tasks whose `payload.parent_id` equals `parent_id`.
    pub fn results_by_parent(&self, parent_id: &str) -> CoreResult<Vec<Task>> {
        self.with_lock(|| {
            Ok(self
                .scan()?
                .into_iter()
                .filter(|t| t.status == TaskStatus::Completed && t.parent_id() == Some(parent_id))
                .collect())
        })
    }

    /// Full snapshot of every task on the board.
    pub fn list_all(&self) -> CoreResult<Vec<Task>> {
        self.with_lock(|| self.scan())
    }

    /// Reset any `Claimed`/`InProgress` task whose `claimed_at` is older than
    /// `timeout_secs` back to `Pending`, emitting `task.reclaimed` for each.
    ///
    /// Off by default: the board never calls this on its own. Stale-claim
    /// recovery is a host policy decision; this is the optional hook for it.
    pub fn reclaim_stale(&self, timeout_secs: f64) -> CoreResult<Vec<String>> {
        let now = epoch_now();
        let reclaimed = self.with_lock(|| {
            let mut ids = Vec::new();
            for mut task in self.scan()? {
                if !task.status.is_claimed_or_running() {
                    continue;
                }
                let Some(claimed_at) = task.claimed_at else {
                    continue;
                };
                if now - claimed_at < timeout_secs {
                    continue;
                }
                task.status = TaskStatus::Pending;
                task.claimed_by = None;
                task.claimed_at = None;
                self.write_task(&task)?;
                ids.push(task.id);
            }
            Ok(ids)
        })?;

        for id in &reclaimed {
            let mut payload = PayloadMap::new();
            payload.insert("task_id".into(), json!(id));
            self.emit("task.reclaimed", payload);
        }
        Ok(reclaimed)
    }
}

/// Exposed only so integration tests can assert on the lock file's path
/// without reaching into the board's private fields.
#[doc(hidden)]
pub fn lock_file_name() -> &'static str {
    ".board.lock"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn board() -> (TaskBoard, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let board = TaskBoard::new(dir.path()).unwrap();
        (board, dir)
    }

    #[test]
    fn post_then_get_round_trips() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();
        let fetched = board.get("t1").unwrap();
        assert_eq!(fetched.id, "t1");
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[test]
    fn post_without_overwrite_rejects_duplicate() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();
        let err = board.post(&task, false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn claim_of_missing_task_is_not_found() {
        let (board, _dir) = board();
        let err = board.claim("missing", "node-a").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn only_one_claimant_wins_the_race() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();

        let board = Arc::new(board);
        let mut handles = Vec::new();
        for i in 0..10 {
            let board = Arc::clone(&board);
            handles.push(std::thread::spawn(move || {
                board.claim("t1", &format!("node-{i}")).is_ok()
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);

        let task = board.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Claimed);
        assert!(task.claimed_by.is_some());
    }

    #[test]
    fn complete_advances_claimed_through_in_progress() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();
        board.claim("t1", "node-a").unwrap();

        let mut result = PayloadMap::new();
        result.insert("done".into(), json!(true));
        let task = board.complete("t1", result).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
    }

    #[test]
    fn complete_from_pending_is_invalid_state() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();
        let err = board.complete("t1", PayloadMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn fail_records_error_in_result() {
        let (board, _dir) = board();
        let task = Task::new("t1", "ANALYZE", "desc", 5, PayloadMap::new());
        board.post(&task, false).unwrap();
        board.claim("t1", "node-a").unwrap();
        let task = board.fail("t1", "boom").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.result.unwrap().get("error").unwrap().as_str(),
            Some("boom")
        );
    }

    #[test]
    fn pending_sorts_by_priority_then_created_at() {
        let (board, _dir) = board();
        board
            .post(&Task::new("low", "K", "d", 5, PayloadMap::new()), false)
            .unwrap();
        board
            .post(&Task::new("high", "K", "d", 1, PayloadMap::new()), false)
            .unwrap();
        let pending = board.pending().unwrap();
        assert_eq!(pending[0].id, "high");
        assert_eq!(pending[1].id, "low");
    }

    #[test]
    fn corrupt_files_are_skipped_by_scans() {
        let (board, dir) = board();
        board
            .post(&Task::new("t1", "K", "d", 5, PayloadMap::new()), false)
            .unwrap();
        fs::write(dir.path().join("garbage.json"), b"not json").unwrap();
        let all = board.list_all().unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn results_by_parent_filters_completed_subtasks() {
        let (board, _dir) = board();
        let mut payload = PayloadMap::new();
        payload.insert("parent_id".into(), json!("p1"));
        board
            .post(&Task::new("t1", "K", "d", 5, payload), false)
            .unwrap();
        board.claim("t1", "node-a").unwrap();
        board.complete("t1", PayloadMap::new()).unwrap();

        let results = board.results_by_parent("p1").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "t1");
    }
}
