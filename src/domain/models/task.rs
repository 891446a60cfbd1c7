//! The unit of work tracked by a [`crate::services::board::TaskBoard`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A mapping from string keys to opaque JSON values.
///
/// Payloads and results are caller-defined; the core never inspects their
/// contents beyond the reserved keys it writes itself (`parent_id` on
/// map/reduce subtasks, `error` on failure).
pub type PayloadMap = Map<String, Value>;

/// Lifecycle state of a [`Task`].
///
/// Transitions form a DAG: `Pending -> Claimed -> InProgress -> (Completed |
/// Failed)`, with `Cancelled` reachable from any non-terminal state. There is
/// no backward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Claimed,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether this status has no further legal transitions other than
    /// `Cancelled`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// True if `Complete`/`Fail` may be called from this status: permitted
    /// from either `Claimed` or `InProgress`.
    pub const fn is_claimed_or_running(self) -> bool {
        matches!(self, Self::Claimed | Self::InProgress)
    }

    /// True if `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use TaskStatus::{Cancelled, Claimed, Completed, Failed, InProgress, Pending};
        match (self, next) {
            (Pending, Claimed)
            | (Claimed, InProgress)
            | (Claimed, Completed)
            | (Claimed, Failed)
            | (InProgress, Completed)
            | (InProgress, Failed) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// A unit of work posted to a [`crate::services::board::TaskBoard`].
///
/// Field names and serialized forms follow the board's on-disk JSON schema
/// exactly (`task_id`, `task_type`, ...) so that files written by one
/// implementation are readable by another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "task_id")]
    pub id: String,

    /// Host-defined work category. The core never interprets this value;
    /// it only uses it to route tasks to agent capabilities.
    #[serde(rename = "task_type")]
    pub kind: String,

    pub description: String,

    pub status: TaskStatus,

    /// Lower is more urgent.
    pub priority: i64,

    /// Unix epoch seconds.
    pub created_at: f64,

    pub claimed_by: Option<String>,

    /// Unix epoch seconds.
    pub claimed_at: Option<f64>,

    pub result: Option<PayloadMap>,

    pub payload: PayloadMap,
}

impl Task {
    /// Build a new `Pending` task stamped with the current wall-clock time.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        priority: i64,
        payload: PayloadMap,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority,
            created_at: epoch_now(),
            claimed_by: None,
            claimed_at: None,
            result: None,
            payload,
        }
    }

    /// The `parent_id` carried in `payload` for a map/reduce subtask, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.payload.get("parent_id").and_then(Value::as_str)
    }
}

/// Current wall-clock time as Unix epoch seconds.
///
/// The board's on-disk schema fixes timestamps as JSON numbers, so the
/// domain model stores epoch floats rather than an RFC-3339 string.
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("t1", "ANALYZE", "do the thing", 5, PayloadMap::new())
    }

    #[test]
    fn new_task_is_pending_and_unclaimed() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.claimed_by.is_none());
        assert!(t.claimed_at.is_none());
        assert!(t.result.is_none());
    }

    #[test]
    fn forward_transitions_are_legal() {
        use TaskStatus::{Claimed, Completed, Failed, InProgress, Pending};
        assert!(Pending.can_transition_to(Claimed));
        assert!(Claimed.can_transition_to(InProgress));
        assert!(Claimed.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        use TaskStatus::{Claimed, Completed, Pending};
        assert!(!Completed.can_transition_to(Claimed));
        assert!(!Claimed.can_transition_to(Pending));
    }

    #[test]
    fn cancel_is_legal_from_any_non_terminal_state() {
        use TaskStatus::{Cancelled, Claimed, Completed, InProgress, Pending};
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Claimed.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn status_round_trips_to_screaming_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskStatus::InProgress);
    }

    #[test]
    fn task_serializes_with_wire_field_names() {
        let t = task();
        let v: Value = serde_json::to_value(&t).unwrap();
        assert!(v.get("task_id").is_some());
        assert!(v.get("task_type").is_some());
        assert!(v.get("id").is_none());
        assert!(v.get("kind").is_none());
    }

    #[test]
    fn only_claimed_and_in_progress_accept_complete_or_fail() {
        use TaskStatus::{Claimed, Completed, InProgress, Pending};
        assert!(Claimed.is_claimed_or_running());
        assert!(InProgress.is_claimed_or_running());
        assert!(!Pending.is_claimed_or_running());
        assert!(!Completed.is_claimed_or_running());
    }

    #[test]
    fn parent_id_reads_through_payload() {
        let mut payload = PayloadMap::new();
        payload.insert("parent_id".to_string(), Value::String("p1".to_string()));
        let t = Task::new("t2", "EXPLORE", "desc", 0, payload);
        assert_eq!(t.parent_id(), Some("p1"));
    }
}
