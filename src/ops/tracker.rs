//! Concurrency-safe registry of long-running operations.
//!
//! The tracker owns every [`Operation`] for the lifetime of the process; the
//! outside world only ever sees cloned snapshots, so observers can never race
//! with in-progress mutation. One shared instance is constructed at the
//! composition root and handed to whichever layers submit or poll work; tests
//! construct their own.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How many terminal operations are retained in history before the
/// oldest-completed ones are pruned.
pub const DEFAULT_RETENTION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

/// Snapshot of one tracked background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    /// Job category tag, e.g. "dedup-scan". At most one operation per kind
    /// runs at a time; see [`OperationTracker::is_type_running`].
    pub kind: String,
    pub description: String,
    pub state: OperationState,
    /// 0..=100.
    pub progress: u8,
    pub message: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

struct TrackedOperation {
    op: Operation,
    /// Creation order, used for deterministic listings.
    seq: u64,
    /// Order of entry into a terminal state, used for oldest-first pruning.
    terminal_seq: Option<u64>,
}

struct TrackerInner {
    ops: HashMap<String, TrackedOperation>,
    next_seq: u64,
    retention: usize,
}

/// Registry of operations behind a single lock. Every read and write of the
/// map goes through the lock; all methods are cheap, constant-time map
/// updates so progress reporting from hot scan loops stays non-blocking in
/// practice.
pub struct OperationTracker {
    inner: Mutex<TrackerInner>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                ops: HashMap::new(),
                next_seq: 0,
                retention,
            }),
        }
    }

    /// Allocate a new Pending operation and return its id. Also prunes
    /// terminal history beyond the retention bound.
    pub fn create_operation(&self, kind: &str, description: &str) -> String {
        let id = format!("op_{}", Uuid::new_v4().simple());
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.ops.insert(
            id.clone(),
            TrackedOperation {
                op: Operation {
                    id: id.clone(),
                    kind: kind.to_string(),
                    description: description.to_string(),
                    state: OperationState::Pending,
                    progress: 0,
                    message: String::new(),
                    created_at: Utc::now().to_rfc3339(),
                    started_at: None,
                    completed_at: None,
                    result: None,
                    error: None,
                },
                seq,
                terminal_seq: None,
            },
        );
        Self::prune(&mut inner);
        id
    }

    /// Pending -> Running. Returns false for unknown ids and for operations
    /// already past Pending.
    pub fn start(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(tracked) = inner.ops.get_mut(id) else {
            return false;
        };
        if tracked.op.state != OperationState::Pending {
            return false;
        }
        tracked.op.state = OperationState::Running;
        tracked.op.started_at = Some(Utc::now().to_rfc3339());
        true
    }

    /// Record progress (clamped into 0..=100) and a status message. Legal in
    /// any non-terminal state; a no-op returning false for unknown ids and
    /// terminal operations.
    pub fn update_progress(&self, id: &str, progress: i32, message: &str) -> bool {
        let mut inner = self.lock();
        let Some(tracked) = inner.ops.get_mut(id) else {
            return false;
        };
        if tracked.op.state.is_terminal() {
            return false;
        }
        tracked.op.progress = progress.clamp(0, 100) as u8;
        tracked.op.message = message.to_string();
        true
    }

    /// Transition to Completed with an optional structured result payload.
    /// Progress is forced to 100.
    pub fn complete(&self, id: &str, result: Option<Value>) -> bool {
        self.finish(id, OperationState::Completed, |op| {
            op.progress = 100;
            op.result = result;
        })
    }

    /// Transition to Failed, carrying a human-readable error message.
    pub fn fail(&self, id: &str, error: &str) -> bool {
        let error = error.to_string();
        self.finish(id, OperationState::Failed, move |op| {
            op.error = Some(error);
        })
    }

    /// Transition to Cancelled. Marks state only: the running computation is
    /// expected to poll [`Self::is_cancelled`] and exit at its next safe
    /// point, leaving progress as last reported.
    pub fn cancel(&self, id: &str) -> bool {
        self.finish(id, OperationState::Cancelled, |_| {})
    }

    pub fn get_status(&self, id: &str) -> Option<Operation> {
        self.lock().ops.get(id).map(|t| t.op.clone())
    }

    /// True once the operation has been cancelled. Unknown ids read as not
    /// cancelled.
    pub fn is_cancelled(&self, id: &str) -> bool {
        self.lock()
            .ops
            .get(id)
            .map(|t| t.op.state == OperationState::Cancelled)
            .unwrap_or(false)
    }

    /// Snapshots of all Pending and Running operations, in creation order.
    pub fn list_active(&self) -> Vec<Operation> {
        self.list(|op| !op.state.is_terminal())
    }

    /// Snapshots of every tracked operation, in creation order.
    pub fn list_all(&self) -> Vec<Operation> {
        self.list(|_| true)
    }

    /// The id of the oldest Pending/Running operation of `kind`, if any.
    /// Callers check this before submitting to enforce at-most-one concurrent
    /// job per kind; a positive answer means "already in progress", not an
    /// error.
    pub fn is_type_running(&self, kind: &str) -> Option<String> {
        let inner = self.lock();
        inner
            .ops
            .values()
            .filter(|t| t.op.kind == kind && !t.op.state.is_terminal())
            .min_by_key(|t| t.seq)
            .map(|t| t.op.id.clone())
    }

    fn finish(&self, id: &str, state: OperationState, apply: impl FnOnce(&mut Operation)) -> bool {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        let Some(tracked) = inner.ops.get_mut(id) else {
            return false;
        };
        // Terminal states are final: a transition never leaves one.
        if tracked.op.state.is_terminal() {
            return false;
        }
        tracked.op.state = state;
        tracked.op.completed_at = Some(Utc::now().to_rfc3339());
        apply(&mut tracked.op);
        tracked.terminal_seq = Some(seq);
        inner.next_seq = seq + 1;
        Self::prune(&mut inner);
        true
    }

    fn list(&self, keep: impl Fn(&Operation) -> bool) -> Vec<Operation> {
        let inner = self.lock();
        let mut tracked: Vec<&TrackedOperation> =
            inner.ops.values().filter(|t| keep(&t.op)).collect();
        tracked.sort_by_key(|t| t.seq);
        tracked.into_iter().map(|t| t.op.clone()).collect()
    }

    /// Remove the oldest-completed terminal operations until the retention
    /// bound holds. Pending/Running operations are never pruned.
    fn prune(inner: &mut TrackerInner) {
        let terminal = inner
            .ops
            .values()
            .filter(|t| t.op.state.is_terminal())
            .count();
        if terminal <= inner.retention {
            return;
        }
        let mut victims: Vec<(u64, String)> = inner
            .ops
            .values()
            .filter_map(|t| t.terminal_seq.map(|s| (s, t.op.id.clone())))
            .collect();
        victims.sort();
        for (_, id) in victims.into_iter().take(terminal - inner.retention) {
            inner.ops.remove(&id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        // A poisoned lock only happens if a holder panicked; the map itself
        // is still structurally valid, so recover rather than cascade.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}
