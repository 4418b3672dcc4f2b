use super::TaskId;
use crate::interner::ServerId;

#[derive(Clone, Debug)]
pub struct ServerConnectionCounts {
    pub server: ServerId,
    pub active: usize,
    pub idle: usize,
    pub pending: usize,
    pub kibps: f64,
}

/// A snapshot of every task id, partitioned by the queue's bookkeeping
/// sets. A task id can appear in both `queued` (always, while it's in the
/// list) and one of `stopped`/`removing`/`running`.
#[derive(Clone, Debug, Default)]
pub struct TaskStates {
    pub queued: Vec<TaskId>,
    pub stopped: Vec<TaskId>,
    pub removing: Vec<TaskId>,
    pub running: Vec<TaskId>,
}
