//! Observer interface for queue-wide and per-task change notifications.

use crate::queue::{Queue, TaskId};

#[derive(Clone, Debug)]
pub enum QueueEvent {
    TasksAdded { pos: usize, count: usize },
    TaskRemoved { task: TaskId, pos: usize },
    TaskMoved { task: TaskId, old_pos: usize, new_pos: usize },
    TaskActiveChanged { task: TaskId, active: bool },
    ConnectionCountChanged { total: usize },
    SizeChanged { active_tasks: usize, total_tasks: usize },
    OnlineChanged { online: bool },
    Error { message: String },
}

/// Receives notifications from a `Queue`. Implementations must not call
/// back into the `Queue` synchronously from `on_event` except through
/// read-only accessor methods — mutating calls should be deferred (e.g.
/// scheduled for the next upkeep tick) to avoid reentering the dispatch
/// loop that is already iterating listeners.
pub trait QueueListener {
    fn on_event(&mut self, queue: &Queue, event: &QueueEvent);
}
