use crate::interner::ServerId;
use crate::pool::ConnHandle;
use crate::queue::Queue;
use indexmap::IndexSet;

/// Where a new task lands relative to the existing queue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddMode {
    Top,
    Bottom,
    /// The task list's native insertion point (bottom, for this crate).
    Default,
}

/// A task's progress toward completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkState {
    Initial,
    NeedNntp,
    Working,
    Completed,
}

/// A task's willingness to be retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Health {
    Ok,
    Retry,
    Fail,
}

/// A snapshot of a task's schedulability, returned on demand by `Task::state`.
///
/// `get_state` must be cheap, idempotent, and side-effect-free: the
/// scheduler calls it repeatedly, sometimes several times per
/// `process_task` invocation.
#[derive(Clone, Debug)]
pub struct TaskState {
    pub work: WorkState,
    pub health: Health,
    /// Servers this task could make progress on. Must be non-empty
    /// whenever `work == NeedNntp`.
    pub servers: IndexSet<ServerId>,
}

impl TaskState {
    pub fn new(work: WorkState, health: Health, servers: IndexSet<ServerId>) -> TaskState {
        TaskState {
            work,
            health,
            servers,
        }
    }
}

/// A unit of user-submitted work driven by pooled connections.
///
/// Tasks are plugin-style: article downloads, posts, header fetches, and
/// so on all implement this one capability-set interface rather than a
/// class hierarchy (see DESIGN.md's note on task polymorphism).
pub trait Task {
    /// Lets archive implementations and other generic consumers recover
    /// the concrete task type from a `Rc<dyn Task>`. Not used anywhere on
    /// the scheduling hot path.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Diagnostic label only — never used for dispatch decisions.
    fn get_type(&self) -> &str;

    /// Returns the task's current schedulability. Must not mutate
    /// observable state or block.
    fn get_state(&self) -> TaskState;

    /// Hands the task a connection. `conn` is shared with the `Queue`
    /// (which needs to keep reading its speed counter for reporting) —
    /// the task should drop its clone once done rather than hold it past
    /// the matching `check_in`. The task must call
    /// `queue.check_in(conn, ok)` exactly once for this connection when it
    /// is done with it, whether that happens before this call returns or
    /// much later from other code.
    fn give_nntp(&self, queue: Queue, conn: ConnHandle);

    /// Message-id used for queue-wide duplicate-download detection.
    /// `None` for tasks that aren't article downloads.
    fn message_id(&self) -> Option<&str> {
        None
    }
}
