//! The queue's ordered list of task ids.
//!
//! `TaskList` only knows about ids and ordering; it has no idea what a
//! task is or does. The `Queue` is its sole owner and sole listener: it
//! reacts to the `ListChange` a mutator returns by flipping `needs_saving`
//! and re-emitting a corresponding `QueueEvent` to its own listeners.

use crate::queue::TaskId;

/// Describes how list order changed, for the owning `Queue` to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange {
    Added { pos: usize, count: usize },
    Removed { task: TaskId, pos: usize },
    Moved { task: TaskId, old_pos: usize, new_pos: usize },
}

#[derive(Default)]
pub struct TaskList {
    order: Vec<TaskId>,
}

impl TaskList {
    pub fn new() -> TaskList {
        TaskList { order: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.order.iter().copied()
    }

    pub fn index_of(&self, id: TaskId) -> Option<usize> {
        self.order.iter().position(|&t| t == id)
    }

    pub fn add_top(&mut self, ids: &[TaskId]) -> ListChange {
        for (i, &id) in ids.iter().enumerate() {
            self.order.insert(i, id);
        }
        ListChange::Added {
            pos: 0,
            count: ids.len(),
        }
    }

    pub fn add_bottom(&mut self, ids: &[TaskId]) -> ListChange {
        let pos = self.order.len();
        self.order.extend_from_slice(ids);
        ListChange::Added {
            pos,
            count: ids.len(),
        }
    }

    /// The list's native insertion point; this crate treats that as bottom.
    pub fn add_default(&mut self, ids: &[TaskId]) -> ListChange {
        self.add_bottom(ids)
    }

    pub fn remove(&mut self, id: TaskId) -> Option<ListChange> {
        let pos = self.index_of(id)?;
        self.order.remove(pos);
        Some(ListChange::Removed { task: id, pos })
    }

    pub fn move_up(&mut self, id: TaskId) -> Option<ListChange> {
        let pos = self.index_of(id)?;
        if pos == 0 {
            return None;
        }
        self.order.swap(pos, pos - 1);
        Some(ListChange::Moved {
            task: id,
            old_pos: pos,
            new_pos: pos - 1,
        })
    }

    pub fn move_down(&mut self, id: TaskId) -> Option<ListChange> {
        let pos = self.index_of(id)?;
        if pos + 1 >= self.order.len() {
            return None;
        }
        self.order.swap(pos, pos + 1);
        Some(ListChange::Moved {
            task: id,
            old_pos: pos,
            new_pos: pos + 1,
        })
    }

    pub fn move_top(&mut self, id: TaskId) -> Option<ListChange> {
        let pos = self.index_of(id)?;
        if pos == 0 {
            return None;
        }
        self.order.remove(pos);
        self.order.insert(0, id);
        Some(ListChange::Moved {
            task: id,
            old_pos: pos,
            new_pos: 0,
        })
    }

    pub fn move_bottom(&mut self, id: TaskId) -> Option<ListChange> {
        let pos = self.index_of(id)?;
        let last = self.order.len() - 1;
        if pos == last {
            return None;
        }
        self.order.remove(pos);
        self.order.push(id);
        Some(ListChange::Moved {
            task: id,
            old_pos: pos,
            new_pos: last,
        })
    }
}
