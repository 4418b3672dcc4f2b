//! Durable storage for the task list.
//!
//! The on-disk (or wherever) representation is opaque to the scheduler:
//! `Queue` only ever calls `load_tasks` once at startup and `save_tasks`
//! whenever `needs_saving` and the save interval say it's time. Any errors
//! load/save raise are edge-level `QueueError`s, logged and retried —
//! never propagated out of `process_task`/`check_in`/`upkeep`.

use crate::error::{QueueError, Result};
use crate::task::Task;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::rc::Rc;

pub trait TaskArchive {
    fn load_tasks(&self) -> Result<Vec<Rc<dyn Task>>>;
    fn save_tasks(&self, tasks: &[Rc<dyn Task>]) -> Result<()>;
}

/// An archive that does nothing, for embeddings with no persistence need
/// (or for tests that don't care about it).
pub struct NullArchive;

impl TaskArchive for NullArchive {
    fn load_tasks(&self) -> Result<Vec<Rc<dyn Task>>> {
        Ok(Vec::new())
    }

    fn save_tasks(&self, _tasks: &[Rc<dyn Task>]) -> Result<()> {
        Ok(())
    }
}

/// A JSON-backed `TaskArchive` for embeddings with exactly one concrete
/// `Task` type. Heterogeneous task kinds need a hand-rolled `TaskArchive`
/// (e.g. one that tags each record with a kind and dispatches at load
/// time) — this is the single-kind reference case.
pub struct FileArchive<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> FileArchive<T> {
    pub fn new(path: impl Into<PathBuf>) -> FileArchive<T> {
        FileArchive {
            path: path.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> TaskArchive for FileArchive<T>
where
    T: Task + Clone + Serialize + DeserializeOwned + 'static,
{
    fn load_tasks(&self) -> Result<Vec<Rc<dyn Task>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path).map_err(QueueError::ArchiveLoad)?;
        let items: Vec<T> = serde_json::from_str(&data)
            .map_err(|e| QueueError::ArchiveLoad(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(items.into_iter().map(|t| Rc::new(t) as Rc<dyn Task>).collect())
    }

    fn save_tasks(&self, tasks: &[Rc<dyn Task>]) -> Result<()> {
        let mut items = Vec::with_capacity(tasks.len());
        for task in tasks {
            let concrete = task.as_any().downcast_ref::<T>().ok_or_else(|| {
                QueueError::ArchiveSave(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "FileArchive received a task of an unexpected concrete type",
                ))
            })?;
            items.push(concrete.clone());
        }
        let data = serde_json::to_string_pretty(&items)
            .map_err(|e| QueueError::ArchiveSave(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(QueueError::ArchiveSave)?;
        }
        fs::write(&self.path, data).map_err(QueueError::ArchiveSave)?;
        Ok(())
    }
}
