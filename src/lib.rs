//! `newsqueue`: the task-scheduling core of an NNTP client.
//!
//! A durable, ordered task list driven to completion by per-server
//! connection pools, under online/offline state, user-issued stop/
//! restart/move/remove operations, and a handful of listener events. This
//! crate owns none of the NNTP wire protocol, the concrete `Task`
//! implementations (downloads, posts, ...), or any UI — it is the
//! scheduler those things plug into.

pub mod archive;
pub mod config;
pub mod connector;
pub mod error;
pub mod interner;
pub mod listener;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod task;
pub mod task_list;

pub use archive::{FileArchive, NullArchive, TaskArchive};
pub use config::AppConfig;
pub use connector::{ServerInfo, SocketCreator, SocketEvent, ThreadedSocketCreator};
pub use error::{QueueError, Result};
pub use interner::ServerId;
pub use listener::{QueueEvent, QueueListener};
pub use metrics::QueueMetrics;
pub use pool::{ConnHandle, ConnectionPool, NntpConnection, Socket};
pub use queue::{Queue, QueueConfig, TaskId};
pub use task::{AddMode, Health, Task, TaskState, WorkState};
