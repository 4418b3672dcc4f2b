use std::io;
use thiserror::Error;

/// Errors surfaced at the crate's edges: configuration, persistence, and
/// socket-creation setup. Never returned from the scheduling hot path
/// (`Queue::process_task`, `Queue::check_in`, `Queue::upkeep`) — per the
/// scheduler's error-handling policy those failures become listener events
/// or state transitions instead.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load task list: {0}")]
    ArchiveLoad(#[source] io::Error),

    #[error("failed to save task list: {0}")]
    ArchiveSave(#[source] io::Error),

    #[error("invalid TLS material: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
