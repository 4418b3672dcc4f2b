use crate::interner::ServerId;
use serde::{Deserialize, Serialize};

/// Everything a `SocketCreator` needs to dial one configured server.
/// Shared read-only between the pool and the creator — the creator never
/// mutates it, so plain cloning (not `Rc`) is simplest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ServerInfo {
    /// User-facing label, e.g. "eweka" or "eweka-backup" — the identity a
    /// `ServerId` interns. Two entries may share a `host` (a backup
    /// account on the same provider) and still get distinct pools.
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    4
}

impl ServerInfo {
    pub fn server_id(&self) -> ServerId {
        ServerId::new(&self.id)
    }
}
