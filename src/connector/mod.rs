//! Socket creation: the one part of this crate allowed to block, because
//! it always runs off the scheduler's thread.
//!
//! Grounded on `original_source/pan/tasks/socket-impl-main.cc`'s worker/main
//! split: `do_work` (connect + optional TLS handshake) runs on a detached
//! worker thread; the result is handed back to the thread that owns the
//! `Queue` as a `SocketEvent`, never touching scheduler state directly.

mod config;
pub mod tls;

pub use self::config::ServerInfo;

use crate::error::Result;
use crate::interner::ServerId;
use crate::pool::{NntpConnection, Socket};
use std::collections::HashSet;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;

/// Delivered back onto the scheduler's thread once a connection attempt
/// (successful or not) finishes on a worker thread.
pub enum SocketEvent {
    Created { server: ServerId, conn: NntpConnection },
    Failed { server: ServerId, message: String },
}

/// External collaborator that turns a configured server into a live
/// `NntpConnection`. The scheduler only ever calls `create_socket` and
/// waits for a `SocketEvent` on the channel it was given — it has no idea
/// whether that happens over TCP, TLS, or (in tests) not at all.
pub trait SocketCreator {
    fn create_socket(&self, server: &ServerInfo, events: Sender<SocketEvent>);

    /// Silently stop dialing a server. Mirrors the original's blacklist:
    /// no error, no event, just no more attempts until `unblacklist`.
    fn blacklist(&self, server: &ServerId);
    fn unblacklist(&self, server: &ServerId);
}

/// Real `SocketCreator`: one detached `std::thread` per connection attempt,
/// optionally wrapping the stream in a `rustls` client session.
pub struct ThreadedSocketCreator {
    tls_config: Option<Arc<rustls::ClientConfig>>,
    blacklisted: Mutex<HashSet<ServerId>>,
    next_conn_id: AtomicU64,
}

impl ThreadedSocketCreator {
    pub fn new(extra_pem_paths: &[String]) -> Result<ThreadedSocketCreator> {
        let tls_config = if extra_pem_paths.is_empty() {
            None
        } else {
            Some(tls::build_client_config(extra_pem_paths)?)
        };
        Ok(ThreadedSocketCreator {
            tls_config,
            blacklisted: Mutex::new(HashSet::new()),
            next_conn_id: AtomicU64::new(1),
        })
    }

    fn do_work(server: &ServerInfo, tls_config: Option<Arc<rustls::ClientConfig>>) -> io::Result<Socket> {
        let stream = TcpStream::connect((server.host.as_str(), server.port))?;
        if server.tls {
            let config = tls_config
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no TLS configuration loaded"))?;
            let server_name = rustls::pki_types::ServerName::try_from(server.host.clone())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
            let conn = rustls::ClientConnection::new(config, server_name)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            let mut tls_stream = rustls::StreamOwned::new(conn, stream);
            tls_stream.flush()?;
            Ok(Socket::new(tls_stream))
        } else {
            Ok(Socket::new(stream))
        }
    }
}

impl SocketCreator for ThreadedSocketCreator {
    fn create_socket(&self, server: &ServerInfo, events: Sender<SocketEvent>) {
        let id = server.server_id();
        if self.blacklisted.lock().expect("blacklist poisoned").contains(&id) {
            return;
        }
        let server = server.clone();
        let tls_config = self.tls_config.clone();
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        thread::spawn(move || {
            let event = match Self::do_work(&server, tls_config) {
                Ok(socket) => {
                    let conn = NntpConnection::new(conn_id, server.server_id(), socket);
                    SocketEvent::Created {
                        server: server.server_id(),
                        conn,
                    }
                }
                Err(e) => SocketEvent::Failed {
                    server: server.server_id(),
                    message: e.to_string(),
                },
            };
            // The receiving end outliving every worker thread isn't
            // guaranteed (the Queue can be dropped mid-flight); a failed
            // send just means nobody's listening anymore.
            let _ = events.send(event);
        });
    }

    fn blacklist(&self, server: &ServerId) {
        self.blacklisted
            .lock()
            .expect("blacklist poisoned")
            .insert(server.clone());
    }

    fn unblacklist(&self, server: &ServerId) {
        self.blacklisted
            .lock()
            .expect("blacklist poisoned")
            .remove(server);
    }
}
