//! Per-server connection pools.
//!
//! A `ConnectionPool` owns idle connections and counts (not references to)
//! active and in-flight ones — the connections themselves are, while
//! active, owned by whichever task they were handed to. See spec's
//! component design for `ConnectionPool`'s contract.

mod connection;

pub use self::connection::{ConnId, NntpConnection, Socket};

use crate::connector::{ServerInfo, SocketCreator, SocketEvent};
use crate::interner::ServerId;
use log::{debug, trace, warn};
use rand::Rng;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

/// A connection shared between whichever task is using it and the `Queue`,
/// which keeps reading it for speed reporting while it's checked out.
pub type ConnHandle = Rc<RefCell<NntpConnection>>;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 60 * 60 * 1000;

#[derive(Clone, Copy, Debug, Default)]
pub struct PoolCounts {
    pub active: usize,
    pub idle: usize,
    pub pending: usize,
    pub max: usize,
}

impl PoolCounts {
    /// Idle slots not yet spoken for: the number of additional connections
    /// a task could be handed right now without dialing anything new.
    pub fn available(&self) -> usize {
        self.idle
    }

    /// Free capacity this pool could still grow into (active + idle +
    /// pending < max).
    pub fn headroom(&self) -> usize {
        self.max
            .saturating_sub(self.active + self.idle + self.pending)
    }
}

pub struct ConnectionPool {
    server: ServerId,
    info: ServerInfo,
    creator: Rc<dyn SocketCreator>,
    events_tx: Sender<SocketEvent>,
    idle: VecDeque<(NntpConnection, Instant)>,
    active: usize,
    pending: usize,
    consecutive_failures: u32,
    backoff_until: Option<Instant>,
}

impl ConnectionPool {
    pub fn new(
        info: ServerInfo,
        creator: Rc<dyn SocketCreator>,
        events_tx: Sender<SocketEvent>,
    ) -> ConnectionPool {
        ConnectionPool {
            server: info.server_id(),
            info,
            creator,
            events_tx,
            idle: VecDeque::new(),
            active: 0,
            pending: 0,
            consecutive_failures: 0,
            backoff_until: None,
        }
    }

    pub fn server(&self) -> &ServerId {
        &self.server
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            active: self.active,
            idle: self.idle.len(),
            pending: self.pending,
            max: self.info.max_connections,
        }
    }

    /// Advisory: ask for one more connection if there's room and this pool
    /// isn't backing off from recent failures. Never blocks; the result (if
    /// any) arrives later as a `SocketEvent`.
    pub fn request_nntp(&mut self) {
        let counts = self.counts();
        if counts.headroom() == 0 {
            return;
        }
        if let Some(until) = self.backoff_until {
            if Instant::now() < until {
                trace!("pool {}: still backing off, not dialing", self.server);
                return;
            }
        }
        self.pending += 1;
        debug!("pool {}: requesting a new connection", self.server);
        self.creator.create_socket(&self.info, self.events_tx.clone());
    }

    /// Hands out the longest-idle connection, if any.
    pub fn check_out(&mut self) -> Option<NntpConnection> {
        let (conn, _) = self.idle.pop_front()?;
        self.active += 1;
        Some(conn)
    }

    /// Returns a connection the task is done with. `ok` indicates whether
    /// the connection is still healthy enough to reuse.
    pub fn check_in(&mut self, mut conn: NntpConnection, ok: bool) {
        self.active = self.active.saturating_sub(1);
        if ok {
            self.consecutive_failures = 0;
            self.backoff_until = None;
            conn.reset_speed_counter();
            self.idle.push_back((conn, Instant::now()));
        } else {
            self.consecutive_failures += 1;
            let backoff_ms = self.jittered_backoff_ms();
            self.backoff_until = Some(Instant::now() + Duration::from_millis(backoff_ms));
            warn!(
                "pool {}: connection failed ({} consecutive), backing off {}ms",
                self.server, self.consecutive_failures, backoff_ms
            );
        }
    }

    /// Called when a `SocketEvent` resolves one of this pool's pending
    /// requests.
    pub(crate) fn on_created(&mut self, conn: NntpConnection) {
        self.pending = self.pending.saturating_sub(1);
        self.consecutive_failures = 0;
        self.backoff_until = None;
        self.idle.push_back((conn, Instant::now()));
    }

    pub(crate) fn on_failed(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.consecutive_failures += 1;
        let backoff_ms = self.jittered_backoff_ms();
        self.backoff_until = Some(Instant::now() + Duration::from_millis(backoff_ms));
    }

    /// Exponential backoff with full jitter (`rand::thread_rng` picks
    /// uniformly over `[0, cap]` rather than backing off for the cap every
    /// time): many pools hitting the same flaky upstream at once should not
    /// all retry in lockstep.
    fn jittered_backoff_ms(&self) -> u64 {
        let cap = BASE_BACKOFF_MS
            .saturating_mul(1u64 << self.consecutive_failures.min(20))
            .min(MAX_BACKOFF_MS);
        rand::thread_rng().gen_range(0..=cap)
    }

    /// Drops idle connections that have sat unused longer than `max_idle`.
    pub fn idle_upkeep(&mut self, max_idle: Duration) {
        let now = Instant::now();
        let before = self.idle.len();
        self.idle.retain(|(_, since)| now.duration_since(*since) < max_idle);
        let dropped = before - self.idle.len();
        if dropped > 0 {
            debug!("pool {}: reaped {} idle connection(s)", self.server, dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ServerInfo;
    use std::sync::mpsc;

    struct NullCreator;
    impl SocketCreator for NullCreator {
        fn create_socket(&self, _server: &ServerInfo, _events: Sender<SocketEvent>) {}
        fn blacklist(&self, _server: &ServerId) {}
        fn unblacklist(&self, _server: &ServerId) {}
    }

    fn server_info() -> ServerInfo {
        ServerInfo {
            id: "test".into(),
            host: "news.example.com".into(),
            port: 119,
            tls: false,
            username: None,
            password: None,
            max_connections: 2,
        }
    }

    #[test]
    fn check_out_then_check_in_recycles_the_connection() {
        let (tx, _rx) = mpsc::channel();
        let mut pool = ConnectionPool::new(server_info(), Rc::new(NullCreator), tx);
        let conn = NntpConnection::new(1, pool.server().clone(), Socket::new(()));
        pool.on_created(conn);
        assert_eq!(pool.counts().idle, 1);

        let conn = pool.check_out().unwrap();
        assert_eq!(pool.counts().active, 1);
        assert_eq!(pool.counts().idle, 0);

        pool.check_in(conn, true);
        assert_eq!(pool.counts().active, 0);
        assert_eq!(pool.counts().idle, 1);
    }

    #[test]
    fn failed_check_in_backs_off_further_requests() {
        let (tx, _rx) = mpsc::channel();
        let mut pool = ConnectionPool::new(server_info(), Rc::new(NullCreator), tx);
        let conn = NntpConnection::new(1, pool.server().clone(), Socket::new(()));
        pool.on_created(conn);
        let conn = pool.check_out().unwrap();
        pool.check_in(conn, false);
        assert_eq!(pool.consecutive_failures, 1);
        assert!(pool.backoff_until.is_some());
    }

    #[test]
    fn headroom_reflects_the_configured_max() {
        let (tx, _rx) = mpsc::channel();
        let mut pool = ConnectionPool::new(server_info(), Rc::new(NullCreator), tx);
        assert_eq!(pool.counts().headroom(), 2);
        pool.pending += 1;
        assert_eq!(pool.counts().headroom(), 1);
    }
}
