//! A single checked-out (or idle) NNTP connection.

use crate::interner::ServerId;
use std::any::Any;
use std::time::{Duration, Instant};

/// Opaque handle to whatever transport a `SocketCreator` produced —
/// a `TcpStream`, a `rustls::StreamOwned`, or (in tests) a stub. The
/// scheduler never looks inside it; see spec's non-goal on wire parsing.
pub struct Socket(Box<dyn Any + Send>);

impl Socket {
    pub fn new<T: Any + Send>(inner: T) -> Socket {
        Socket(Box::new(inner))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }
}

/// Tracks bytes moved over a connection within the current measurement
/// window, for `get_speed_KiBps` reporting.
#[derive(Debug)]
pub struct SpeedCounter {
    bytes: u64,
    window_start: Instant,
}

impl SpeedCounter {
    fn new() -> SpeedCounter {
        SpeedCounter {
            bytes: 0,
            window_start: Instant::now(),
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.bytes += bytes as u64;
    }

    pub fn reset(&mut self) {
        self.bytes = 0;
        self.window_start = Instant::now();
    }

    pub fn kibps(&self) -> f64 {
        let elapsed = self.window_start.elapsed();
        let secs = elapsed.as_secs_f64().max(0.001);
        (self.bytes as f64 / 1024.0) / secs
    }
}

pub type ConnId = u64;

/// An established connection to one server, owned at any moment by
/// exactly one `ConnectionPool` (idle) or one `Task` (checked out).
pub struct NntpConnection {
    id: ConnId,
    server: ServerId,
    socket: Socket,
    speed: SpeedCounter,
    created_at: Instant,
}

impl NntpConnection {
    pub fn new(id: ConnId, server: ServerId, socket: Socket) -> NntpConnection {
        NntpConnection {
            id,
            server,
            socket,
            speed: SpeedCounter::new(),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn server(&self) -> &ServerId {
        &self.server
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut Socket {
        &mut self.socket
    }

    pub fn speed_kibps(&self) -> f64 {
        self.speed.kibps()
    }

    pub fn record_bytes(&mut self, n: usize) {
        self.speed.record(n);
    }

    pub fn reset_speed_counter(&mut self) {
        self.speed.reset();
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
