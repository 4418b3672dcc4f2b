//! Metrics scopes for the queue and its pools.
//!
//! Follows the teacher's `balancer::manager::Metrics` shape: a small struct
//! of `tacho` gauges/counters built once from a `tacho::Scope` and cloned
//! (they're cheap handles) into whichever component reports through them.

use tacho::{Counter, Gauge, Scope};

#[derive(Clone)]
pub struct QueueMetrics {
    pub tasks_total: Gauge,
    pub tasks_active: Gauge,
    pub connections_active: Gauge,
    pub connections_idle: Gauge,
    pub connections_pending: Gauge,
    pub saves: Counter,
    pub save_failures: Counter,
    pub socket_failures: Counter,
}

impl QueueMetrics {
    pub fn new(scope: Scope) -> QueueMetrics {
        let scope = scope.clone().prefixed("queue");
        QueueMetrics {
            tasks_total: scope.gauge("tasks_total"),
            tasks_active: scope.gauge("tasks_active"),
            connections_active: scope.gauge("connections_active"),
            connections_idle: scope.gauge("connections_idle"),
            connections_pending: scope.gauge("connections_pending"),
            saves: scope.counter("saves"),
            save_failures: scope.counter("save_failures"),
            socket_failures: scope.counter("socket_failures"),
        }
    }
}
