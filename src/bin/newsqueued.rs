//! Thin runner binary: wires a `Queue` to its configured servers, a
//! threaded `SocketCreator`, and a periodic upkeep tick.
//!
//! This is wiring, not scheduler logic — see `SPEC_FULL.md` §2. Task
//! implementations (article downloads, posts, ...) are out of scope for
//! this crate; an embedding client links `newsqueue` as a library and adds
//! its own `Task`s via `Queue::add_task` before starting the upkeep loop
//! below. With none added, this binary just keeps the scheduler's plumbing
//! (socket creation, idle reaping, debounced persistence) alive against
//! real servers from a config file — useful for smoke-testing connectivity.

use clap::Parser;
use log::info;
use newsqueue::{AppConfig, NullArchive, Queue, QueueConfig, ThreadedSocketCreator};
use std::fs;
use std::rc::Rc;
use std::thread;
use tacho::Tacho;

#[derive(Parser)]
#[command(name = "newsqueued", about = "Task-scheduling core for an NNTP client", version)]
struct Opts {
    /// Path to a YAML or JSON configuration file.
    config_path: String,
}

fn main() {
    env_logger::init();

    let opts = Opts::parse();
    let config_str = fs::read_to_string(&opts.config_path).expect("could not read config file");
    let config = newsqueue::config::from_str(&config_str).expect("configuration error");

    run(config).expect("newsqueued failed");
}

fn run(config: AppConfig) -> newsqueue::Result<()> {
    let creator = Rc::new(ThreadedSocketCreator::new(&config.tls_trust_roots)?);

    // This thin runner has no admin/reporting endpoint to scrape the
    // aggregator from (see SPEC_FULL.md's UI non-goal), so it's dropped
    // here; an embedder wiring up real reporting passes its own live
    // `tacho::Scope` into `QueueConfig::metrics` instead.
    let Tacho { metrics, aggregator, report } = Tacho::default();
    drop(aggregator);
    drop(report);

    let queue_config = QueueConfig {
        servers: config.servers.clone(),
        online: true,
        save_interval: config.save_interval(),
        idle_timeout: config.idle_timeout(),
        metrics,
    };

    // No concrete `Task` type is known at this layer (see SPEC_FULL.md
    // §6), so this runner has nothing to persist; an embedder with a real
    // task type passes a `FileArchive<T>` here instead.
    let queue = Queue::new(queue_config, Box::new(NullArchive), creator)?;

    info!("newsqueued running with {} configured server(s)", config.servers.len());

    let upkeep_interval = config.upkeep_interval();
    loop {
        thread::sleep(upkeep_interval);
        queue.upkeep();
    }
}
