//! Distributes chunks of an image computation over a pool of workers.

mod client;
pub mod config;
mod connect;
mod engine;
pub mod error;
mod queue;
mod stats;

pub use client::{Client, Owner};
pub use config::{WorkerEntry, WorkforceConfig};
pub use connect::{Connection, PIPE_ARGS, WORKER_PROGRAM, connect};
pub use engine::{ChunkHandle, MAX_CHUNKS, WorkerSpec, Workforce};
pub use error::{Result, WorkforceErr};
pub use stats::{Counters, Stats, WorkerStats};
