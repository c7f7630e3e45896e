pub mod config;
pub mod error;
pub mod handler;
pub mod kernel;
pub mod server;

pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
pub use handler::{Handled, Handler};
pub use server::Server;
