use std::{env, path::PathBuf};

use comms::{
    Endpoint, Inbound, MuxKind, Outbound,
    transport::{LocalWorker, bind_udp, spawn_local_worker},
};
use log::info;

use crate::{Result, WorkerSpec, WorkforceConfig};

/// Name of the worker executable started for local computation.
pub const WORKER_PROGRAM: &str = "worker";

/// Arguments putting a local worker in pipe mode for as long as we live.
pub const PIPE_ARGS: [&str; 3] = ["--pipe", "--idle-timeout", "0"];

/// A ready transport and the workers reachable through it.
pub struct Connection {
    pub roster: Vec<WorkerSpec>,
    pub inbound: Box<dyn Inbound>,
    pub outbound: Box<dyn Outbound>,
    /// The strategy configured for this kind of transport.
    pub mux: MuxKind,
    /// Port identity queries should be answered at, 0 for pipes.
    pub reply_port: u16,
    /// Keeps the local worker alive, if one was started.
    pub local: Option<LocalWorker>,
}

/// Sets up the transport for the configured workers.
///
/// A non-empty worker list gets one UDP socket shared by every worker; an
/// empty one starts a single local worker talking over a pipe.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Returns `WorkforceErr::Io` if the socket cannot be bound or the local
/// worker cannot be started.
pub fn connect(config: &WorkforceConfig) -> Result<Connection> {
    if config.workers.is_empty() {
        return connect_local(config);
    }

    let (inbound, outbound) = bind_udp(config.bind)?;
    let local_addr = inbound.local_addr()?;
    info!(
        "distributing over {} worker(s) from {local_addr}",
        config.workers.len()
    );

    let roster = config
        .workers
        .iter()
        .map(|entry| WorkerSpec {
            name: entry.name.clone(),
            endpoint: Endpoint::Net(entry.addr),
            timeout: config.timeout_of(entry),
        })
        .collect();

    Ok(Connection {
        roster,
        inbound: Box::new(inbound),
        outbound: Box::new(outbound),
        mux: config.socket_mux,
        reply_port: local_addr.port(),
        local: None,
    })
}

fn connect_local(config: &WorkforceConfig) -> Result<Connection> {
    let program = config
        .local_worker_program
        .clone()
        .unwrap_or_else(default_program);

    let (inbound, outbound, local) = spawn_local_worker(&program, PIPE_ARGS)?;

    let roster = vec![WorkerSpec {
        name: format!("local:{}", local.id()),
        endpoint: Endpoint::Pipe,
        timeout: config.timeout,
    }];

    Ok(Connection {
        roster,
        inbound: Box::new(inbound),
        outbound: Box::new(outbound),
        mux: config.pipe_mux,
        reply_port: 0,
        local: Some(local),
    })
}

/// Prefers the worker installed next to the running executable.
fn default_program() -> PathBuf {
    env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(WORKER_PROGRAM))
        .filter(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(WORKER_PROGRAM))
}
