use std::{io, time::Duration};

use comms::{
    BlockingMux, Datagram, Dispatch, Inbound, Multiplex, Outbound, PollMux,
    transport::{PipeInbound, PipeOutbound, bind_udp},
};
use log::info;
use tokio::time::Instant;

use crate::{
    Result, WorkerConfig,
    config::Listen,
    handler::{Handled, Handler},
};

/// Serves requests arriving from one transport until idle.
pub struct Server<O> {
    handler: Handler,
    outbound: O,
    idle_timeout: Option<Duration>,
    last_request: Instant,
    idle: bool,
}

impl<O: Outbound> Server<O> {
    /// Creates a new server.
    ///
    /// # Arguments
    /// * `handler` - The request handler.
    /// * `outbound` - Where answers are sent.
    /// * `idle_timeout` - How long to wait for requests before stopping.
    pub fn new(handler: Handler, outbound: O, idle_timeout: Option<Duration>) -> Self {
        Self {
            handler,
            outbound,
            idle_timeout,
            last_request: Instant::now(),
            idle: false,
        }
    }

    pub fn outbound(&self) -> &O {
        &self.outbound
    }
}

impl<O: Outbound> Dispatch for Server<O> {
    fn message(&mut self, datagram: Datagram) -> io::Result<()> {
        let handled = self
            .handler
            .handle(&datagram.payload, &datagram.from, &mut self.outbound)?;

        if handled != Handled::Ignored {
            self.last_request = Instant::now();
        }

        Ok(())
    }

    fn tick(&mut self) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };

        if !self.idle && self.last_request.elapsed() >= timeout {
            info!("no requests for {timeout:?}, exiting");
            self.idle = true;
        }
    }

    fn done(&self) -> bool {
        self.idle
    }
}

/// Runs the worker daemon as configured until it goes idle or its pipe closes.
///
/// # Errors
/// Returns `WorkerErr` on transport failures or requests violating the bounds.
pub async fn run(config: &WorkerConfig) -> Result<()> {
    let handler = Handler::new(std::process::id() as u16);

    match &config.listen {
        Listen::Udp(addr) => {
            let (mut inbound, outbound) = bind_udp(addr.as_str())?;
            info!("listening at {}", inbound.local_addr()?);

            let mut server = Server::new(handler, outbound, config.idle_timeout);
            PollMux::new(config.tick)
                .run(&mut inbound, &mut server)
                .await?;
        }
        Listen::Pipe => {
            let mut inbound = PipeInbound::new(tokio::io::stdin());
            let outbound = PipeOutbound::new(std::io::stdout());
            info!("serving requests on stdin");

            let mut server = Server::new(handler, outbound, config.idle_timeout);
            let ret = match config.idle_timeout {
                Some(_) => {
                    serve(&mut PollMux::new(config.tick), &mut inbound, &mut server).await
                }
                None => serve(&mut BlockingMux, &mut inbound, &mut server).await,
            };

            match ret {
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("pipe closed, exiting");
                }
                ret => ret?,
            }
        }
    }

    Ok(())
}

async fn serve(
    mux: &mut dyn Multiplex,
    inbound: &mut dyn Inbound,
    server: &mut dyn Dispatch,
) -> io::Result<()> {
    mux.run(inbound, server).await
}
