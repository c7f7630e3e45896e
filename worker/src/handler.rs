//! Decodes incoming requests, bounds-checks them and answers.

use std::io;

use comms::{
    Endpoint, Identity, Job, Msg, Outbound, PixelWidth, ProtocolErr, WorkReply, WorkRequest,
    msg::{self, MAX_DATAGRAM},
};
use log::{debug, trace, warn};

use crate::{Result, WorkerErr, kernel};

/// Largest iteration limit whose counts still fit the two byte pixel width.
pub const MAX_ITERATION_LIMIT: u32 = u16::MAX as u32;

/// What a datagram turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A work request was computed and answered.
    Reply,
    /// An identity query was answered.
    Identity,
    /// Not addressed to a worker or not understood; nothing was sent.
    Ignored,
}

/// Per-process request handler; reuses its buffers between requests.
pub struct Handler {
    pid: u16,
    counts: Vec<u8>,
    out: Vec<u8>,
}

impl Handler {
    /// Creates a new handler.
    ///
    /// # Arguments
    /// * `pid` - The identity reported to identity queries.
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            counts: Vec::new(),
            out: Vec::with_capacity(MAX_DATAGRAM),
        }
    }

    /// Handles one incoming datagram, sending any answer through `outbound`.
    ///
    /// # Arguments
    /// * `payload` - The raw message.
    /// * `from` - Where the message came from, replies go back there.
    /// * `outbound` - The transport to answer on.
    ///
    /// # Returns
    /// What was done with the message.
    ///
    /// # Errors
    /// A `WorkerErr` if the request violates the worker's bounds or the answer
    /// could not be sent.
    pub fn handle(
        &mut self,
        payload: &[u8],
        from: &Endpoint,
        outbound: &mut dyn Outbound,
    ) -> Result<Handled> {
        let msg = match Msg::decode(payload) {
            Ok(msg) => msg,
            Err(e @ ProtocolErr::BadFormat(_)) => {
                debug!("ignoring request from {from}: {e}");
                return Ok(Handled::Ignored);
            }
            Err(e) => {
                trace!("dropping datagram from {from}: {e}");
                return Ok(Handled::Ignored);
            }
        };

        match msg {
            Msg::WorkRequest(req) => self.work(req, from, outbound),
            Msg::IdentityQuery(query) => self.identify(query, from, outbound),
            other => {
                trace!("ignoring {:?} from {from}", other.kind());
                Ok(Handled::Ignored)
            }
        }
    }

    fn work(
        &mut self,
        req: WorkRequest<'_>,
        from: &Endpoint,
        outbound: &mut dyn Outbound,
    ) -> Result<Handled> {
        let job = match Job::from_bytes(req.params) {
            Ok(job) => job,
            Err(e) => {
                warn!("malformed job parameters from {from}: {e}");
                return Ok(Handled::Ignored);
            }
        };

        let width = PixelWidth::for_limit(job.iteration_limit);
        let size = msg::reply_size(job.rect.width, job.rect.height, width);
        if size > MAX_DATAGRAM {
            return Err(WorkerErr::ReplyTooLarge {
                size,
                max: MAX_DATAGRAM,
            });
        }

        if job.iteration_limit > MAX_ITERATION_LIMIT {
            return Err(WorkerErr::IterationLimit {
                limit: job.iteration_limit,
                max: MAX_ITERATION_LIMIT,
            });
        }

        let (counts, total) = kernel::render(&job);

        self.counts.clear();
        for count in counts {
            width.put(&mut self.counts, count);
        }

        let reply = Msg::WorkReply(WorkReply {
            id: req.id,
            iterations: total as u32,
            counts: &self.counts,
        });
        reply.encode(&mut self.out).map_err(io::Error::from)?;

        debug!(
            chunk = req.id.chunk,
            epoch = req.id.epoch,
            iterations = total;
            "computed {}x{} at ({}, {}) for {from}",
            job.rect.width,
            job.rect.height,
            job.rect.x,
            job.rect.y
        );

        self.answer(from, outbound)?;
        Ok(Handled::Reply)
    }

    fn identify(
        &mut self,
        query: Identity,
        from: &Endpoint,
        outbound: &mut dyn Outbound,
    ) -> Result<Handled> {
        // Answer at the port named in the query, defaulting to the sender's.
        let to = match *from {
            Endpoint::Net(mut addr) if query.port != 0 => {
                addr.set_port(query.port);
                Endpoint::Net(addr)
            }
            other => other,
        };

        let response = Msg::IdentityResponse(Identity {
            port: 0,
            pid: self.pid,
        });
        response.encode(&mut self.out).map_err(io::Error::from)?;

        debug!("identity query from {from}, answering at {to}");
        self.answer(&to, outbound)?;
        Ok(Handled::Identity)
    }

    fn answer(&self, to: &Endpoint, outbound: &mut dyn Outbound) -> Result<()> {
        match outbound.send(&self.out, to) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                warn!("dropping answer to {to}: socket buffer full");
                Ok(())
            }
            res => Ok(res?),
        }
    }
}
