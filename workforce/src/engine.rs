//! The work distribution engine.
//!
//! Chunks wait in the pending queue until every one of them has been answered.
//! Sending a chunk to a worker rotates it to the pending tail, so idle workers
//! pick up chunks nobody has started yet before duplicating ones in flight.
//! Once the pending queue drains, the batch is torn down and the epoch advances,
//! turning any reply still on its way into a late packet.

use std::{io, time::Duration};

use comms::{
    Datagram, Dispatch, Endpoint, Identity, Msg, Outbound, RequestId, WorkReply, WorkRequest,
    job::JOB_SIZE,
};
use log::{debug, info, trace};
use tokio::time::Instant;

use crate::{
    Result, WorkforceErr,
    client::{Client, Owner},
    queue::{Cursor, Queue, Queues},
    stats::{Counters, Stats, WorkerStats},
};

/// Upper bound on the amount of chunks in one epoch; serials are 16 bits wide.
pub const MAX_CHUNKS: usize = u16::MAX as usize + 1;

const INITIAL_CHUNKS: usize = 1024;

/// How to reach a worker, as handed to [`Workforce::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub name: String,
    pub endpoint: Endpoint,
    pub timeout: Duration,
}

/// Handle on a dispatched chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHandle {
    pub epoch: u16,
    pub serial: u16,
}

#[derive(Debug)]
struct Worker {
    name: String,
    endpoint: Endpoint,
    timeout: Duration,
    enabled: bool,
    /// Armed while a request is in flight.
    deadline: Option<Instant>,
    pid: Option<u16>,
    counters: Counters,
}

#[derive(Debug)]
struct Chunk<T> {
    owner: Option<Owner>,
    completed: bool,
    params: Vec<u8>,
    payload: T,
}

/// Distributes chunks of work over a fixed set of workers.
///
/// `T` is the caller's per-chunk payload, `O` the sending half of the transport
/// and `C` the caller notified of completed chunks.
pub struct Workforce<T, O, C> {
    workers: Vec<Worker>,
    chunks: Vec<Chunk<T>>,
    queues: Queues,
    cursor: Cursor,
    epoch: u16,
    requester: u16,
    dispatched: u64,
    batches: u64,
    outbound: O,
    client: C,
    buf: Vec<u8>,
}

impl<T, O, C> Workforce<T, O, C>
where
    O: Outbound,
    C: Client<T>,
{
    /// Creates a new engine.
    ///
    /// # Arguments
    /// * `workers` - The workers to distribute over, their index is their position.
    /// * `outbound` - The transport requests are sent through.
    /// * `client` - The caller notified of completed chunks.
    ///
    /// # Returns
    /// An idle engine at epoch 0, identified by the low 16 bits of the process id.
    pub fn new(workers: Vec<WorkerSpec>, outbound: O, client: C) -> Self {
        let workers = workers
            .into_iter()
            .map(|spec| Worker {
                name: spec.name,
                endpoint: spec.endpoint,
                timeout: spec.timeout,
                enabled: true,
                deadline: None,
                pid: None,
                counters: Counters::default(),
            })
            .collect();

        Self {
            workers,
            chunks: Vec::with_capacity(INITIAL_CHUNKS),
            queues: Queues::new(),
            cursor: Cursor::Tail,
            epoch: 0,
            requester: std::process::id() as u16,
            dispatched: 0,
            batches: 0,
            outbound,
            client,
            buf: Vec::new(),
        }
    }

    /// Replaces the identity stamped on requests; replies carrying any other
    /// identity are dropped.
    pub fn with_requester(mut self, requester: u16) -> Self {
        self.requester = requester;
        self
    }

    /// Prepares for dispatching a new set of chunks behind the pending ones.
    pub fn begin_batch(&mut self) {
        self.cursor = Cursor::Tail;
    }

    /// Prepares for dispatching a new set of chunks ahead of the pending ones.
    ///
    /// The chunks keep their dispatch order among themselves.
    pub fn begin_priority_batch(&mut self) {
        self.cursor = match self.queues.head(Queue::Pending) {
            Some(head) => Cursor::Before(head),
            None => Cursor::Tail,
        };
    }

    /// Queues a chunk of work. Nothing is sent until a worker is whipped.
    ///
    /// # Arguments
    /// * `owner` - The caller the chunk belongs to.
    /// * `payload` - Caller data handed back on completion.
    /// * `params` - The worker parameters, copied into the engine.
    ///
    /// # Returns
    /// The chunk's handle.
    ///
    /// # Errors
    /// `ParamsTooLarge` if `params` exceeds the work packet ceiling and
    /// `ChunkLimit` when the epoch ran out of serial numbers.
    pub fn dispatch(&mut self, owner: Owner, payload: T, params: &[u8]) -> Result<ChunkHandle> {
        if params.len() > JOB_SIZE {
            return Err(WorkforceErr::ParamsTooLarge {
                len: params.len(),
                max: JOB_SIZE,
            });
        }

        let serial = self.chunks.len();
        if serial >= MAX_CHUNKS {
            return Err(WorkforceErr::ChunkLimit { epoch: self.epoch });
        }

        self.chunks.push(Chunk {
            owner: Some(owner),
            completed: false,
            params: params.to_vec(),
            payload,
        });
        self.queues.insert(serial, self.cursor);
        self.dispatched += 1;

        Ok(ChunkHandle {
            epoch: self.epoch,
            serial: serial as u16,
        })
    }

    /// Puts every enabled worker without an outstanding request to work.
    pub fn kick(&mut self) {
        for w in 0..self.workers.len() {
            if self.workers[w].deadline.is_none() {
                self.whip(w);
            }
        }
    }

    /// Gives up on every pending chunk of `owner`; replies for them count as late.
    pub fn abandon(&mut self, owner: Owner) {
        let doomed: Vec<_> = self
            .queues
            .iter(Queue::Pending)
            .filter(|&serial| self.chunks[serial].owner == Some(owner))
            .collect();

        for &serial in &doomed {
            self.chunks[serial].owner = None;
            self.retire(serial);
        }

        debug!("abandoned {} chunks of owner {}", doomed.len(), owner.0);
    }

    /// Decodes and routes one incoming message. Anything unexpected is dropped.
    ///
    /// # Arguments
    /// * `payload` - The raw message.
    /// * `from` - Where it came from.
    pub fn handle_message(&mut self, payload: &[u8], from: &Endpoint) {
        match Msg::decode(payload) {
            Ok(Msg::WorkReply(reply)) => self.reply(&reply),
            Ok(Msg::IdentityResponse(identity)) => self.identity(identity, from),
            Ok(other) => trace!("dropping {:?} from {from}", other.kind()),
            Err(e) => trace!("dropping datagram from {from}: {e}"),
        }
    }

    /// Re-sends work for every worker whose deadline passed.
    pub fn tick(&mut self) {
        let now = Instant::now();

        for w in 0..self.workers.len() {
            let worker = &mut self.workers[w];
            let Some(deadline) = worker.deadline else {
                continue;
            };

            if deadline <= now {
                worker.deadline = None;
                worker.counters.timeouts += 1;
                debug!("worker {} timed out", worker.name);
                self.whip(w);
            }
        }
    }

    /// Asks every enabled worker for its process id.
    ///
    /// # Arguments
    /// * `reply_port` - The port workers should answer at, 0 for the sender's.
    pub fn probe(&mut self, reply_port: u16) {
        let query = Msg::IdentityQuery(Identity {
            port: reply_port,
            pid: 0,
        });
        if let Err(e) = query.encode(&mut self.buf) {
            self.client.warn(&format!("cannot encode identity query: {e}"));
            return;
        }

        for w in 0..self.workers.len() {
            if !self.workers[w].enabled {
                continue;
            }

            let worker = &self.workers[w];
            if let Err(e) = self.outbound.send(&self.buf, &worker.endpoint) {
                self.disable(w, e);
            }
        }
    }

    /// Returns a snapshot of every worker's counters.
    pub fn stats(&self) -> Stats {
        let workers = self
            .workers
            .iter()
            .map(|w| WorkerStats {
                name: w.name.clone(),
                enabled: w.enabled,
                pid: w.pid,
                counters: w.counters,
            })
            .collect();

        Stats { workers }
    }

    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    /// Chunks dispatched since the engine was created.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Batches torn down since the engine was created.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn pending_len(&self) -> usize {
        self.queues.len(Queue::Pending)
    }

    /// Whether no chunk is waiting for an answer.
    pub fn is_idle(&self) -> bool {
        self.queues.is_empty(Queue::Pending)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Sends the head of the pending queue to worker `w`.
    fn whip(&mut self, w: usize) {
        if !self.workers[w].enabled {
            return;
        }

        let Some(serial) = self.queues.head(Queue::Pending) else {
            self.workers[w].deadline = None;
            return;
        };

        let msg = Msg::WorkRequest(WorkRequest {
            id: RequestId {
                requester: self.requester,
                epoch: self.epoch,
                chunk: serial as u16,
                worker: w as u16,
            },
            params: &self.chunks[serial].params,
        });
        if let Err(e) = msg.encode(&mut self.buf) {
            self.disable(w, e.into());
            return;
        }

        let worker = &mut self.workers[w];
        match self.outbound.send(&self.buf, &worker.endpoint) {
            Ok(()) => {
                worker.deadline = Some(Instant::now() + worker.timeout);
                self.queues
                    .move_to_tail(serial, Queue::Pending, Queue::Pending);
                trace!("chunk {serial} sent to {}", worker.name);
            }
            Err(e) => self.disable(w, e),
        }
    }

    fn disable(&mut self, w: usize, e: io::Error) {
        let worker = &mut self.workers[w];
        worker.enabled = false;
        worker.deadline = None;

        let msg = format!("error sending to {}, worker disabled: {e}", worker.name);
        self.client.warn(&msg);
    }

    fn reply(&mut self, reply: &WorkReply<'_>) {
        let RequestId {
            requester,
            epoch,
            chunk,
            worker,
        } = reply.id;

        if requester != self.requester {
            trace!("dropping reply for requester {requester}");
            return;
        }

        let w = worker as usize;
        let Some(state) = self.workers.get_mut(w) else {
            trace!("dropping reply from unknown worker {worker}");
            return;
        };
        state.counters.packets += 1;

        let serial = chunk as usize;
        let live = epoch == self.epoch
            && self
                .chunks
                .get(serial)
                .is_some_and(|c| c.owner.is_some() && !c.completed);

        if live {
            state.deadline = None;
            self.chunks[serial].completed = true;
            self.retire(serial);
        } else {
            state.counters.late += 1;
            debug!(epoch = epoch, chunk = chunk; "late reply from {}", state.name);
        }

        self.whip(w);

        if live {
            let c = &self.chunks[serial];
            if let Some(owner) = c.owner {
                self.client.chunk_done(owner, &c.payload, reply);
            }
            self.workers[w].counters.iterations += reply.iterations as u64;
            debug!(
                chunk = chunk,
                iterations = reply.iterations;
                "chunk completed by {}",
                self.workers[w].name
            );
        }

        if self.queues.is_empty(Queue::Pending) && !self.chunks.is_empty() {
            self.teardown();
        }
    }

    /// Moves a pending chunk to the completed queue.
    fn retire(&mut self, serial: usize) {
        self.queues
            .move_to_tail(serial, Queue::Pending, Queue::Completed);

        // The cursor must stay inside the pending queue.
        if self.cursor == Cursor::Before(serial) {
            self.cursor = Cursor::Tail;
        }
    }

    /// Drops every chunk of the finished batch and advances the epoch.
    fn teardown(&mut self) {
        self.chunks.clear();
        self.queues.reset();
        self.cursor = Cursor::Tail;
        self.epoch = self.epoch.wrapping_add(1);
        self.batches += 1;

        info!("batch done, now at epoch {}", self.epoch);
    }

    fn identity(&mut self, identity: Identity, from: &Endpoint) {
        match self.workers.iter_mut().find(|w| w.endpoint == *from) {
            Some(worker) => {
                info!("worker {} is process {}", worker.name, identity.pid);
                worker.pid = Some(identity.pid);
            }
            None => trace!("identity response from unknown endpoint {from}"),
        }
    }
}

impl<T, O, C> Dispatch for Workforce<T, O, C>
where
    O: Outbound,
    C: Client<T>,
{
    fn message(&mut self, datagram: Datagram) -> io::Result<()> {
        self.handle_message(&datagram.payload, &datagram.from);
        Ok(())
    }

    fn tick(&mut self) {
        Workforce::tick(self);
    }

    fn done(&self) -> bool {
        self.client.finished()
    }
}
