//! Byte transports carrying whole messages between the dispatcher and workers.
//!
//! A transport is split in two halves: an [`Outbound`] half that sends a payload
//! to an [`Endpoint`] without waiting, and an [`Inbound`] half that yields whole
//! [`Datagram`]s together with the endpoint they came from.

mod pipe;
mod udp;

use std::{fmt, io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;

pub use pipe::{LocalWorker, PipeInbound, PipeOutbound, frame_codec, spawn_local_worker};
pub use udp::{UdpInbound, UdpOutbound, bind_udp};

/// Where a message is sent to or came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Net(SocketAddr),
    /// The single peer at the other end of a pipe.
    Pipe,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Net(addr) => write!(f, "{addr}"),
            Endpoint::Pipe => f.write_str("pipe"),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(value: SocketAddr) -> Self {
        Self::Net(value)
    }
}

/// A single received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Bytes,
    pub from: Endpoint,
}

/// The sending half of a transport.
pub trait Outbound {
    /// Sends `payload` to `to` without blocking.
    ///
    /// # Returns
    /// An error if the transport refused the message; the caller decides
    /// whether the destination is still usable.
    fn send(&mut self, payload: &[u8], to: &Endpoint) -> io::Result<()>;
}

impl<O: Outbound + ?Sized> Outbound for Box<O> {
    fn send(&mut self, payload: &[u8], to: &Endpoint) -> io::Result<()> {
        (**self).send(payload, to)
    }
}

/// The receiving half of a transport.
#[async_trait]
pub trait Inbound: Send {
    /// Waits for the next message.
    async fn recv(&mut self) -> io::Result<Datagram>;

    /// Returns the next message if one is already available, `None` otherwise.
    fn try_recv(&mut self) -> io::Result<Option<Datagram>>;
}

#[async_trait]
impl<I: Inbound + ?Sized> Inbound for Box<I> {
    async fn recv(&mut self) -> io::Result<Datagram> {
        (**self).recv().await
    }

    fn try_recv(&mut self) -> io::Result<Option<Datagram>> {
        (**self).try_recv()
    }
}
