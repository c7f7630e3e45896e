use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;

use super::{Datagram, Endpoint, Inbound, Outbound};
use crate::msg::MAX_DATAGRAM;

/// Binds one UDP socket shared by every peer and splits it in two halves.
///
/// Must be called from within a tokio runtime.
///
/// # Arguments
/// * `addr` - The local address to bind, port 0 picks an ephemeral port.
///
/// # Returns
/// The receiving and sending halves of the socket.
pub fn bind_udp<A: ToSocketAddrs>(addr: A) -> io::Result<(UdpInbound, UdpOutbound)> {
    let socket = std::net::UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;

    let outbound = UdpOutbound {
        socket: socket.try_clone()?,
    };
    let inbound = UdpInbound {
        socket: UdpSocket::from_std(socket)?,
        buf: vec![0; MAX_DATAGRAM],
    };

    Ok((inbound, outbound))
}

/// The receiving half of a UDP transport.
pub struct UdpInbound {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpInbound {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn datagram(&self, len: usize, from: SocketAddr) -> Datagram {
        Datagram {
            payload: Bytes::copy_from_slice(&self.buf[..len]),
            from: Endpoint::Net(from),
        }
    }
}

#[async_trait]
impl Inbound for UdpInbound {
    async fn recv(&mut self) -> io::Result<Datagram> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        Ok(self.datagram(len, from))
    }

    fn try_recv(&mut self) -> io::Result<Option<Datagram>> {
        match self.socket.try_recv_from(&mut self.buf) {
            Ok((len, from)) => Ok(Some(self.datagram(len, from))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The sending half of a UDP transport, a non-blocking clone of the socket.
pub struct UdpOutbound {
    socket: std::net::UdpSocket,
}

impl UdpOutbound {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Outbound for UdpOutbound {
    fn send(&mut self, payload: &[u8], to: &Endpoint) -> io::Result<()> {
        let Endpoint::Net(addr) = to else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "udp transport cannot reach a pipe endpoint",
            ));
        };

        let sent = self.socket.send_to(payload, addr)?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram: sent {sent} of {} bytes", payload.len()),
            ));
        }

        Ok(())
    }
}
