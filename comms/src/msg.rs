//! Message layouts exchanged between the dispatcher and its workers.
//!
//! Every message starts with an 8 byte [`Header`]. Work requests and replies
//! follow it with a [`RequestId`], identity messages with an [`Identity`].
//! All multi-byte fields are big-endian on the wire.

use bytes::{Buf, BufMut};

use crate::{
    Deserialize, ProtocolErr, Serialize,
    deserialize::ensure,
    error::Result,
};

/// Magic number opening every message.
pub const MAGIC: u16 = 0x9872;

/// Major protocol version, bumped whenever a layout changes.
pub const VERSION: u16 = 5;

/// Minor version describing the job parameter and reply data formats.
pub const FORMAT: u16 = 7;

/// Upper bound on the size of any message, in bytes.
pub const MAX_DATAGRAM: usize = 8192;

/// Well-known UDP port of the worker daemon.
pub const DEFAULT_PORT: u16 = 9359;

pub const HEADER_SIZE: usize = 8;
pub const REQUEST_ID_SIZE: usize = 8;

/// Bytes preceding the per-pixel counts in a reply.
pub const REPLY_PREFIX_SIZE: usize = HEADER_SIZE + REQUEST_ID_SIZE + 4;

/// The kind field of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    WorkRequest,
    WorkReply,
    IdentityQuery,
    IdentityResponse,
}

impl Kind {
    fn code(self) -> u16 {
        match self {
            Kind::WorkRequest => 0,
            Kind::WorkReply => 1,
            Kind::IdentityQuery => 2,
            Kind::IdentityResponse => 3,
        }
    }
}

impl TryFrom<u16> for Kind {
    type Error = ProtocolErr;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Kind::WorkRequest),
            1 => Ok(Kind::WorkReply),
            2 => Ok(Kind::IdentityQuery),
            3 => Ok(Kind::IdentityResponse),
            other => Err(ProtocolErr::UnknownKind(other)),
        }
    }
}

/// The fixed message header: magic, kind, version and format.
///
/// Only the kind varies; decoding rejects any other magic, version or format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: Kind,
}

impl Serialize for Header {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(MAGIC);
        buf.put_u16(self.kind.code());
        buf.put_u16(VERSION);
        buf.put_u16(FORMAT);
    }
}

impl<'a> Deserialize<'a> for Header {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self> {
        ensure(buf, HEADER_SIZE)?;

        let magic = buf.get_u16();
        let kind = buf.get_u16();
        let version = buf.get_u16();
        let format = buf.get_u16();

        if magic != MAGIC {
            return Err(ProtocolErr::BadMagic(magic));
        }

        if version != VERSION {
            return Err(ProtocolErr::BadVersion(version));
        }

        if format != FORMAT {
            return Err(ProtocolErr::BadFormat(format));
        }

        Ok(Self {
            kind: Kind::try_from(kind)?,
        })
    }
}

/// Identifies the chunk a request or reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId {
    /// Identity of the dispatching process.
    pub requester: u16,
    /// Batch generation the chunk was issued in.
    pub epoch: u16,
    /// Serial number of the chunk within its epoch.
    pub chunk: u16,
    /// Index of the worker in the dispatcher's table.
    pub worker: u16,
}

impl Serialize for RequestId {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.requester);
        buf.put_u16(self.epoch);
        buf.put_u16(self.chunk);
        buf.put_u16(self.worker);
    }
}

impl<'a> Deserialize<'a> for RequestId {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self> {
        ensure(buf, REQUEST_ID_SIZE)?;

        Ok(Self {
            requester: buf.get_u16(),
            epoch: buf.get_u16(),
            chunk: buf.get_u16(),
            worker: buf.get_u16(),
        })
    }
}

/// A unit of work; `params` is the wire-encoded job, opaque to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRequest<'a> {
    pub id: RequestId,
    pub params: &'a [u8],
}

/// The per-pixel iteration counts computed for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkReply<'a> {
    pub id: RequestId,
    /// Sum of the iteration counts of every pixel in the reply.
    pub iterations: u32,
    /// Raw counts, 1 or 2 bytes per pixel depending on the iteration limit.
    pub counts: &'a [u8],
}

impl WorkReply<'_> {
    /// Returns the `i`th pixel count read at the given width.
    ///
    /// # Arguments
    /// * `width` - The pixel width chosen for the originating job.
    /// * `i` - The pixel index in row-major order.
    ///
    /// # Returns
    /// The count or `None` if the reply holds fewer than `i + 1` pixels.
    pub fn count(&self, width: PixelWidth, i: usize) -> Option<u16> {
        width.read(self.counts, i)
    }

    /// Returns the amount of pixels carried by the reply at the given width.
    pub fn len(&self, width: PixelWidth) -> usize {
        self.counts.len() / width.bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Body of the identity query and its response.
///
/// Queries carry the port to answer to, responses the responder's process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    pub port: u16,
    pub pid: u16,
}

impl Serialize for Identity {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.port);
        buf.put_u16(self.pid);
    }
}

impl<'a> Deserialize<'a> for Identity {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self> {
        ensure(buf, 4)?;

        Ok(Self {
            port: buf.get_u16(),
            pid: buf.get_u16(),
        })
    }
}

/// Storage width of a single iteration count inside a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelWidth {
    One,
    Two,
}

impl PixelWidth {
    /// Counts below 256 fit a byte; larger limits need two.
    pub fn for_limit(limit: u32) -> Self {
        if limit > 256 { Self::Two } else { Self::One }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Appends `count` at this width.
    pub fn put<B: BufMut>(self, buf: &mut B, count: u16) {
        match self {
            Self::One => buf.put_u8(count as u8),
            Self::Two => buf.put_u16(count),
        }
    }

    fn read(self, counts: &[u8], i: usize) -> Option<u16> {
        match self {
            Self::One => counts.get(i).map(|&b| b as u16),
            Self::Two => {
                let bytes = counts.get(2 * i..2 * i + 2)?;
                Some(u16::from_be_bytes([bytes[0], bytes[1]]))
            }
        }
    }
}

/// Returns the size in bytes of the reply to a `width` x `height` request.
pub fn reply_size(width: u16, height: u16, pixel_width: PixelWidth) -> usize {
    REPLY_PREFIX_SIZE + width as usize * height as usize * pixel_width.bytes()
}

/// The application layer message for the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg<'a> {
    WorkRequest(WorkRequest<'a>),
    WorkReply(WorkReply<'a>),
    IdentityQuery(Identity),
    IdentityResponse(Identity),
}

impl<'a> Msg<'a> {
    pub fn kind(&self) -> Kind {
        match self {
            Msg::WorkRequest(_) => Kind::WorkRequest,
            Msg::WorkReply(_) => Kind::WorkReply,
            Msg::IdentityQuery(_) => Kind::IdentityQuery,
            Msg::IdentityResponse(_) => Kind::IdentityResponse,
        }
    }

    /// Encodes the message into `buf`, replacing its previous contents.
    ///
    /// # Arguments
    /// * `buf` - The output buffer, reused between calls.
    ///
    /// # Returns
    /// `ProtocolErr::TooLarge` if the message would not fit a datagram, in which
    /// case the contents of `buf` are unspecified.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        self.serialize(buf);

        if buf.len() > MAX_DATAGRAM {
            return Err(ProtocolErr::TooLarge {
                size: buf.len(),
                max: MAX_DATAGRAM,
            });
        }

        Ok(())
    }

    /// Decodes a whole datagram.
    pub fn decode(mut buf: &'a [u8]) -> Result<Self> {
        Self::deserialize(&mut buf)
    }
}

impl Serialize for Msg<'_> {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        Header { kind: self.kind() }.serialize(buf);

        match self {
            Msg::WorkRequest(req) => {
                req.id.serialize(buf);
                buf.put_slice(req.params);
            }
            Msg::WorkReply(reply) => {
                reply.id.serialize(buf);
                buf.put_u32(reply.iterations);
                buf.put_slice(reply.counts);
            }
            Msg::IdentityQuery(identity) | Msg::IdentityResponse(identity) => {
                identity.serialize(buf)
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self> {
        let header = Header::deserialize(buf)?;

        let msg = match header.kind {
            Kind::WorkRequest => {
                let id = RequestId::deserialize(buf)?;
                let params = std::mem::take(buf);
                Msg::WorkRequest(WorkRequest { id, params })
            }
            Kind::WorkReply => {
                let id = RequestId::deserialize(buf)?;
                ensure(buf, 4)?;
                let iterations = buf.get_u32();
                let counts = std::mem::take(buf);
                Msg::WorkReply(WorkReply {
                    id,
                    iterations,
                    counts,
                })
            }
            Kind::IdentityQuery => Msg::IdentityQuery(Identity::deserialize(buf)?),
            Kind::IdentityResponse => Msg::IdentityResponse(Identity::deserialize(buf)?),
        };

        Ok(msg)
    }
}
