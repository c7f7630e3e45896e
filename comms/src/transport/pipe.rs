use std::{
    ffi::OsStr,
    io::{self, Write},
    process::{Child, ChildStdin, Command, Stdio},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{FutureExt, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::{Encoder, FramedRead, LengthDelimitedCodec};

use super::{Datagram, Endpoint, Inbound, Outbound};
use crate::msg::MAX_DATAGRAM;

/// The framing used on byte streams: a 4 byte big-endian length and the message.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_DATAGRAM)
        .big_endian()
        .new_codec()
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "pipe closed by peer")
}

/// The receiving half of a pipe, yielding whole frames.
pub struct PipeInbound<R> {
    frames: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin + Send> PipeInbound<R> {
    pub fn new(rx: R) -> Self {
        Self {
            frames: FramedRead::new(rx, frame_codec()),
        }
    }
}

fn datagram(frame: BytesMut) -> Datagram {
    Datagram {
        payload: frame.freeze(),
        from: Endpoint::Pipe,
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Inbound for PipeInbound<R> {
    async fn recv(&mut self) -> io::Result<Datagram> {
        match self.frames.next().await {
            Some(frame) => Ok(datagram(frame?)),
            None => Err(closed()),
        }
    }

    fn try_recv(&mut self) -> io::Result<Option<Datagram>> {
        match self.frames.next().now_or_never() {
            None => Ok(None),
            Some(Some(frame)) => Ok(Some(datagram(frame?))),
            Some(None) => Err(closed()),
        }
    }
}

/// The sending half of a pipe, writing whole frames to a blocking writer.
///
/// There is a single peer, so the destination endpoint is ignored.
pub struct PipeOutbound<W> {
    tx: W,
    codec: LengthDelimitedCodec,
    buf: BytesMut,
}

impl<W: Write> PipeOutbound<W> {
    pub fn new(tx: W) -> Self {
        Self {
            tx,
            codec: frame_codec(),
            buf: BytesMut::with_capacity(MAX_DATAGRAM + 4),
        }
    }

    pub fn into_inner(self) -> W {
        self.tx
    }
}

impl<W: Write> Outbound for PipeOutbound<W> {
    fn send(&mut self, payload: &[u8], _to: &Endpoint) -> io::Result<()> {
        let Self { tx, codec, buf } = self;

        buf.clear();
        codec.encode(Bytes::copy_from_slice(payload), buf)?;
        tx.write_all(buf)?;
        tx.flush()
    }
}

/// Handle on a worker process spawned in pipe mode; killed when dropped.
pub struct LocalWorker {
    child: Child,
}

impl LocalWorker {
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for LocalWorker {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("local worker already gone: {e}");
        }

        let _ = self.child.wait();
    }
}

/// Starts one local worker speaking the pipe protocol on its stdin and stdout.
///
/// Must be called from within a tokio runtime.
///
/// # Arguments
/// * `program` - The worker executable.
/// * `args` - Arguments putting the worker in pipe mode.
///
/// # Returns
/// The halves talking to the child and the handle keeping it alive.
pub fn spawn_local_worker<P, I, S>(
    program: P,
    args: I,
) -> io::Result<(
    PipeInbound<tokio::process::ChildStdout>,
    PipeOutbound<ChildStdin>,
    LocalWorker,
)>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program.as_ref())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        let _ = child.kill();
        return Err(io::Error::other("local worker started without pipes"));
    };

    log::info!(
        "spawned local worker {} (pid {})",
        program.as_ref().to_string_lossy(),
        child.id()
    );

    let worker = LocalWorker { child };
    let stdout = tokio::process::ChildStdout::from_std(stdout)?;

    Ok((
        PipeInbound::new(stdout),
        PipeOutbound::new(stdin),
        worker,
    ))
}
