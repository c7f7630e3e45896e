//! Strategies driving a [`Dispatch`] from an [`Inbound`] transport.
//!
//! The dispatcher side needs two kinds of events: incoming messages and a
//! periodic tick for its timeout scan. The strategies differ in how they wait
//! for the former and when they fire the latter.

use std::{io, str::FromStr, time::Duration};

use async_trait::async_trait;
use log::trace;
use tokio::time::{self, Instant};

use crate::transport::{Datagram, Inbound};

/// Tick interval used when none is configured.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// The receiving end of a multiplexing strategy.
pub trait Dispatch {
    /// Handles one incoming message. An error stops the strategy.
    fn message(&mut self, datagram: Datagram) -> io::Result<()>;

    /// Periodic housekeeping.
    fn tick(&mut self);

    /// Whether the strategy should return.
    fn done(&self) -> bool {
        false
    }
}

/// A strategy owning the wait loop.
#[async_trait(?Send)]
pub trait Multiplex {
    /// Feeds `dispatch` until it reports done or a transport error occurs.
    async fn run(&mut self, inbound: &mut dyn Inbound, dispatch: &mut dyn Dispatch)
    -> io::Result<()>;
}

#[async_trait(?Send)]
impl<M: Multiplex + ?Sized> Multiplex for Box<M> {
    async fn run(
        &mut self,
        inbound: &mut dyn Inbound,
        dispatch: &mut dyn Dispatch,
    ) -> io::Result<()> {
        (**self).run(inbound, dispatch).await
    }
}

/// Waits for one message at a time and never ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingMux;

#[async_trait(?Send)]
impl Multiplex for BlockingMux {
    async fn run(
        &mut self,
        inbound: &mut dyn Inbound,
        dispatch: &mut dyn Dispatch,
    ) -> io::Result<()> {
        while !dispatch.done() {
            let datagram = inbound.recv().await?;
            dispatch.message(datagram)?;
        }

        Ok(())
    }
}

/// Drains whatever is available, ticks, then waits up to `interval`.
///
/// Under continuous traffic the drain stops once a full interval elapsed since
/// the previous tick, so ticks keep firing at least once per interval.
#[derive(Debug, Clone, Copy)]
pub struct PollMux {
    interval: Duration,
}

impl PollMux {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollMux {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

#[async_trait(?Send)]
impl Multiplex for PollMux {
    async fn run(
        &mut self,
        inbound: &mut dyn Inbound,
        dispatch: &mut dyn Dispatch,
    ) -> io::Result<()> {
        let mut last_tick = Instant::now();

        while !dispatch.done() {
            while last_tick.elapsed() < self.interval {
                let Some(datagram) = inbound.try_recv()? else {
                    break;
                };

                dispatch.message(datagram)?;
                if dispatch.done() {
                    return Ok(());
                }
            }

            dispatch.tick();
            last_tick = Instant::now();
            if dispatch.done() {
                break;
            }

            match time::timeout(self.interval, inbound.recv()).await {
                Ok(datagram) => dispatch.message(datagram?)?,
                Err(_) => trace!("no traffic for {:?}", self.interval),
            }
        }

        Ok(())
    }
}

/// Hands control to a host event loop that reports readiness and timer events.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalMux {
    ignore_would_block: bool,
}

impl ExternalMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerates spurious readiness notifications.
    pub fn ignore_would_block(mut self) -> Self {
        self.ignore_would_block = true;
        self
    }

    /// Handles one message after the host saw the transport become readable.
    ///
    /// # Returns
    /// A `WouldBlock` error if nothing was available, unless told to ignore it.
    pub fn on_readable(
        &mut self,
        inbound: &mut dyn Inbound,
        dispatch: &mut dyn Dispatch,
    ) -> io::Result<()> {
        match inbound.try_recv()? {
            Some(datagram) => dispatch.message(datagram),
            None if self.ignore_would_block => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "readable notification without a message",
            )),
        }
    }

    /// Fires the tick after the host timer expired.
    pub fn on_timer(&mut self, dispatch: &mut dyn Dispatch) {
        dispatch.tick();
    }
}

/// The strategies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxKind {
    Simple,
    Poll,
    External,
}

impl MuxKind {
    /// Builds a self-driving strategy.
    ///
    /// # Returns
    /// `None` for `External`, which is driven by the host instead.
    pub fn build(self, interval: Duration) -> Option<Box<dyn Multiplex>> {
        match self {
            MuxKind::Simple => Some(Box::new(BlockingMux)),
            MuxKind::Poll => Some(Box::new(PollMux::new(interval))),
            MuxKind::External => None,
        }
    }
}

impl FromStr for MuxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" | "blocking" => Ok(MuxKind::Simple),
            "poll" => Ok(MuxKind::Poll),
            "external" => Ok(MuxKind::External),
            other => Err(format!("unknown multiplexing strategy {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;

    use super::*;
    use crate::transport::Endpoint;

    /// Inbound fed from a queue; `recv` on an empty queue never resolves.
    struct Scripted {
        queue: VecDeque<Datagram>,
    }

    impl Scripted {
        fn new(n: usize) -> Self {
            let queue = (0..n)
                .map(|i| Datagram {
                    payload: Bytes::from(vec![i as u8]),
                    from: Endpoint::Pipe,
                })
                .collect();

            Self { queue }
        }
    }

    #[async_trait]
    impl Inbound for Scripted {
        async fn recv(&mut self) -> io::Result<Datagram> {
            match self.queue.pop_front() {
                Some(datagram) => Ok(datagram),
                None => std::future::pending().await,
            }
        }

        fn try_recv(&mut self) -> io::Result<Option<Datagram>> {
            Ok(self.queue.pop_front())
        }
    }

    #[derive(Default)]
    struct Counter {
        messages: usize,
        ticks: usize,
        stop_after_ticks: usize,
    }

    impl Dispatch for Counter {
        fn message(&mut self, _: Datagram) -> io::Result<()> {
            self.messages += 1;
            Ok(())
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }

        fn done(&self) -> bool {
            self.ticks >= self.stop_after_ticks
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_ticks_while_idle() {
        let mut inbound = Scripted::new(0);
        let mut counter = Counter {
            stop_after_ticks: 3,
            ..Default::default()
        };

        let start = Instant::now();
        PollMux::new(Duration::from_millis(100))
            .run(&mut inbound, &mut counter)
            .await
            .unwrap();

        assert_eq!(counter.ticks, 3);
        assert_eq!(counter.messages, 0);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_drains_then_ticks() {
        let mut inbound = Scripted::new(5);
        let mut counter = Counter {
            stop_after_ticks: 1,
            ..Default::default()
        };

        PollMux::default()
            .run(&mut inbound, &mut counter)
            .await
            .unwrap();

        assert_eq!(counter.messages, 5);
        assert_eq!(counter.ticks, 1);
    }

    /// Inbound that always has another message ready.
    struct Firehose;

    #[async_trait]
    impl Inbound for Firehose {
        async fn recv(&mut self) -> io::Result<Datagram> {
            Ok(Datagram {
                payload: Bytes::from_static(b"x"),
                from: Endpoint::Pipe,
            })
        }

        fn try_recv(&mut self) -> io::Result<Option<Datagram>> {
            Ok(Some(Datagram {
                payload: Bytes::from_static(b"x"),
                from: Endpoint::Pipe,
            }))
        }
    }

    #[derive(Default)]
    struct TickTimes {
        messages: usize,
        ticks: Vec<Instant>,
    }

    impl Dispatch for TickTimes {
        fn message(&mut self, _: Datagram) -> io::Result<()> {
            self.messages += 1;
            Ok(())
        }

        fn tick(&mut self) {
            self.ticks.push(Instant::now());
        }

        fn done(&self) -> bool {
            self.ticks.len() >= 3
        }
    }

    #[tokio::test]
    async fn poll_ticks_under_continuous_traffic() {
        let interval = Duration::from_millis(20);
        let mut dispatch = TickTimes::default();

        let start = Instant::now();
        PollMux::new(interval)
            .run(&mut Firehose, &mut dispatch)
            .await
            .unwrap();

        assert_eq!(dispatch.ticks.len(), 3);
        assert!(dispatch.messages > 3);
        assert!(dispatch.ticks[0] - start >= interval);
        for pair in dispatch.ticks.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn blocking_stops_when_done() {
        struct UpTo(usize, usize);

        impl Dispatch for UpTo {
            fn message(&mut self, _: Datagram) -> io::Result<()> {
                self.0 += 1;
                Ok(())
            }

            fn tick(&mut self) {
                unreachable!("the blocking strategy never ticks");
            }

            fn done(&self) -> bool {
                self.0 >= self.1
            }
        }

        let mut inbound = Scripted::new(10);
        let mut dispatch = UpTo(0, 4);

        BlockingMux.run(&mut inbound, &mut dispatch).await.unwrap();

        assert_eq!(dispatch.0, 4);
        assert_eq!(inbound.queue.len(), 6);
    }

    #[test]
    fn external_surfaces_would_block() {
        let mut inbound = Scripted::new(1);
        let mut counter = Counter::default();
        let mut mux = ExternalMux::new();

        mux.on_readable(&mut inbound, &mut counter).unwrap();
        let err = mux.on_readable(&mut inbound, &mut counter).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

        let mut mux = mux.ignore_would_block();
        mux.on_readable(&mut inbound, &mut counter).unwrap();
        mux.on_timer(&mut counter);

        assert_eq!(counter.messages, 1);
        assert_eq!(counter.ticks, 1);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("poll".parse::<MuxKind>(), Ok(MuxKind::Poll));
        assert_eq!("Simple".parse::<MuxKind>(), Ok(MuxKind::Simple));
        assert!("select".parse::<MuxKind>().is_err());
        assert!(MuxKind::External.build(DEFAULT_TICK).is_none());
    }
}
