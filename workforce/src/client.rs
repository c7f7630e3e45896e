use comms::WorkReply;

/// Identifies the caller a chunk was dispatched on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner(pub u32);

/// The caller side of the engine.
///
/// `T` is the payload handed to `Workforce::dispatch`; the engine keeps it
/// untouched and passes it back once the chunk completes.
pub trait Client<T> {
    /// Called once per chunk, with the first valid reply received for it.
    fn chunk_done(&mut self, owner: Owner, payload: &T, reply: &WorkReply<'_>);

    /// Reports a non-fatal problem, such as a worker being disabled.
    fn warn(&mut self, msg: &str) {
        log::warn!("{msg}");
    }

    /// Lets the driving strategy stop once the caller has what it needs.
    fn finished(&self) -> bool {
        false
    }
}
