use crate::{ProtocolErr, error::Result};

/// Reads a value from the front of a wire buffer, advancing it past the
/// consumed bytes. Borrowed fields keep the lifetime of the buffer.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self>;
}

/// Fails with `ProtocolErr::Truncated` unless `buf` holds at least `needed` bytes.
pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ProtocolErr::Truncated {
            needed,
            got: buf.len(),
        });
    }

    Ok(())
}
