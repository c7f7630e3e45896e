use bytes::BufMut;

/// Writes a value into a buffer in wire (big-endian) order.
pub trait Serialize {
    fn serialize<B: BufMut>(&self, buf: &mut B);
}
