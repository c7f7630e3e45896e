use std::{error::Error, fmt, io};

/// The specific result type for encoding and decoding wire messages.
pub type Result<T> = std::result::Result<T, ProtocolErr>;

/// Reasons a buffer is not a valid message of this protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErr {
    Truncated { needed: usize, got: usize },
    BadMagic(u16),
    BadVersion(u16),
    BadFormat(u16),
    UnknownKind(u16),
    TooLarge { size: usize, max: usize },
}

impl fmt::Display for ProtocolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, got } => {
                write!(f, "message truncated: needed {needed} bytes, got {got}")
            }
            Self::BadMagic(magic) => write!(f, "bad magic number {magic:#06x}"),
            Self::BadVersion(version) => write!(f, "unsupported protocol version {version}"),
            Self::BadFormat(format) => write!(f, "unsupported data format {format}"),
            Self::UnknownKind(kind) => write!(f, "unknown message kind {kind}"),
            Self::TooLarge { size, max } => {
                write!(f, "message of {size} bytes exceeds the {max} byte datagram limit")
            }
        }
    }
}

impl Error for ProtocolErr {}

impl From<ProtocolErr> for io::Error {
    fn from(value: ProtocolErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
