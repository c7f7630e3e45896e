use std::{error::Error, fmt, io};

/// The workforce module's result type.
pub type Result<T> = std::result::Result<T, WorkforceErr>;

/// All errors that can occur while distributing work.
#[derive(Debug)]
pub enum WorkforceErr {
    /// Invalid worker list or settings, caught before any work is sent.
    InvalidConfig(String),
    /// Every serial number of the current epoch is in use.
    ChunkLimit { epoch: u16 },
    /// The worker parameters do not fit a work request.
    ParamsTooLarge { len: usize, max: usize },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for WorkforceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ChunkLimit { epoch } => {
                write!(f, "too many chunks dispatched in epoch {epoch}")
            }
            Self::ParamsTooLarge { len, max } => {
                write!(f, "work packet of {len} bytes exceeds the {max} byte limit")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for WorkforceErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkforceErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WorkforceErr> for io::Error {
    fn from(value: WorkforceErr) -> Self {
        match value {
            WorkforceErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
