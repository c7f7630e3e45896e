use std::{error::Error, fmt, io};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures. Every variant is fatal to the daemon.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    /// The reply to a request would not fit in a single datagram.
    ReplyTooLarge { size: usize, max: usize },
    /// The requested iteration limit does not fit the reply's count width.
    IterationLimit { limit: u32, max: u32 },
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::ReplyTooLarge { size, max } => {
                write!(f, "reply of {size} bytes exceeds the {max} byte limit")
            }
            WorkerErr::IterationLimit { limit, max } => {
                write!(f, "iteration limit {limit} exceeds the maximum of {max}")
            }
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Lets a bounds violation end a strategy run as an `io::Error`.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
