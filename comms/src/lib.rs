mod deserialize;
mod error;
pub mod job;
pub mod msg;
pub mod mux;
mod serialize;
pub mod transport;

pub use deserialize::Deserialize;
pub use error::{ProtocolErr, Result};
pub use job::{Complex, Job, Mode, Rect};
pub use msg::{Identity, Msg, PixelWidth, RequestId, WorkReply, WorkRequest};
pub use mux::{BlockingMux, Dispatch, ExternalMux, Multiplex, MuxKind, PollMux};
pub use serialize::Serialize;
pub use transport::{Datagram, Endpoint, Inbound, Outbound};
