//! Wire types shared between the log multiplexer and its transport.

pub mod protocol;

pub use protocol::{ControlMessage, ProtocolError, TransportEvent};
