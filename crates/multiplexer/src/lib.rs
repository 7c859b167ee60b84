//! Per-job log buffers fanned out to any number of viewers over one shared
//! transport subscription.
//!
//! - [`LogMultiplexer`] owns every job's buffer and subscriber set and decides
//!   when `subscribe_logs` / `unsubscribe_logs` go out.
//! - [`Subscriber`] wraps a [`LogSink`], the non-blocking callback a viewer
//!   receives buffer snapshots through.
//! - [`LogViewer`] is the RAII handle UI code holds: subscribe on open,
//!   unsubscribe on drop.
//! - [`ControlTransport`] is the seam to whatever carries control messages.

pub mod error;
pub mod multiplexer;
pub mod subscriber;
pub mod transport;
pub mod viewer;

pub use error::TransportError;
pub use multiplexer::{LogMultiplexer, Subscription, Unsubscription};
pub use subscriber::{
    ChannelSink, LogSink, LogSnapshot, Subscriber, SubscriberId, WatchSink,
    DEFAULT_SINK_CAPACITY,
};
pub use transport::{ChannelTransport, ControlTransport};
pub use viewer::LogViewer;
