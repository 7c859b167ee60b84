use thiserror::Error;

/// Failure to hand a control message to the transport.
///
/// Never fatal to the multiplexer: local state is updated regardless and the
/// error is reported back to the caller as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport channel closed")]
    Closed,

    #[error("failed to encode control message: {0}")]
    Encode(String),
}

impl From<joblog_types::ProtocolError> for TransportError {
    fn from(err: joblog_types::ProtocolError) -> Self {
        Self::Encode(err.to_string())
    }
}
