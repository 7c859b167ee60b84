use joblog_types::ControlMessage;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Outbound half of the transport adapter.
///
/// `send` must enqueue and return without waiting on the network. The
/// multiplexer calls it while holding the job's entry lock so that the
/// subscribe/unsubscribe order for a job always matches its state transitions.
pub trait ControlTransport: Send + Sync {
    fn send(&self, msg: ControlMessage) -> Result<(), TransportError>;
}

/// Transport that encodes control messages as JSON frames onto an unbounded
/// channel. The receiving end is usually a socket writer task.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl ControlTransport for ChannelTransport {
    fn send(&self, msg: ControlMessage) -> Result<(), TransportError> {
        let frame = msg.to_json()?;
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_json() {
        let (transport, mut rx) = ChannelTransport::new();
        transport
            .send(ControlMessage::UnsubscribeLogs {
                name: "nightly".into(),
            })
            .unwrap();
        let frame = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "unsubscribe_logs");
        assert_eq!(json["name"], "nightly");
    }

    #[test]
    fn send_after_receiver_dropped_is_closed() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        let err = transport
            .send(ControlMessage::UnsubscribeLogs { name: "x".into() })
            .unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }
}
