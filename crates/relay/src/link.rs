use std::sync::{Mutex, MutexGuard};

use joblog_multiplexer::{ControlTransport, TransportError};
use joblog_types::ControlMessage;
use tokio::sync::mpsc;

/// [`ControlTransport`] backed by whichever relay connection is currently up.
///
/// The client task attaches the outbound queue of each new connection and
/// detaches it when the connection ends. While detached, sends fail with
/// [`TransportError::NotConnected`] and the multiplexer keeps buffering.
#[derive(Default)]
pub struct RelayLink {
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl RelayLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        *self.slot() = Some(tx);
    }

    pub fn detach(&self) {
        self.slot().take();
    }

    pub fn is_attached(&self) -> bool {
        self.slot().as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl ControlTransport for RelayLink {
    fn send(&self, msg: ControlMessage) -> Result<(), TransportError> {
        let frame = msg.to_json()?;
        let slot = self.slot();
        let tx = slot.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(frame).map_err(|_| TransportError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unsubscribe() -> ControlMessage {
        ControlMessage::UnsubscribeLogs {
            name: "nightly".into(),
        }
    }

    #[test]
    fn detached_link_is_not_connected() {
        let link = RelayLink::new();
        assert!(!link.is_attached());
        assert_eq!(link.send(unsubscribe()), Err(TransportError::NotConnected));
    }

    #[test]
    fn attached_link_forwards_json() {
        let link = RelayLink::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        link.attach(tx);
        link.send(unsubscribe()).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            r#"{"type":"unsubscribe_logs","name":"nightly"}"#
        );

        link.detach();
        assert_eq!(link.send(unsubscribe()), Err(TransportError::NotConnected));
    }

    #[test]
    fn dead_connection_counts_as_not_connected() {
        let link = RelayLink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        link.attach(tx);
        drop(rx);
        assert!(!link.is_attached());
        assert_eq!(link.send(unsubscribe()), Err(TransportError::NotConnected));
    }
}
