use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Control messages sent to the transport to start or stop a job's log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    SubscribeLogs {
        /// Correlation id echoed back in `subscribe_logs_ack`.
        id: String,
        name: String,
    },
    UnsubscribeLogs {
        name: String,
    },
}

impl ControlMessage {
    /// Job the message refers to.
    pub fn job(&self) -> &str {
        match self {
            Self::SubscribeLogs { name, .. } | Self::UnsubscribeLogs { name } => name,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Frames arriving from the transport that the log subsystem cares about.
///
/// The connection is shared with unrelated traffic (job lists, status
/// updates, ...), so any other `type` decodes as [`TransportEvent::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    /// Output for a subscribed job.
    LogChunk {
        name: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Ack for `subscribe_logs`.
    SubscribeLogsAck { id: String, success: bool },
    #[serde(other)]
    Other,
}

impl TransportEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode transport frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode control message: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn subscribe_wire_format() {
        let msg = ControlMessage::SubscribeLogs {
            id: "7".into(),
            name: "nightly".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "subscribe_logs", "id": "7", "name": "nightly"})
        );
    }

    #[test]
    fn unsubscribe_wire_format() {
        let msg = ControlMessage::UnsubscribeLogs {
            name: "nightly".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "unsubscribe_logs", "name": "nightly"}));
        assert_eq!(msg.job(), "nightly");
    }

    #[test]
    fn log_chunk_decodes_with_and_without_timestamp() {
        let with = TransportEvent::from_json(
            r#"{"type":"log_chunk","name":"build","content":"ok\n","timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            with,
            TransportEvent::LogChunk {
                name: "build".into(),
                content: "ok\n".into(),
                timestamp: Some("2026-01-01T00:00:00Z".into()),
            }
        );

        let without =
            TransportEvent::from_json(r#"{"type":"log_chunk","name":"build","content":""}"#)
                .unwrap();
        assert!(matches!(without, TransportEvent::LogChunk { timestamp: None, .. }));
    }

    #[test]
    fn ack_decodes() {
        let ack =
            TransportEvent::from_json(r#"{"type":"subscribe_logs_ack","id":"3","success":false}"#)
                .unwrap();
        assert_eq!(
            ack,
            TransportEvent::SubscribeLogsAck {
                id: "3".into(),
                success: false
            }
        );
    }

    #[test]
    fn unrelated_frames_decode_as_other() {
        let event = TransportEvent::from_json(r#"{"type":"status_update","name":"x"}"#).unwrap();
        assert_eq!(event, TransportEvent::Other);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = TransportEvent::from_json("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
