//! WebSocket client that carries control messages to the relay and feeds
//! inbound log frames into the multiplexer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use joblog_multiplexer::LogMultiplexer;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::RelayClientConfig;
use crate::link::RelayLink;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
}

/// Spawn the relay client as a background task.
///
/// Returns `None` when no relay URL is configured. The task runs until
/// aborted, reconnecting with exponential backoff.
pub fn spawn_relay_client(
    mux: Arc<LogMultiplexer>,
    link: Arc<RelayLink>,
    config: RelayClientConfig,
) -> Option<JoinHandle<()>> {
    let Some(relay_url) = config.relay_url.clone() else {
        info!("JOBLOG_RELAY_URL not set, relay client disabled");
        return None;
    };

    Some(tokio::spawn(async move {
        info!(%relay_url, "relay client starting");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match connect_and_stream(&mux, &link, &relay_url, &config).await {
                Ok(()) => {
                    info!("relay connection closed cleanly");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    warn!(backoff_secs = backoff.as_secs(), error = %e, "relay connection failed");
                }
            }

            link.detach();
            mux.transport_lost();

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.max_reconnect_delay);
        }
    }))
}

async fn connect_and_stream(
    mux: &LogMultiplexer,
    link: &RelayLink,
    relay_url: &str,
    config: &RelayClientConfig,
) -> Result<(), RelayError> {
    let (ws_stream, _) = connect_async(relay_url)
        .await
        .map_err(RelayError::Connect)?;
    let (mut sink, mut stream) = ws_stream.split();

    let (tx, mut outbound) = mpsc::unbounded_channel::<String>();
    link.attach(tx);
    let resent = mux.resubscribe_all();
    info!(resubscribed = resent, "relay connected");

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                // The link holds the only sender, so `None` means it was detached.
                let Some(frame) = frame else { return Ok(()) };
                sink.send(Message::Text(frame.into()))
                    .await
                    .map_err(RelayError::Send)?;
            }
            _ = heartbeat.tick() => {
                sink.send(Message::Ping(Vec::new().into()))
                    .await
                    .map_err(RelayError::Send)?;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Malformed frames are logged by the multiplexer and skipped.
                        let _ = mux.handle_frame(text.as_str());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "relay sent close");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(RelayError::Receive(e)),
                    None => return Ok(()),
                }
            }
        }
    }
}
