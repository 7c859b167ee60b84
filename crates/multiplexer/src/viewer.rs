use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::TransportError;
use crate::multiplexer::LogMultiplexer;
use crate::subscriber::{LogSnapshot, Subscriber, SubscriberId, WatchSink};

/// A subscription that ends when dropped.
///
/// Wraps a [`WatchSink`], so a slow reader skips intermediate buffers and
/// always wakes up to the newest one.
pub struct LogViewer {
    mux: Arc<LogMultiplexer>,
    job: String,
    id: SubscriberId,
    rx: watch::Receiver<LogSnapshot>,
    warning: Option<TransportError>,
}

impl LogViewer {
    pub fn open(mux: Arc<LogMultiplexer>, job: impl Into<String>) -> Self {
        let job = job.into();
        let (sink, rx) = WatchSink::channel();
        let sink = Subscriber::new(sink);
        let id = sink.id();

        let subscription = mux.subscribe(&job, sink.clone());
        // The replay goes through the sink so `current` sees it immediately.
        if !subscription.snapshot.is_empty() {
            sink.deliver(&subscription.snapshot);
        }

        Self {
            mux,
            job,
            id,
            rx,
            warning: subscription.warning,
        }
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Transport failure reported when the viewer was opened.
    pub fn warning(&self) -> Option<&TransportError> {
        self.warning.as_ref()
    }

    pub fn current(&self) -> LogSnapshot {
        self.rx.borrow().clone()
    }

    pub fn canonical(&self, max_separator_width: usize) -> String {
        self.rx.borrow().canonical(max_separator_width)
    }

    /// Wait for the next buffer change. `None` once the multiplexer side is
    /// gone.
    pub async fn changed(&mut self) -> Option<LogSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Clear the job's buffer for every viewer of it.
    pub fn clear(&self) {
        self.mux.clear_buffer(&self.job);
    }
}

impl Drop for LogViewer {
    fn drop(&mut self) {
        debug!(job = %self.job, subscriber = %self.id, "viewer closed");
        self.mux.unsubscribe(&self.job, self.id);
    }
}
