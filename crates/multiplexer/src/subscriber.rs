use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Queue depth used by [`ChannelSink`] when callers have no preference.
pub const DEFAULT_SINK_CAPACITY: usize = 16;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a subscriber. Two handles are the same
/// subscriber iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Full contents of a job's buffer at one point in time.
///
/// `seq` increases with every change to any buffer, so a sink that receives
/// snapshots out of order can keep the newest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSnapshot {
    pub seq: u64,
    pub text: Arc<str>,
}

impl Default for LogSnapshot {
    fn default() -> Self {
        Self {
            seq: 0,
            text: Arc::from(""),
        }
    }
}

impl LogSnapshot {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Canonicalized form for display.
    pub fn canonical(&self, max_separator_width: usize) -> String {
        joblog_core::collapse(&self.text, max_separator_width)
    }
}

/// Receives buffer snapshots for one viewer.
///
/// Called inline on whatever thread dispatched the chunk, with no multiplexer
/// lock held. A sink that blocks stalls that thread, and with it every later
/// chunk for every job the thread dispatches. Hand the snapshot off and
/// return: [`WatchSink`] keeps only the newest, [`ChannelSink`] drops when
/// its queue is full.
pub trait LogSink: Send + Sync + 'static {
    fn deliver(&self, snapshot: &LogSnapshot);
}

#[cfg(test)]
struct FnSink<F>(F);

#[cfg(test)]
impl<F> LogSink for FnSink<F>
where
    F: Fn(&LogSnapshot) + Send + Sync + 'static,
{
    fn deliver(&self, snapshot: &LogSnapshot) {
        (self.0)(snapshot)
    }
}

/// A registered viewer: an id plus the sink snapshots go to.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn LogSink>,
}

impl Subscriber {
    pub fn new(sink: impl LogSink) -> Self {
        Self {
            id: SubscriberId::next(),
            sink: Arc::new(sink),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_fn(f: impl Fn(&LogSnapshot) + Send + Sync + 'static) -> Self {
        Self::new(FnSink(f))
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn deliver(&self, snapshot: &LogSnapshot) {
        self.sink.deliver(snapshot);
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Latest-value sink over a `tokio::sync::watch` channel. A slow reader only
/// ever sees the newest snapshot; stale ones are discarded by `seq`.
pub struct WatchSink {
    tx: watch::Sender<LogSnapshot>,
}

impl WatchSink {
    pub fn channel() -> (Self, watch::Receiver<LogSnapshot>) {
        let (tx, rx) = watch::channel(LogSnapshot::default());
        (Self { tx }, rx)
    }
}

impl LogSink for WatchSink {
    fn deliver(&self, snapshot: &LogSnapshot) {
        self.tx.send_if_modified(|current| {
            if snapshot.seq > current.seq {
                *current = snapshot.clone();
                true
            } else {
                false
            }
        });
    }
}

/// Bounded queue sink. Snapshots that do not fit are dropped; the next one
/// carries the full buffer anyway.
pub struct ChannelSink {
    tx: mpsc::Sender<LogSnapshot>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn deliver(&self, snapshot: &LogSnapshot) {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(seq = snapshot.seq, "viewer queue full, dropping snapshot");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
