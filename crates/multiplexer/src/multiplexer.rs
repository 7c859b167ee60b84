//! Job log registry.
//!
//! One [`LogMultiplexer`] per process, shared by `Arc`. Each job name maps to
//! a [`JobEntry`] holding the accumulated output and the viewers currently
//! watching it. The transport subscription for a job follows the size of its
//! subscriber set: `subscribe_logs` goes out on 0 -> 1, `unsubscribe_logs` on
//! 1 -> 0, however many viewers come and go in between.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use joblog_types::{ControlMessage, ProtocolError, TransportEvent};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::subscriber::{LogSnapshot, Subscriber, SubscriberId};
use crate::transport::ControlTransport;

#[derive(Default)]
struct JobEntry {
    buffer: String,
    /// Sequence number of the last change to `buffer`.
    seq: u64,
    subscribers: HashMap<SubscriberId, Subscriber>,
    /// Whether the last `subscribe_logs` for this job was handed to the
    /// transport and has not since been withdrawn or rejected.
    transport_live: bool,
    /// Correlation id of a `subscribe_logs` still waiting for its ack.
    pending_ack: Option<String>,
}

impl JobEntry {
    fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            seq: self.seq,
            text: Arc::from(self.buffer.as_str()),
        }
    }

    fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.subscribers.is_empty()
    }

    fn targets(&self) -> Vec<Subscriber> {
        self.subscribers.values().cloned().collect()
    }
}

/// Result of [`LogMultiplexer::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    /// Buffer contents at the moment of subscribing.
    pub snapshot: LogSnapshot,
    /// False when the handle was already registered.
    pub added: bool,
    /// Set when `subscribe_logs` could not be handed to the transport. The
    /// subscriber is registered anyway and sees buffered output.
    pub warning: Option<TransportError>,
}

/// Result of [`LogMultiplexer::unsubscribe`].
#[derive(Debug, Default)]
pub struct Unsubscription {
    /// False when the job or handle was unknown.
    pub removed: bool,
    /// Set when `unsubscribe_logs` could not be handed to the transport. The
    /// subscriber is removed anyway.
    pub warning: Option<TransportError>,
}

/// Process-wide registry of job buffers and their viewers.
pub struct LogMultiplexer {
    jobs: DashMap<String, JobEntry>,
    transport: Arc<dyn ControlTransport>,
    /// Outstanding `subscribe_logs` correlation id -> job name.
    pending_acks: DashMap<String, String>,
    next_correlation: AtomicU64,
    next_seq: AtomicU64,
}

impl LogMultiplexer {
    pub fn new(transport: Arc<dyn ControlTransport>) -> Self {
        Self {
            jobs: DashMap::new(),
            transport,
            pending_acks: DashMap::new(),
            next_correlation: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
        }
    }

    fn entry_mut(&self, job: &str) -> RefMut<'_, String, JobEntry> {
        match self.jobs.get_mut(job) {
            Some(entry) => entry,
            None => self.jobs.entry(job.to_owned()).or_default(),
        }
    }

    fn bump_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop the entry if it no longer carries anything. Re-checked under the
    /// entry lock since another caller may have touched it in between.
    fn forget_if_idle(&self, job: &str) {
        self.jobs.remove_if(job, |_, entry| entry.is_idle());
    }

    /// Send `subscribe_logs` for `job`. Caller holds the entry lock.
    fn send_subscribe(&self, job: &str, entry: &mut JobEntry) -> Option<TransportError> {
        if let Some(stale) = entry.pending_ack.take() {
            self.pending_acks.remove(&stale);
        }

        let id = self
            .next_correlation
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let msg = ControlMessage::SubscribeLogs {
            id: id.clone(),
            name: job.to_owned(),
        };

        match self.transport.send(msg) {
            Ok(()) => {
                info!(job = %job, correlation_id = %id, "subscribe_logs sent");
                entry.transport_live = true;
                self.pending_acks.insert(id.clone(), job.to_owned());
                entry.pending_ack = Some(id);
                None
            }
            Err(e) => {
                warn!(job = %job, error = %e, "subscribe_logs not sent, buffered output only");
                entry.transport_live = false;
                Some(e)
            }
        }
    }

    /// Register `subscriber` for `job` and return the buffer so far.
    ///
    /// The first subscriber of a job triggers `subscribe_logs`. Registering a
    /// handle that is already present changes nothing, except that a
    /// subscription whose earlier send failed is retried.
    pub fn subscribe(&self, job: &str, subscriber: Subscriber) -> Subscription {
        let mut entry = self.entry_mut(job);

        let id = subscriber.id();
        let added = match entry.subscribers.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(subscriber);
                true
            }
            Entry::Occupied(_) => false,
        };

        let warning = if entry.transport_live {
            None
        } else {
            self.send_subscribe(job, &mut entry)
        };

        if added {
            debug!(
                job = %job,
                subscriber = %id,
                subscribers = entry.subscribers.len(),
                "viewer subscribed"
            );
        }

        Subscription {
            snapshot: entry.snapshot(),
            added,
            warning,
        }
    }

    /// Remove a subscriber. The last one out triggers `unsubscribe_logs`.
    /// Unknown jobs and handles are ignored.
    pub fn unsubscribe(&self, job: &str, id: SubscriberId) -> Unsubscription {
        let Some(mut entry) = self.jobs.get_mut(job) else {
            return Unsubscription::default();
        };
        if entry.subscribers.remove(&id).is_none() {
            return Unsubscription::default();
        }
        debug!(
            job = %job,
            subscriber = %id,
            subscribers = entry.subscribers.len(),
            "viewer unsubscribed"
        );

        let mut warning = None;
        if entry.subscribers.is_empty() && entry.transport_live {
            entry.transport_live = false;
            if let Some(stale) = entry.pending_ack.take() {
                self.pending_acks.remove(&stale);
            }
            let msg = ControlMessage::UnsubscribeLogs {
                name: job.to_owned(),
            };
            match self.transport.send(msg) {
                Ok(()) => info!(job = %job, "unsubscribe_logs sent"),
                Err(e) => {
                    warn!(job = %job, error = %e, "unsubscribe_logs not sent");
                    warning = Some(e);
                }
            }
        }

        let idle = entry.is_idle();
        drop(entry);
        if idle {
            self.forget_if_idle(job);
        }

        Unsubscription {
            removed: true,
            warning,
        }
    }

    /// Append a chunk of output for `job` and push the whole buffer to its
    /// current subscribers. Chunks for jobs nobody watches are still kept.
    pub fn dispatch_chunk(&self, job: &str, chunk: &str) {
        if chunk.is_empty() {
            return;
        }

        let (snapshot, targets) = {
            let mut entry = self.entry_mut(job);
            entry.buffer.push_str(chunk);
            entry.seq = self.bump_seq();
            if entry.subscribers.is_empty() {
                debug!(job = %job, bytes = chunk.len(), "log chunk buffered, no viewers");
                return;
            }
            (entry.snapshot(), entry.targets())
        };

        debug!(
            job = %job,
            bytes = chunk.len(),
            seq = snapshot.seq,
            subscribers = targets.len(),
            "log chunk dispatched"
        );
        for subscriber in &targets {
            subscriber.deliver(&snapshot);
        }
    }

    /// Empty the buffer for `job` and push the empty buffer to its
    /// subscribers. Subscription state is untouched.
    pub fn clear_buffer(&self, job: &str) {
        let (snapshot, targets) = {
            let Some(mut entry) = self.jobs.get_mut(job) else {
                return;
            };
            entry.buffer.clear();
            entry.seq = self.bump_seq();
            (entry.snapshot(), entry.targets())
        };

        debug!(job = %job, subscribers = targets.len(), "log buffer cleared");
        if targets.is_empty() {
            self.forget_if_idle(job);
            return;
        }
        for subscriber in &targets {
            subscriber.deliver(&snapshot);
        }
    }

    /// Apply one decoded frame from the transport.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::LogChunk { name, content, .. } => self.dispatch_chunk(&name, &content),
            TransportEvent::SubscribeLogsAck { id, success } => self.acknowledge(&id, success),
            TransportEvent::Other => {}
        }
    }

    /// Decode and apply one raw frame from the transport.
    pub fn handle_frame(&self, frame: &str) -> Result<(), ProtocolError> {
        let event = TransportEvent::from_json(frame).inspect_err(|e| {
            warn!(error = %e, bytes = frame.len(), "dropping malformed transport frame");
        })?;
        self.handle_event(event);
        Ok(())
    }

    fn acknowledge(&self, id: &str, success: bool) {
        let Some((_, job)) = self.pending_acks.remove(id) else {
            debug!(correlation_id = %id, "ack for unknown or superseded subscribe_logs");
            return;
        };
        let Some(mut entry) = self.jobs.get_mut(&job) else {
            return;
        };
        if entry.pending_ack.as_deref() != Some(id) {
            return;
        }
        entry.pending_ack = None;
        if !success {
            warn!(job = %job, correlation_id = %id, "subscribe_logs rejected by transport");
            entry.transport_live = false;
        }
    }

    /// Forget every live transport subscription, e.g. after the connection
    /// dropped. Subscribers and buffers are kept.
    pub fn transport_lost(&self) {
        for mut entry in self.jobs.iter_mut() {
            entry.transport_live = false;
            entry.pending_ack = None;
        }
        self.pending_acks.clear();
    }

    /// Send `subscribe_logs` for every watched job that has no live transport
    /// subscription. Called once a fresh connection is up. Returns how many
    /// subscriptions were sent successfully.
    pub fn resubscribe_all(&self) -> usize {
        let mut sent = 0;
        for mut entry in self.jobs.iter_mut() {
            if entry.subscribers.is_empty() || entry.transport_live {
                continue;
            }
            let job = entry.key().clone();
            if self.send_subscribe(&job, entry.value_mut()).is_none() {
                sent += 1;
            }
        }
        sent
    }

    /// Current buffer for `job`, if anything is known about it.
    pub fn snapshot(&self, job: &str) -> Option<LogSnapshot> {
        self.jobs.get(job).map(|entry| entry.snapshot())
    }

    pub fn subscriber_count(&self, job: &str) -> usize {
        self.jobs
            .get(job)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    /// Whether a transport subscription is believed to be live for `job`.
    pub fn is_subscribed(&self, job: &str) -> bool {
        self.jobs
            .get(job)
            .is_some_and(|entry| entry.transport_live)
    }

    /// Jobs with at least one subscriber, sorted by name.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| !entry.subscribers.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        jobs.sort();
        jobs
    }
}
