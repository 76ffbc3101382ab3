//! Event sinks for external observers
//!
//! The registry appends an [`EventRecord`] for every state transition, after
//! the transition has been applied. Sinks are append-only; nothing in the
//! registry reads them back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use escrowkit_types::{EscrowEvent, EventRecord, TransactionId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::info;

/// Append-only destination for escrow events
pub trait EventSink: Send + Sync {
    fn record(&self, record: EventRecord);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _record: EventRecord) {}
}

/// Keeps every event in memory for inspection
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    records: RwLock<Vec<EventRecord>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }

    /// All events in append order
    pub fn events(&self) -> Vec<EscrowEvent> {
        self.records.read().iter().map(|r| r.event.clone()).collect()
    }

    /// Events of one transaction in append order
    pub fn events_for(&self, transaction_id: TransactionId) -> Vec<EscrowEvent> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.transaction_id() == transaction_id)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Number of events with the given name (e.g. `"Accepted"`)
    pub fn count(&self, name: &str) -> usize {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.name() == name)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, record: EventRecord) {
        self.records.write().push(record);
    }
}

/// Fans events out to live subscribers
///
/// Subscribers that lag behind the buffer lose the oldest events; the
/// registry never blocks on them.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EventRecord>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastEventSink {
    fn record(&self, record: EventRecord) {
        // No subscribers is not an error.
        let _ = self.sender.send(record);
    }
}

/// Writes every event to the `tracing` log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, record: EventRecord) {
        let payload = serde_json::to_string(&record.event).unwrap_or_default();
        info!(
            seq = record.sequence,
            tx = %record.event.transaction_id(),
            event = record.event.name(),
            payload = %payload,
            "escrow event"
        );
    }
}

/// Forwards every event to several sinks, in order
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn record(&self, record: EventRecord) {
        for sink in &self.sinks {
            sink.record(record.clone());
        }
    }
}

/// Stamps events with a registry-wide sequence number and hands them to a sink
pub(crate) struct EventLog {
    sink: Arc<dyn EventSink>,
    next_sequence: Mutex<u64>,
}

impl EventLog {
    pub(crate) fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            next_sequence: Mutex::new(0),
        }
    }

    /// Append events as one contiguous run of sequence numbers
    pub(crate) fn emit_all(&self, at: DateTime<Utc>, events: Vec<EscrowEvent>) {
        let mut next = self.next_sequence.lock();
        for event in events {
            self.sink.record(EventRecord {
                sequence: *next,
                recorded_at: at,
                event,
            });
            *next += 1;
        }
    }

    pub(crate) fn emit(&self, at: DateTime<Utc>, event: EscrowEvent) {
        self.emit_all(at, vec![event]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrowkit_types::Role;

    fn accepted(id: u64) -> EscrowEvent {
        EscrowEvent::Accepted {
            transaction_id: TransactionId::new(id),
            party: "alice".into(),
            role: Role::Sender,
        }
    }

    #[test]
    fn test_event_log_assigns_contiguous_sequences() {
        let sink = Arc::new(MemoryEventSink::new());
        let log = EventLog::new(sink.clone());

        log.emit(Utc::now(), accepted(0));
        log.emit_all(Utc::now(), vec![accepted(1), accepted(1)]);

        let sequences: Vec<u64> = sink.records().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(sink.events_for(TransactionId::new(1)).len(), 2);
        assert_eq!(sink.count("Accepted"), 3);
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(16);
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        let log = EventLog::new(Arc::new(sink.clone()));
        log.emit(Utc::now(), accepted(3));

        let record = rx.recv().await.unwrap();
        assert_eq!(record.sequence, 0);
        assert_eq!(record.event, accepted(3));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let sink = BroadcastEventSink::new(4);
        let log = EventLog::new(Arc::new(sink));
        log.emit(Utc::now(), accepted(0));
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemoryEventSink::new());
        let b = Arc::new(MemoryEventSink::new());
        let fanout = FanoutEventSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(TracingEventSink));
        let log = EventLog::new(Arc::new(fanout));

        log.emit(Utc::now(), accepted(0));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
