use std::collections::HashMap;
use std::sync::RwLock;

use emporium_core::{AggregateId, ExpectedVersion};

use super::store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// The default backend for tests and single-process deployments. The append
/// path holds the write lock for the whole check-and-insert, so the version
/// check and the sequence assignment are atomic with respect to concurrent
/// appends on the same stream.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events in a batch must target the same aggregate stream.
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::AggregateMismatch(format!(
                    "event at index {idx} targets a different aggregate_id"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateMismatch(format!(
                    "event at index {idx} targets a different aggregate_type"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("store lock poisoned".to_string()))?;

        let key = StreamKey {
            aggregate_type,
            aggregate_id,
        };
        let stream = streams.entry(key).or_default();

        let current = Self::current_version(stream);
        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, stream is at {current}"
            )));
        }

        let mut committed = Vec::with_capacity(events.len());
        for (offset, e) in events.into_iter().enumerate() {
            let stored = StoredEvent {
                event_id: e.event_id,
                actor_id: e.actor_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: current + 1 + offset as u64,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("store lock poisoned".to_string()))?;

        let key = StreamKey {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
        };
        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emporium_core::ActorId;
    use serde_json::json;

    fn uncommitted(aggregate_id: AggregateId, event_type: &str) -> UncommittedEvent {
        uncommitted_typed(aggregate_id, "test.aggregate", event_type)
    }

    fn uncommitted_typed(
        aggregate_id: AggregateId,
        aggregate_type: &str,
        event_type: &str,
    ) -> UncommittedEvent {
        UncommittedEvent {
            event_id: uuid::Uuid::now_v7(),
            actor_id: ActorId::new(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: event_type.to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({"k": "v"}),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let first = store
            .append(vec![uncommitted(aggregate_id, "a")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first[0].sequence_number, 1);

        let second = store
            .append(
                vec![uncommitted(aggregate_id, "b"), uncommitted(aggregate_id, "c")],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);

        let stream = store.load_stream("test.aggregate", aggregate_id).unwrap();
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(vec![uncommitted(aggregate_id, "a")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![uncommitted(aggregate_id, "b")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_aggregate_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let err = store
            .append(
                vec![
                    uncommitted(AggregateId::new(), "a"),
                    uncommitted(AggregateId::new(), "b"),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateMismatch(_)));
    }

    #[test]
    fn same_id_different_type_is_a_separate_stream() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![uncommitted_typed(aggregate_id, "inventory.stock", "a")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        store
            .append(
                vec![uncommitted_typed(aggregate_id, "pricing.discount", "b")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        assert_eq!(
            store
                .load_stream("inventory.stock", aggregate_id)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store
                .load_stream("pricing.discount", aggregate_id)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn unknown_stream_loads_empty() {
        let store = InMemoryEventStore::new();
        assert!(
            store
                .load_stream("test.aggregate", AggregateId::new())
                .unwrap()
                .is_empty()
        );
    }
}
