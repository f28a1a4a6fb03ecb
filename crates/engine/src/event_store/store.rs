use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use emporium_core::{ActorId, AggregateId, ExpectedVersion};

/// An event ready to be appended to a stream (not yet assigned a sequence
/// number).
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`],
/// which serializes the payload and captures the event metadata needed to
/// deserialize it later. The store assigns sequence numbers during append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: uuid::Uuid,
    pub actor_id: ActorId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream.
///
/// Sequence numbers are assigned by the store, are monotonically increasing
/// per stream (one stream per aggregate instance), and never change. They
/// drive ordering, optimistic concurrency, and projection idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: uuid::Uuid,
    pub actor_id: ActorId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> emporium_events::EventEnvelope<JsonValue> {
        emporium_events::EventEnvelope::new(
            self.event_id,
            self.actor_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error (infrastructure, not domain).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed: another writer appended to the
    /// stream between load and append. Retrying against fresh state is safe.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Events in one append batch targeted different streams or the stream's
    /// recorded aggregate type does not match.
    #[error("aggregate stream mismatch: {0}")]
    AggregateMismatch(String),

    /// Invalid event data or stream state.
    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only event store, one stream per aggregate instance.
///
/// Streams are keyed by `(aggregate_type, aggregate_id)`: the stock record,
/// the discount slot, and the catalog entry of one product share the same id
/// but live in separate streams.
///
/// Implementations must:
/// - enforce optimistic concurrency against the current stream version,
/// - assign monotonically increasing `sequence_number`s starting at
///   `current_version + 1`,
/// - persist each append batch atomically (all events or none),
/// - never mutate or delete stored events.
///
/// The version check is what turns the aggregates' pure decisions into
/// compare-and-swap transactions: a decision made against stale state fails
/// its append and the caller re-reads before re-deciding.
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream (append-only).
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for one aggregate, in sequence number order.
    ///
    /// Returns an empty vector for a stream that does not exist yet.
    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_type, aggregate_id)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infrastructure decoupled from the domain crates while still
    /// capturing the metadata needed for future deserialization.
    pub fn from_typed<E>(
        actor_id: ActorId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: uuid::Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: emporium_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            actor_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
