//! Command execution pipeline (application-level orchestration).
//!
//! The `CommandDispatcher` runs the same lifecycle for every aggregate:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply history to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (projections, external subscribers)
//! ```
//!
//! Steps 1–4 form the compare-and-swap critical section the whole engine
//! leans on: the decision in step 3 is made against exactly the state whose
//! version step 4 expects, so two racing writers on one stream cannot both
//! commit. The loser gets a `Concurrency` error and, via
//! [`CommandDispatcher::dispatch_with_retry`], re-reads and re-decides.
//! This is how the stock check-and-decrement and the discount priority
//! comparison stay atomic without locks held across calls.
//!
//! Events are persisted before they are published; a failed publish leaves
//! the store correct and surfaces as [`DispatchError::Publish`] so the caller
//! may republish (consumers are idempotent, duplicates are safe).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use emporium_core::{ActorId, Aggregate, AggregateId, DomainError, ExpectedVersion};
use emporium_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Bounded retries for optimistic concurrency conflicts.
///
/// Conflicts resolve in one re-read in the common case; the bound only
/// guards against pathological contention.
const MAX_CONCURRENCY_RETRIES: u32 = 16;

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    Concurrency(String),
    /// Loaded stream mixed aggregates or types (defense in depth).
    AggregateMismatch(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Demand exceeded available stock.
    InsufficientStock { requested: i64, available: i64 },
    /// Attempted status change that is not a legal lifecycle edge.
    InvalidTransition { from: String, to: String },
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may
    /// duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::AggregateMismatch(msg) => {
                DispatchError::AggregateMismatch(msg.clone())
            }
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => DispatchError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InvalidTransition { from, to } => {
                DispatchError::InvalidTransition { from, to }
            }
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests and deployments can wire what
/// they need; the execution model never changes.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// Returns the committed events (possibly empty: aggregates signal
    /// deliberate no-ops by deciding zero events, and nothing is appended or
    /// published for them).
    ///
    /// The `make_aggregate` closure builds a fresh rehydration target (e.g.
    /// `StockRecord::empty`), keeping the dispatcher ignorant of aggregate
    /// construction.
    pub fn dispatch<A>(
        &self,
        actor_id: ActorId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: emporium_events::Event + Serialize + DeserializeOwned,
    {
        self.execute(actor_id, aggregate_id, aggregate_type, command, None, make_aggregate)
    }

    /// Dispatch pinned to a stream version the caller observed earlier.
    ///
    /// Used when side effects were already computed against that observation
    /// (e.g. stock adjustments around a status change): any interleaved
    /// write, even one that would re-decide to the same events, must fail
    /// with `Concurrency` so the caller can compensate, instead of silently
    /// committing an edge the side effects never saw.
    pub fn dispatch_pinned<A>(
        &self,
        actor_id: ActorId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        observed_version: u64,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: emporium_events::Event + Serialize + DeserializeOwned,
    {
        self.execute(
            actor_id,
            aggregate_id,
            aggregate_type,
            command,
            Some(observed_version),
            make_aggregate,
        )
    }

    fn execute<A>(
        &self,
        actor_id: ActorId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        observed_version: Option<u64>,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: emporium_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_type = aggregate_type.into();

        // 1) Load history
        let history = self.store.load_stream(&aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let current = stream_version(&history);
        if let Some(observed) = observed_version
            && observed != current
        {
            return Err(DispatchError::Concurrency(format!(
                "stream moved from observed version {observed} to {current}"
            )));
        }
        let expected = ExpectedVersion::Exact(current);

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    actor_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Dispatch with a bounded retry on optimistic concurrency conflicts.
    ///
    /// Every attempt re-loads the stream and re-runs the aggregate's decision
    /// against fresh state, so a command that loses a race is re-judged, not
    /// blindly re-applied. Deterministic outcomes (validation errors,
    /// insufficient stock, no-ops) are returned as soon as they are decided.
    pub fn dispatch_with_retry<A>(
        &self,
        actor_id: ActorId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: emporium_events::Event + Serialize + DeserializeOwned,
    {
        let mut last_conflict = None;
        for _ in 0..=MAX_CONCURRENCY_RETRIES {
            match self.dispatch(
                actor_id,
                aggregate_id,
                aggregate_type,
                command.clone(),
                &make_aggregate,
            ) {
                Err(DispatchError::Concurrency(msg)) => last_conflict = Some(msg),
                other => return other,
            }
        }

        Err(DispatchError::Concurrency(last_conflict.unwrap_or_else(
            || "retries exhausted".to_string(),
        )))
    }

    /// Rehydrate an aggregate for a read-only decision (no mutation).
    pub fn load<A>(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: emporium_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Ensure the stream belongs to the requested aggregate and is
    // monotonically increasing by sequence number, even if a buggy backend
    // returns something else.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::AggregateMismatch(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
