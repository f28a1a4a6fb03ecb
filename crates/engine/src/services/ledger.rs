//! The stock ledger service: reserve / release / adjust.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::warn;

use emporium_catalog::ProductId;
use emporium_core::{ActorId, AggregateId};
use emporium_events::{EventBus, EventEnvelope};
use emporium_inventory::{
    AdjustStock, ReleaseStock, ReserveStock, StockCause, StockCommand, StockRecord,
};

use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::error::{EngineError, Shortfall};
use crate::event_store::EventStore;
use crate::streams;

/// Write side of the per-product stock counter.
///
/// `reserve` is the single check-and-decrement point: the quantity check and
/// the decrement are decided inside the stock stream's compare-and-swap
/// critical section, and a lost race re-reads before re-deciding. `release`
/// and `adjust` exist to reverse reservations and to apply supplier receipts
/// and manual corrections.
#[derive(Debug)]
pub struct StockLedger<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> Clone for StockLedger<S, B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S, B> StockLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    /// Atomically check-and-decrement stock for a sales commitment.
    pub fn reserve(
        &self,
        product_id: ProductId,
        order_id: AggregateId,
        quantity: i64,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher
            .dispatch_with_retry(
                actor_id,
                product_id.0,
                streams::STOCK,
                StockCommand::ReserveStock(ReserveStock {
                    product_id,
                    order_id,
                    quantity,
                    actor_id,
                    occurred_at: now,
                }),
                |id| StockRecord::empty(ProductId::new(id)),
            )
            .map(|_| ())
            .map_err(|e| Self::with_product_context(e, product_id))
    }

    /// Reverse a previous reservation. Unconditional addition.
    pub fn release(
        &self,
        product_id: ProductId,
        order_id: AggregateId,
        quantity: i64,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher
            .dispatch_with_retry(
                actor_id,
                product_id.0,
                streams::STOCK,
                StockCommand::ReleaseStock(ReleaseStock {
                    product_id,
                    order_id,
                    quantity,
                    actor_id,
                    occurred_at: now,
                }),
                |id| StockRecord::empty(ProductId::new(id)),
            )
            .map(|_| ())
            .map_err(|e| Self::with_product_context(e, product_id))
    }

    /// Apply a supplier receipt or manual correction.
    ///
    /// Positive deltas always succeed; a negative delta fails with
    /// `InsufficientStock` rather than driving the counter below zero.
    pub fn adjust(
        &self,
        product_id: ProductId,
        delta: i64,
        cause: StockCause,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher
            .dispatch_with_retry(
                actor_id,
                product_id.0,
                streams::STOCK,
                StockCommand::AdjustStock(AdjustStock {
                    product_id,
                    delta,
                    cause,
                    actor_id,
                    occurred_at: now,
                }),
                |id| StockRecord::empty(ProductId::new(id)),
            )
            .map(|_| ())
            .map_err(|e| Self::with_product_context(e, product_id))
    }

    /// Reserve every line or none of them.
    ///
    /// Attempts all lines so the error names every short-falling product,
    /// then releases whatever was reserved before reporting the failure.
    pub fn reserve_all(
        &self,
        lines: &[(ProductId, i64)],
        order_id: AggregateId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut reserved: Vec<(ProductId, i64)> = Vec::with_capacity(lines.len());
        let mut shortfalls: Vec<Shortfall> = Vec::new();

        for (product_id, quantity) in lines {
            match self.reserve(*product_id, order_id, *quantity, actor_id, now) {
                Ok(()) => reserved.push((*product_id, *quantity)),
                Err(EngineError::InsufficientStock { shortfalls: mut s }) => {
                    shortfalls.append(&mut s);
                }
                Err(other) => {
                    self.release_all(&reserved, order_id, actor_id, now);
                    return Err(other);
                }
            }
        }

        if !shortfalls.is_empty() {
            self.release_all(&reserved, order_id, actor_id, now);
            return Err(EngineError::InsufficientStock { shortfalls });
        }

        Ok(())
    }

    /// Release every line, best-effort.
    ///
    /// A release cannot under-run; failures here are infrastructure trouble
    /// and are logged rather than propagated, so a cancellation is never
    /// blocked on its stock bookkeeping.
    pub fn release_all(
        &self,
        lines: &[(ProductId, i64)],
        order_id: AggregateId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) {
        for (product_id, quantity) in lines {
            if let Err(e) = self.release(*product_id, order_id, *quantity, actor_id, now) {
                warn!(
                    product_id = %product_id,
                    quantity,
                    error = %e,
                    "stock release failed; counter needs manual correction"
                );
            }
        }
    }

    /// Apply every delta or none of them.
    ///
    /// Mirrors [`Self::reserve_all`]: all lines are attempted so every
    /// short-falling product is reported, and already-applied deltas are
    /// reverted before the failure returns.
    pub fn adjust_all(
        &self,
        deltas: &[(ProductId, i64)],
        cause: StockCause,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut applied: Vec<(ProductId, i64)> = Vec::with_capacity(deltas.len());
        let mut shortfalls: Vec<Shortfall> = Vec::new();

        for (product_id, delta) in deltas {
            match self.adjust(*product_id, *delta, cause, actor_id, now) {
                Ok(()) => applied.push((*product_id, *delta)),
                Err(EngineError::InsufficientStock { shortfalls: mut s }) => {
                    shortfalls.append(&mut s);
                }
                Err(other) => {
                    self.revert_all(&applied, cause, actor_id, now);
                    return Err(other);
                }
            }
        }

        if !shortfalls.is_empty() {
            self.revert_all(&applied, cause, actor_id, now);
            return Err(EngineError::InsufficientStock { shortfalls });
        }

        Ok(())
    }

    /// Revert previously applied deltas, best-effort.
    pub fn revert_all(
        &self,
        applied: &[(ProductId, i64)],
        cause: StockCause,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) {
        for (product_id, delta) in applied {
            if let Err(e) = self.adjust(*product_id, -delta, cause, actor_id, now) {
                warn!(
                    product_id = %product_id,
                    delta = -delta,
                    error = %e,
                    "stock adjustment revert failed; counter needs manual correction"
                );
            }
        }
    }

    fn with_product_context(error: DispatchError, product_id: ProductId) -> EngineError {
        match error {
            DispatchError::InsufficientStock {
                requested,
                available,
            } => EngineError::InsufficientStock {
                shortfalls: vec![Shortfall {
                    product_id,
                    requested,
                    available,
                }],
            },
            other => other.into(),
        }
    }
}
