use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use emporium_catalog::ProductId;
use emporium_events::EventEnvelope;
use emporium_pricing::{DiscountEvent, DiscountState};

use super::cursor::{CursorDecision, StreamCursors};
use super::ProjectionError;
use crate::read_model::ReadModelStore;

/// Queryable discount read model: the discount occupying each product's slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountReadModel {
    pub product_id: ProductId,
    pub discount: DiscountState,
}

/// Discount board projection.
///
/// Read side of the per-product discount slot: the pricing snapshot and rule
/// previews query it. The authoritative overwrite decision always happens in
/// the slot aggregate, not here.
#[derive(Debug)]
pub struct DiscountBoardProjection<S>
where
    S: ReadModelStore<ProductId, DiscountReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> DiscountBoardProjection<S>
where
    S: ReadModelStore<ProductId, DiscountReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// The discount active for a product at `now`, if any.
    pub fn active(&self, product_id: &ProductId, now: DateTime<Utc>) -> Option<DiscountState> {
        self.store
            .get(product_id)
            .map(|rm| rm.discount)
            .filter(|d| d.is_active_at(now))
    }

    /// The discount occupying the slot regardless of activity (history view).
    pub fn current(&self, product_id: &ProductId) -> Option<DiscountState> {
        self.store.get(product_id).map(|rm| rm.discount)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let decision = self
            .cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        if decision == CursorDecision::Duplicate {
            return Ok(());
        }

        let event: DiscountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            DiscountEvent::DiscountAssigned(e) => {
                if e.product_id.0 != envelope.aggregate_id() {
                    return Err(ProjectionError::AggregateMismatch(
                        "product_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.product_id,
                    DiscountReadModel {
                        product_id: e.product_id,
                        discount: DiscountState {
                            percent: e.percent,
                            starts_at: e.starts_at,
                            ends_at: e.ends_at,
                            source: e.source,
                        },
                    },
                );
            }
            DiscountEvent::DiscountEnded(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.discount.ends_at = Some(e.ended_at);
                    self.store.upsert(e.product_id, rm);
                }
            }
        }

        Ok(())
    }
}
