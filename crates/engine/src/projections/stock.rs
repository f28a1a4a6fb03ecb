use serde_json::Value as JsonValue;

use emporium_catalog::ProductId;
use emporium_events::EventEnvelope;
use emporium_inventory::StockEvent;

use super::cursor::{CursorDecision, StreamCursors};
use super::ProjectionError;
use crate::read_model::ReadModelStore;

/// Queryable stock read model: current on-hand quantity per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReadModel {
    pub product_id: ProductId,
    pub on_hand: i64,
}

/// Stock levels projection.
///
/// Feeds the checkout's soft availability check and the stock-range rule
/// predicate. The ledger itself never reads this view; its decisions run
/// against the rehydrated stream.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<ProductId, StockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// On-hand quantity for one product (zero when no stock was ever moved).
    pub fn on_hand(&self, product_id: &ProductId) -> i64 {
        self.store.get(product_id).map_or(0, |rm| rm.on_hand)
    }

    pub fn list(&self) -> Vec<StockReadModel> {
        self.store.list()
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

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let product_id = event.product_id();
        if product_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::AggregateMismatch(
                "product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut rm = self.store.get(&product_id).unwrap_or(StockReadModel {
            product_id,
            on_hand: 0,
        });
        rm.on_hand += event.delta();
        self.store.upsert(product_id, rm);

        Ok(())
    }
}
