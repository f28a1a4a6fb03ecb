use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use emporium_catalog::{ProductEvent, ProductId};
use emporium_events::EventEnvelope;

use super::cursor::{CursorDecision, StreamCursors};
use super::ProjectionError;
use crate::read_model::ReadModelStore;

/// Queryable catalog read model: descriptive product fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub base_price_cents: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Product directory projection.
///
/// Supplies the fields the rule resolver's predicates and the checkout's
/// item validation read: category, base price, active flag, creation time.
#[derive(Debug)]
pub struct ProductDirectoryProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductDirectoryProjection<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    pub fn list(&self) -> Vec<ProductReadModel> {
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

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            ProductEvent::ProductCreated(e) => {
                if e.product_id.0 != envelope.aggregate_id() {
                    return Err(ProjectionError::AggregateMismatch(
                        "product_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        category: e.category,
                        base_price_cents: e.base_price_cents,
                        active: true,
                        created_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::BasePriceChanged(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.base_price_cents = e.base_price_cents;
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::ProductDeactivated(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.active = false;
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::ProductReactivated(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.active = true;
                    self.store.upsert(e.product_id, rm);
                }
            }
        }

        Ok(())
    }
}
