use serde_json::Value as JsonValue;

use emporium_events::EventEnvelope;
use emporium_purchasing::{DeliveryStatus, PurchaseOrderEvent, PurchaseOrderId};
use emporium_suppliers::SupplierId;

use super::cursor::{CursorDecision, StreamCursors};
use super::ProjectionError;
use crate::read_model::ReadModelStore;

/// One purchase order as the stats projection remembers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderRecord {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub total_amount_cents: u64,
    pub status: DeliveryStatus,
}

/// Aggregate performance statistics for one supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierStats {
    pub supplier_id: SupplierId,
    pub total_orders: u64,
    pub received_orders: u64,
    pub cancelled_orders: u64,
    /// Mean `total_amount` over every order ever placed with the supplier,
    /// rounded down to the minor unit. Zero when no orders exist.
    pub average_order_value_cents: u64,
}

/// Supplier performance projection.
///
/// Keeps the full purchase order history per supplier and derives the
/// statistics from it on every query, so the numbers always reflect the
/// complete history rather than an incrementally patched counter.
#[derive(Debug)]
pub struct SupplierStatsProjection<S>
where
    S: ReadModelStore<PurchaseOrderId, PurchaseOrderRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SupplierStatsProjection<S>
where
    S: ReadModelStore<PurchaseOrderId, PurchaseOrderRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Recompute the supplier's statistics from its full order history.
    pub fn stats(&self, supplier_id: SupplierId) -> SupplierStats {
        let orders: Vec<PurchaseOrderRecord> = self
            .store
            .list()
            .into_iter()
            .filter(|record| record.supplier_id == supplier_id)
            .collect();

        let total_orders = orders.len() as u64;
        let received_orders = orders
            .iter()
            .filter(|o| o.status == DeliveryStatus::Received)
            .count() as u64;
        let cancelled_orders = orders
            .iter()
            .filter(|o| o.status == DeliveryStatus::Cancelled)
            .count() as u64;
        let average_order_value_cents = if total_orders == 0 {
            0
        } else {
            orders.iter().map(|o| o.total_amount_cents).sum::<u64>() / total_orders
        };

        SupplierStats {
            supplier_id,
            total_orders,
            received_orders,
            cancelled_orders,
            average_order_value_cents,
        }
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

        let event: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                if e.order_id.0 != envelope.aggregate_id() {
                    return Err(ProjectionError::AggregateMismatch(
                        "order_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.order_id,
                    PurchaseOrderRecord {
                        order_id: e.order_id,
                        supplier_id: e.supplier_id,
                        total_amount_cents: e.total_amount_cents,
                        status: DeliveryStatus::Sent,
                    },
                );
            }
            PurchaseOrderEvent::DeliveryStatusChanged(e) => {
                if let Some(mut record) = self.store.get(&e.order_id) {
                    record.status = e.to;
                    self.store.upsert(e.order_id, record);
                }
            }
        }

        Ok(())
    }
}
