//! The purchase order service: replenishment and the delivery lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot};
use emporium_events::{EventBus, EventEnvelope};
use emporium_inventory::StockCause;
use emporium_purchasing::{
    ChangeDeliveryStatus, CreatePurchaseOrder, DeliveryStatus, NewPurchaseLine, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderLine,
};
use emporium_suppliers::{Supplier, SupplierId};

use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::error::EngineError;
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::ProjectionHub;
use crate::services::ledger::StockLedger;
use crate::services::TransitionOutcome;
use crate::streams;

/// What procurement gets back after creating a replenishment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderReceipt {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub total_amount_cents: u64,
    pub lines: Vec<PurchaseOrderLine>,
}

/// Drives a purchase order through its delivery lifecycle, invoking the
/// stock ledger on receipt and un-receipt. Supplier statistics follow every
/// transition automatically through the supplier-stats projection.
#[derive(Debug)]
pub struct ProcurementService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    hub: Arc<ProjectionHub>,
    ledger: StockLedger<S, B>,
}

impl<S, B> ProcurementService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        hub: Arc<ProjectionHub>,
        ledger: StockLedger<S, B>,
    ) -> Self {
        Self {
            dispatcher,
            hub,
            ledger,
        }
    }

    /// Create a purchase order in its initial (non stock-affecting) state.
    pub fn create_purchase_order(
        &self,
        supplier_id: SupplierId,
        items: &[(ProductId, i64, u64)],
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOrderReceipt, EngineError> {
        let supplier: Supplier = self.dispatcher.load(streams::SUPPLIER, supplier_id.0, |id| {
            Supplier::empty(SupplierId::new(id))
        })?;
        if !supplier.is_registered() {
            return Err(EngineError::NotFound);
        }
        if !supplier.can_transact() {
            return Err(EngineError::Validation("supplier is suspended".to_string()));
        }

        let mut lines = Vec::with_capacity(items.len());
        for (product_id, quantity, unit_price_cents) in items {
            if self.hub.products().get(product_id).is_none() {
                return Err(EngineError::InvalidItem {
                    product_id: *product_id,
                    reason: "unknown product".to_string(),
                });
            }
            lines.push(NewPurchaseLine {
                product_id: *product_id,
                quantity: *quantity,
                unit_price_cents: *unit_price_cents,
            });
        }

        let order_id = PurchaseOrderId::new(AggregateId::new());
        self.dispatcher.dispatch(
            actor_id,
            order_id.0,
            streams::PURCHASE_ORDER,
            PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                order_id,
                supplier_id,
                lines,
                actor_id,
                occurred_at: now,
            }),
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        let order = self.load(order_id)?;
        info!(
            order_id = %order_id,
            supplier_id = %supplier_id,
            total_amount_cents = order.total_amount_cents(),
            "purchase order created"
        );

        Ok(PurchaseOrderReceipt {
            order_id,
            supplier_id,
            total_amount_cents: order.total_amount_cents(),
            lines: order.lines().to_vec(),
        })
    }

    /// Drive a purchase order to `new_status`.
    ///
    /// Entering Received applies `+quantity` per line; leaving Received into
    /// any other state applies the symmetric `−quantity`, exactly once. The
    /// `Received → Cancelled` edge is exactly the "leaving Received" case,
    /// never an additional unconditional subtraction.
    pub fn transition(
        &self,
        order_id: PurchaseOrderId,
        new_status: DeliveryStatus,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, EngineError> {
        let order = self.load(order_id)?;
        if !order.exists() {
            return Err(EngineError::NotFound);
        }

        let from = order.status();
        if from == new_status {
            return Ok(TransitionOutcome::NoChange {
                status: from.to_string(),
            });
        }

        let command = PurchaseOrderCommand::ChangeDeliveryStatus(ChangeDeliveryStatus {
            order_id,
            new_status,
            actor_id,
            occurred_at: now,
        });

        // Pre-flight the pure decision so an illegal edge (e.g. out of
        // Cancelled) fails before any stock is touched.
        order
            .handle(&command)
            .map_err(|e| EngineError::from(DispatchError::from(e)))?;

        let receiving = new_status.is_stock_affecting() && !from.is_stock_affecting();
        let unreceiving = from.is_stock_affecting() && !new_status.is_stock_affecting();
        let observed_version = order.version();

        if receiving || unreceiving {
            let sign = if receiving { 1 } else { -1 };
            let deltas: Vec<(ProductId, i64)> = order
                .lines()
                .iter()
                .map(|line| (line.product_id, sign * line.quantity))
                .collect();
            let cause = StockCause::PurchaseOrder(order_id.0);

            // Stock first, status second: the status change only commits over
            // fully applied quantities, mirroring the sales confirmation path.
            self.ledger.adjust_all(&deltas, cause, actor_id, now)?;

            let committed =
                match self.dispatch_status(order_id, actor_id, command, observed_version) {
                    Ok(committed) => committed,
                    Err(e) => {
                        // The order moved under us (or the append failed);
                        // take the quantities back out and report it.
                        self.ledger.revert_all(&deltas, cause, actor_id, now);
                        return Err(e);
                    }
                };

            return Ok(Self::outcome_from(&committed, from, new_status));
        }

        let committed = self.dispatch_status(order_id, actor_id, command, observed_version)?;

        Ok(Self::outcome_from(&committed, from, new_status))
    }

    /// Rehydrate a purchase order for queries.
    pub fn load(&self, order_id: PurchaseOrderId) -> Result<PurchaseOrder, EngineError> {
        Ok(self.dispatcher.load(
            streams::PURCHASE_ORDER,
            order_id.0,
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?)
    }

    /// Status append pinned to the version the transition was planned on.
    ///
    /// Deliberately not retried: the stock compensation around a transition
    /// is computed for one specific edge (receiving, un-receiving, neither),
    /// so a lost race surfaces as a conflict (after compensation) rather
    /// than silently committing a re-decided edge with the wrong stock
    /// effect.
    fn dispatch_status(
        &self,
        order_id: PurchaseOrderId,
        actor_id: ActorId,
        command: PurchaseOrderCommand,
        observed_version: u64,
    ) -> Result<Vec<StoredEvent>, EngineError> {
        let committed = self.dispatcher.dispatch_pinned(
            actor_id,
            order_id.0,
            streams::PURCHASE_ORDER,
            command,
            observed_version,
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        if let Some(stored) = committed.first() {
            info!(
                order_id = %order_id,
                event = %stored.event_type,
                "purchase order transition recorded"
            );
        }

        Ok(committed)
    }

    fn outcome_from(
        committed: &[StoredEvent],
        from: DeliveryStatus,
        to: DeliveryStatus,
    ) -> TransitionOutcome {
        for stored in committed {
            if let Ok(PurchaseOrderEvent::DeliveryStatusChanged(e)) =
                serde_json::from_value::<PurchaseOrderEvent>(stored.payload.clone())
            {
                return TransitionOutcome::Applied {
                    from: e.from.to_string(),
                    to: e.to.to_string(),
                };
            }
        }
        TransitionOutcome::Applied {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
