//! The sales order service: checkout and status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot};
use emporium_events::{EventBus, EventEnvelope};
use emporium_sales::{
    ChangeStatus, CreateOrder, NewOrderLine, OrderLine, SalesOrder, SalesOrderCommand,
    SalesOrderEvent, SalesOrderId, SalesOrderStatus,
};

use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::error::{EngineError, Shortfall};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::ProjectionHub;
use crate::services::ledger::StockLedger;
use crate::services::pricing::PricingService;
use crate::services::TransitionOutcome;
use crate::streams;

/// What checkout gets back: the order id, the frozen total, and the per-line
/// snapshot prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: SalesOrderId,
    pub total_cents: u64,
    pub lines: Vec<OrderLine>,
}

/// Drives a sales order through Pending → Confirmed → Cancelled, invoking
/// the stock ledger on confirmation and un-confirmation.
#[derive(Debug)]
pub struct SalesOrderService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    hub: Arc<ProjectionHub>,
    ledger: StockLedger<S, B>,
    pricing: PricingService,
}

impl<S, B> SalesOrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        hub: Arc<ProjectionHub>,
        ledger: StockLedger<S, B>,
        pricing: PricingService,
    ) -> Self {
        Self {
            dispatcher,
            hub,
            ledger,
            pricing,
        }
    }

    /// Create a Pending order with snapshot prices (checkout).
    ///
    /// Per line: the product must exist and be active, the price is frozen
    /// via the pricing snapshot, and availability is soft-checked against the
    /// stock read model; the real reservation happens only on confirmation.
    /// Every short line is reported, not just the first.
    pub fn create_order(
        &self,
        placed_by: ActorId,
        items: &[(ProductId, i64)],
        now: DateTime<Utc>,
    ) -> Result<OrderReceipt, EngineError> {
        if items.is_empty() {
            return Err(EngineError::Validation(
                "order must have at least one line".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut shortfalls: Vec<Shortfall> = Vec::new();

        for (product_id, quantity) in items {
            let product =
                self.hub
                    .products()
                    .get(product_id)
                    .ok_or_else(|| EngineError::InvalidItem {
                        product_id: *product_id,
                        reason: "unknown product".to_string(),
                    })?;
            if !product.active {
                return Err(EngineError::InvalidItem {
                    product_id: *product_id,
                    reason: "product is inactive".to_string(),
                });
            }
            if *quantity <= 0 {
                return Err(EngineError::Validation(
                    "quantity must be positive".to_string(),
                ));
            }

            let on_hand = self.hub.stock().on_hand(product_id);
            if on_hand < *quantity {
                shortfalls.push(Shortfall {
                    product_id: *product_id,
                    requested: *quantity,
                    available: on_hand,
                });
                continue;
            }

            let unit_price_cents = self.pricing.effective_price(*product_id, now)?;
            lines.push(NewOrderLine {
                product_id: *product_id,
                quantity: *quantity,
                unit_price_cents,
            });
        }

        if !shortfalls.is_empty() {
            return Err(EngineError::InsufficientStock { shortfalls });
        }

        let order_id = SalesOrderId::new(AggregateId::new());
        self.dispatcher.dispatch(
            placed_by,
            order_id.0,
            streams::SALES_ORDER,
            SalesOrderCommand::CreateOrder(CreateOrder {
                order_id,
                placed_by,
                lines,
                actor_id: placed_by,
                occurred_at: now,
            }),
            |id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        let order = self.load(order_id)?;
        info!(
            order_id = %order_id,
            total_cents = order.total_cents(),
            lines = order.lines().len(),
            "sales order created"
        );

        Ok(OrderReceipt {
            order_id,
            total_cents: order.total_cents(),
            lines: order.lines().to_vec(),
        })
    }

    /// Drive an order to `new_status` (staff action).
    ///
    /// Entering Confirmed reserves every line first: any shortfall aborts
    /// the whole transition with the failing products and the status
    /// untouched. Leaving Confirmed records the status change first and then
    /// releases the lines best-effort.
    pub fn transition(
        &self,
        order_id: SalesOrderId,
        new_status: SalesOrderStatus,
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

        let command = SalesOrderCommand::ChangeStatus(ChangeStatus {
            order_id,
            new_status,
            actor_id,
            occurred_at: now,
        });

        // Pre-flight the pure decision so an illegal edge fails before any
        // stock is touched.
        order
            .handle(&command)
            .map_err(|e| EngineError::from(DispatchError::from(e)))?;

        let lines: Vec<(ProductId, i64)> = order
            .lines()
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();

        let entering_confirmed = new_status == SalesOrderStatus::Confirmed;
        let leaving_confirmed = from == SalesOrderStatus::Confirmed;
        let observed_version = order.version();

        if entering_confirmed {
            // Reserve first; the status change commits only over a complete
            // reservation.
            self.ledger.reserve_all(&lines, order_id.0, actor_id, now)?;

            let committed =
                match self.dispatch_status(order_id, actor_id, command, observed_version) {
                    Ok(committed) => committed,
                    Err(e) => {
                        // The order moved under us (or the append failed);
                        // hand the reservation back and report it.
                        self.ledger.release_all(&lines, order_id.0, actor_id, now);
                        return Err(e);
                    }
                };

            return Ok(Self::outcome_from(&committed, from, new_status));
        }

        let committed = self.dispatch_status(order_id, actor_id, command, observed_version)?;

        if leaving_confirmed {
            // Best-effort: the status change stands even if a release fails.
            self.ledger.release_all(&lines, order_id.0, actor_id, now);
        }

        Ok(Self::outcome_from(&committed, from, new_status))
    }

    /// Rehydrate an order for queries (id, status, total, line snapshots).
    pub fn load(&self, order_id: SalesOrderId) -> Result<SalesOrder, EngineError> {
        Ok(self.dispatcher.load(
            streams::SALES_ORDER,
            order_id.0,
            |id| SalesOrder::empty(SalesOrderId::new(id)),
        )?)
    }

    /// Status append pinned to the version the transition was planned on.
    ///
    /// Deliberately not retried: the stock compensation around a transition
    /// is computed for one specific edge, so a lost race surfaces as a
    /// conflict (after compensation) instead of silently committing a
    /// re-decided edge the stock bookkeeping never saw.
    fn dispatch_status(
        &self,
        order_id: SalesOrderId,
        actor_id: ActorId,
        command: SalesOrderCommand,
        observed_version: u64,
    ) -> Result<Vec<StoredEvent>, EngineError> {
        let committed = self.dispatcher.dispatch_pinned(
            actor_id,
            order_id.0,
            streams::SALES_ORDER,
            command,
            observed_version,
            |id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        if let Some(stored) = committed.first() {
            info!(
                order_id = %order_id,
                event = %stored.event_type,
                "sales order transition recorded"
            );
        }

        Ok(committed)
    }

    /// Extract the audited old/new pair from the committed event; the loaded
    /// snapshot is only a fallback.
    fn outcome_from(
        committed: &[StoredEvent],
        from: SalesOrderStatus,
        to: SalesOrderStatus,
    ) -> TransitionOutcome {
        for stored in committed {
            if let Ok(SalesOrderEvent::OrderStatusChanged(e)) =
                serde_json::from_value::<SalesOrderEvent>(stored.payload.clone())
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
