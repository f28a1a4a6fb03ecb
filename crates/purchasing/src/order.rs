use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError};
use emporium_events::Event;
use emporium_suppliers::SupplierId;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Delivery lifecycle of a purchase order.
///
/// `Received` is the only stock-affecting state; `Cancelled` is terminal.
/// Corrections may move a non-cancelled order to any other state, including
/// back out of `Received` (which reverses the receipt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    InTransit,
    PartiallyReceived,
    Received,
    Cancelled,
}

impl DeliveryStatus {
    /// Whether this state carries the supplier's goods in our stock.
    pub fn is_stock_affecting(self) -> bool {
        matches!(self, DeliveryStatus::Received)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Cancelled)
    }
}

impl core::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::PartiallyReceived => "partially_received",
            DeliveryStatus::Received => "received",
            DeliveryStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

/// Requested line at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier_id: Option<SupplierId>,
    status: DeliveryStatus,
    lines: Vec<PurchaseOrderLine>,
    total_amount_cents: u64,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            supplier_id: None,
            status: DeliveryStatus::Sent,
            lines: Vec::new(),
            total_amount_cents: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseOrderLine] {
        &self.lines
    }

    /// Sum of `quantity × unit_price` across lines, computed at creation.
    pub fn total_amount_cents(&self) -> u64 {
        self.total_amount_cents
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder (procurement action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<NewPurchaseLine>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeDeliveryStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDeliveryStatus {
    pub order_id: PurchaseOrderId,
    pub new_status: DeliveryStatus,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    ChangeDeliveryStatus(ChangeDeliveryStatus),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<PurchaseOrderLine>,
    pub total_amount_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryStatusChanged.
///
/// Carries the supplier reference plus old/new status so the audit trail and
/// the supplier-stats projection need no extra lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusChanged {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    DeliveryStatusChanged(DeliveryStatusChanged),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::DeliveryStatusChanged(_) => "purchasing.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::DeliveryStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.supplier_id = Some(e.supplier_id);
                self.status = DeliveryStatus::Sent;
                self.lines = e.lines.clone();
                self.total_amount_cents = e.total_amount_cents;
                self.created = true;
            }
            PurchaseOrderEvent::DeliveryStatusChanged(e) => {
                self.status = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::ChangeDeliveryStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut total_amount_cents: u64 = 0;
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if line.unit_price_cents == 0 {
                return Err(DomainError::validation("unit price must be positive"));
            }

            let line_total = (line.quantity as u64)
                .checked_mul(line.unit_price_cents)
                .ok_or_else(|| DomainError::validation("line total overflows"))?;
            total_amount_cents = total_amount_cents
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;

            lines.push(PurchaseOrderLine {
                line_no: (idx as u32) + 1,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
            });
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                supplier_id: cmd.supplier_id,
                lines,
                total_amount_cents,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeDeliveryStatus,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        let from = self.status;
        let to = cmd.new_status;

        // Re-setting the current status is a no-op, not an error.
        if from == to {
            return Ok(vec![]);
        }

        if from.is_terminal() {
            return Err(DomainError::invalid_transition(from, to));
        }

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("purchase order without supplier"))?;

        Ok(vec![PurchaseOrderEvent::DeliveryStatusChanged(
            DeliveryStatusChanged {
                order_id: cmd.order_id,
                supplier_id,
                from,
                to,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::AggregateId;

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn created_order(order_id: PurchaseOrderId, lines: Vec<NewPurchaseLine>) -> PurchaseOrder {
        let mut order = PurchaseOrder::empty(order_id);
        let cmd = CreatePurchaseOrder {
            order_id,
            supplier_id: test_supplier_id(),
            lines,
            actor_id: ActorId::new(),
            occurred_at: Utc::now(),
        };
        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    fn change_status(
        order: &mut PurchaseOrder,
        to: DeliveryStatus,
    ) -> Result<usize, DomainError> {
        let events = order.handle(&PurchaseOrderCommand::ChangeDeliveryStatus(
            ChangeDeliveryStatus {
                order_id: order.id_typed(),
                new_status: to,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            },
        ))?;
        for event in &events {
            order.apply(event);
        }
        Ok(events.len())
    }

    #[test]
    fn create_purchase_order_computes_total_amount() {
        let order = created_order(
            test_order_id(),
            vec![
                NewPurchaseLine {
                    product_id: test_product_id(),
                    quantity: 10,
                    unit_price_cents: 50_00,
                },
                NewPurchaseLine {
                    product_id: test_product_id(),
                    quantity: 4,
                    unit_price_cents: 12_25,
                },
            ],
        );

        assert_eq!(order.status(), DeliveryStatus::Sent);
        assert_eq!(order.total_amount_cents(), 549_00);
        assert_eq!(order.lines().len(), 2);
    }

    #[test]
    fn delivery_lifecycle_walks_forward_and_backward() {
        let mut order = created_order(
            test_order_id(),
            vec![NewPurchaseLine {
                product_id: test_product_id(),
                quantity: 10,
                unit_price_cents: 50_00,
            }],
        );

        assert_eq!(change_status(&mut order, DeliveryStatus::InTransit), Ok(1));
        assert_eq!(change_status(&mut order, DeliveryStatus::Received), Ok(1));
        // Receipt corrections may leave Received again.
        assert_eq!(change_status(&mut order, DeliveryStatus::InTransit), Ok(1));
        assert_eq!(order.status(), DeliveryStatus::InTransit);
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut order = created_order(
            test_order_id(),
            vec![NewPurchaseLine {
                product_id: test_product_id(),
                quantity: 1,
                unit_price_cents: 100,
            }],
        );
        change_status(&mut order, DeliveryStatus::Cancelled).unwrap();

        let err = change_status(&mut order, DeliveryStatus::Sent).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn re_setting_the_same_status_is_a_no_op() {
        let mut order = created_order(
            test_order_id(),
            vec![NewPurchaseLine {
                product_id: test_product_id(),
                quantity: 1,
                unit_price_cents: 100,
            }],
        );

        assert_eq!(change_status(&mut order, DeliveryStatus::Sent), Ok(0));
    }

    #[test]
    fn only_received_affects_stock() {
        assert!(DeliveryStatus::Received.is_stock_affecting());
        for status in [
            DeliveryStatus::Sent,
            DeliveryStatus::InTransit,
            DeliveryStatus::PartiallyReceived,
            DeliveryStatus::Cancelled,
        ] {
            assert!(!status.is_stock_affecting());
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the stored total always equals the sum of line totals.
            #[test]
            fn total_equals_sum_of_lines(
                line_specs in prop::collection::vec((1i64..1_000, 1u64..100_000), 1..10)
            ) {
                let lines: Vec<NewPurchaseLine> = line_specs
                    .iter()
                    .map(|(quantity, price)| NewPurchaseLine {
                        product_id: test_product_id(),
                        quantity: *quantity,
                        unit_price_cents: *price,
                    })
                    .collect();

                let order = created_order(test_order_id(), lines);
                let expected: u64 = order
                    .lines()
                    .iter()
                    .map(|l| l.quantity as u64 * l.unit_price_cents)
                    .sum();
                prop_assert_eq!(order.total_amount_cents(), expected);
            }
        }
    }
}
