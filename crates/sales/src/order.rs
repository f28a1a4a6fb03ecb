use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError};
use emporium_events::Event;

/// Sales order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sales order status lifecycle.
///
/// Legal edges: Pending → Confirmed, Pending → Cancelled,
/// Confirmed → Cancelled. Cancelled is terminal and Confirmed never goes
/// back to Pending. Re-setting the current status is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl core::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SalesOrderStatus::Pending => "pending",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Order line with the unit price frozen at order-creation time.
///
/// `unit_price_cents` is a snapshot: later base price or discount changes
/// never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

/// Requested line at checkout: product, quantity, and the snapshot price the
/// pricing service computed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price_cents: u64,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    placed_by: Option<ActorId>,
    status: SalesOrderStatus,
    lines: Vec<OrderLine>,
    total_cents: u64,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            placed_by: None,
            status: SalesOrderStatus::Pending,
            lines: Vec::new(),
            total_cents: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn placed_by(&self) -> Option<ActorId> {
        self.placed_by
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of line snapshots, computed once at creation and never recomputed.
    pub fn total_cents(&self) -> u64 {
        self.total_cents
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder (checkout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: SalesOrderId,
    pub placed_by: ActorId,
    pub lines: Vec<NewOrderLine>,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (staff action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: SalesOrderId,
    pub new_status: SalesOrderStatus,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateOrder(CreateOrder),
    ChangeStatus(ChangeStatus),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: SalesOrderId,
    pub placed_by: ActorId,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
///
/// Carries both the old and the new status for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: SalesOrderId,
    pub from: SalesOrderStatus,
    pub to: SalesOrderStatus,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    OrderCreated(OrderCreated),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::OrderCreated(_) => "sales.order.created",
            SalesOrderEvent::OrderStatusChanged(_) => "sales.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::OrderCreated(e) => e.occurred_at,
            SalesOrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.placed_by = Some(e.placed_by);
                self.status = SalesOrderStatus::Pending;
                self.lines = e.lines.clone();
                self.total_cents = e.total_cents;
                self.created = true;
            }
            SalesOrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_order_id(&self, order_id: SalesOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut total_cents: u64 = 0;
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }

            let line_total = (line.quantity as u64)
                .checked_mul(line.unit_price_cents)
                .ok_or_else(|| DomainError::validation("line total overflows"))?;
            total_cents = total_cents
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;

            lines.push(OrderLine {
                line_no: (idx as u32) + 1,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
            });
        }

        Ok(vec![SalesOrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            placed_by: cmd.placed_by,
            lines,
            total_cents,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeStatus,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
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

        let legal = matches!(
            (from, to),
            (SalesOrderStatus::Pending, SalesOrderStatus::Confirmed)
                | (SalesOrderStatus::Pending, SalesOrderStatus::Cancelled)
                | (SalesOrderStatus::Confirmed, SalesOrderStatus::Cancelled)
        );
        if !legal {
            return Err(DomainError::invalid_transition(from, to));
        }

        Ok(vec![SalesOrderEvent::OrderStatusChanged(
            OrderStatusChanged {
                order_id: cmd.order_id,
                from,
                to,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
