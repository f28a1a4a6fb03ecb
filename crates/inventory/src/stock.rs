use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_catalog::ProductId;
use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError};
use emporium_events::Event;

/// What caused a manual or order-driven stock adjustment.
///
/// Reservations and releases always reference a sales order directly; this
/// enum covers the `adjust` path (supplier receipts and manual corrections).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockCause {
    PurchaseOrder(AggregateId),
    Manual,
}

/// Aggregate root: StockRecord, the authoritative on-hand counter for one
/// product.
///
/// There is no creation command; the stream comes into existence with its
/// first mutation and an empty stream means zero on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    id: ProductId,
    on_hand: i64,
    version: u64,
}

impl StockRecord {
    /// Create an empty aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            on_hand: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }
}

impl AggregateRoot for StockRecord {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReserveStock. Check-and-decrement for a sales commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock. Reversal of a previous reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock. Supplier receipt or manual correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub delta: i64,
    pub cause: StockCause,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
    AdjustStock(AdjustStock),
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub delta: i64,
    pub cause: StockCause,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    StockAdjusted(StockAdjusted),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockReserved(_) => "inventory.stock.reserved",
            StockEvent::StockReleased(_) => "inventory.stock.released",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockReserved(e) => e.occurred_at,
            StockEvent::StockReleased(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl StockEvent {
    /// Net change to the on-hand counter this event carries.
    pub fn delta(&self) -> i64 {
        match self {
            StockEvent::StockReserved(e) => -e.quantity,
            StockEvent::StockReleased(e) => e.quantity,
            StockEvent::StockAdjusted(e) => e.delta,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            StockEvent::StockReserved(e) => e.product_id,
            StockEvent::StockReleased(e) => e.product_id,
            StockEvent::StockAdjusted(e) => e.product_id,
        }
    }
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockReserved(e) => {
                self.on_hand -= e.quantity;
            }
            StockEvent::StockReleased(e) => {
                self.on_hand += e.quantity;
            }
            StockEvent::StockAdjusted(e) => {
                self.on_hand += e.delta;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            StockCommand::ReleaseStock(cmd) => self.handle_release(cmd),
            StockCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockRecord {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        // The check and the decrement are decided against the same rehydrated
        // state; the append's version check makes the pair atomic.
        if self.on_hand < cmd.quantity {
            return Err(DomainError::insufficient_stock(cmd.quantity, self.on_hand));
        }

        Ok(vec![StockEvent::StockReserved(StockReserved {
            product_id: cmd.product_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![StockEvent::StockReleased(StockReleased {
            product_id: cmd.product_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_product_id(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        // Negative corrections are bounded by what is actually on hand.
        let new_on_hand = self.on_hand + cmd.delta;
        if new_on_hand < 0 {
            return Err(DomainError::insufficient_stock(-cmd.delta, self.on_hand));
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            delta: cmd.delta,
            cause: cmd.cause,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::AggregateId;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_order_id() -> AggregateId {
        AggregateId::new()
    }

    fn stocked_record(product_id: ProductId, quantity: i64) -> StockRecord {
        let mut record = StockRecord::empty(product_id);
        let events = record
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id,
                delta: quantity,
                cause: StockCause::Manual,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record.apply(&events[0]);
        record
    }

    #[test]
    fn reserve_decrements_on_hand() {
        let product_id = test_product_id();
        let mut record = stocked_record(product_id, 5);

        let events = record
            .handle(&StockCommand::ReserveStock(ReserveStock {
                product_id,
                order_id: test_order_id(),
                quantity: 3,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record.apply(&events[0]);

        assert_eq!(record.on_hand(), 2);
    }

    #[test]
    fn reserve_beyond_on_hand_fails_without_mutation() {
        let product_id = test_product_id();
        let record = stocked_record(product_id, 5);

        let err = record
            .handle(&StockCommand::ReserveStock(ReserveStock {
                product_id,
                order_id: test_order_id(),
                quantity: 6,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                requested,
                available,
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(record.on_hand(), 5);
    }

    #[test]
    fn release_restores_a_reservation_exactly() {
        let product_id = test_product_id();
        let order_id = test_order_id();
        let mut record = stocked_record(product_id, 5);

        let events = record
            .handle(&StockCommand::ReserveStock(ReserveStock {
                product_id,
                order_id,
                quantity: 4,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record.apply(&events[0]);
        assert_eq!(record.on_hand(), 1);

        let events = record
            .handle(&StockCommand::ReleaseStock(ReleaseStock {
                product_id,
                order_id,
                quantity: 4,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        record.apply(&events[0]);
        assert_eq!(record.on_hand(), 5);
    }

    #[test]
    fn negative_adjustment_cannot_underflow() {
        let product_id = test_product_id();
        let record = stocked_record(product_id, 3);

        let err = record
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id,
                delta: -4,
                cause: StockCause::Manual,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn zero_quantity_commands_are_rejected() {
        let product_id = test_product_id();
        let record = stocked_record(product_id, 3);

        let err = record
            .handle(&StockCommand::ReserveStock(ReserveStock {
                product_id,
                order_id: test_order_id(),
                quantity: 0,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = record
            .handle(&StockCommand::AdjustStock(AdjustStock {
                product_id,
                delta: 0,
                cause: StockCause::Manual,
                actor_id: ActorId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: for any sequence of reservation attempts, the counter
            /// never goes negative and the accepted quantity never exceeds the
            /// opening stock.
            #[test]
            fn accepted_reservations_never_exceed_opening_stock(
                opening in 1i64..1_000,
                requests in prop::collection::vec(1i64..100, 1..40)
            ) {
                let product_id = test_product_id();
                let mut record = stocked_record(product_id, opening);

                let mut accepted = 0i64;
                for quantity in requests {
                    let cmd = StockCommand::ReserveStock(ReserveStock {
                        product_id,
                        order_id: test_order_id(),
                        quantity,
                        actor_id: ActorId::new(),
                        occurred_at: Utc::now(),
                    });
                    if let Ok(events) = record.handle(&cmd) {
                        for event in &events {
                            record.apply(event);
                        }
                        accepted += quantity;
                    }
                    prop_assert!(record.on_hand() >= 0);
                }

                prop_assert!(accepted <= opening);
                prop_assert_eq!(record.on_hand(), opening - accepted);
            }
        }
    }
}
