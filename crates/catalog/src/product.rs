use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError};
use emporium_events::Event;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product lifecycle: products are never destroyed, only deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    category: String,
    /// Base price in smallest currency unit (e.g., cents).
    base_price_cents: u64,
    status: ProductStatus,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            category: String::new(),
            base_price_cents: 0,
            status: ProductStatus::Active,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn base_price_cents(&self) -> u64 {
        self.base_price_cents
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Check if product can appear on a new order line.
    pub fn can_be_sold(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub base_price_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeBasePrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBasePrice {
    pub product_id: ProductId,
    pub base_price_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateProduct {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangeBasePrice(ChangeBasePrice),
    DeactivateProduct(DeactivateProduct),
    ReactivateProduct(ReactivateProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub base_price_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BasePriceChanged.
///
/// Carries both the previous and the new price so the audit trail records
/// old/new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePriceChanged {
    pub product_id: ProductId,
    pub previous_cents: u64,
    pub base_price_cents: u64,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReactivated {
    pub product_id: ProductId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    BasePriceChanged(BasePriceChanged),
    ProductDeactivated(ProductDeactivated),
    ProductReactivated(ProductReactivated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::BasePriceChanged(_) => "catalog.product.base_price_changed",
            ProductEvent::ProductDeactivated(_) => "catalog.product.deactivated",
            ProductEvent::ProductReactivated(_) => "catalog.product.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::BasePriceChanged(e) => e.occurred_at,
            ProductEvent::ProductDeactivated(e) => e.occurred_at,
            ProductEvent::ProductReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.base_price_cents = e.base_price_cents;
                self.status = ProductStatus::Active;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::BasePriceChanged(e) => {
                self.base_price_cents = e.base_price_cents;
            }
            ProductEvent::ProductDeactivated(_) => {
                self.status = ProductStatus::Inactive;
            }
            ProductEvent::ProductReactivated(_) => {
                self.status = ProductStatus::Active;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangeBasePrice(cmd) => self.handle_change_price(cmd),
            ProductCommand::DeactivateProduct(cmd) => self.handle_deactivate(cmd),
            ProductCommand::ReactivateProduct(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if cmd.base_price_cents == 0 {
            return Err(DomainError::validation("base price must be positive"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            base_price_cents: cmd.base_price_cents,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(
        &self,
        cmd: &ChangeBasePrice,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.base_price_cents == 0 {
            return Err(DomainError::validation("base price must be positive"));
        }

        if cmd.base_price_cents == self.base_price_cents {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::BasePriceChanged(BasePriceChanged {
            product_id: cmd.product_id,
            previous_cents: self.base_price_cents,
            base_price_cents: cmd.base_price_cents,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(
        &self,
        cmd: &DeactivateProduct,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Inactive {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductDeactivated(ProductDeactivated {
            product_id: cmd.product_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(
        &self,
        cmd: &ReactivateProduct,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Active {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductReactivated(ProductReactivated {
            product_id: cmd.product_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::AggregateId;

    fn test_actor_id() -> ActorId {
        ActorId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_product(product_id: ProductId, price: u64) -> Product {
        let mut product = Product::empty(product_id);
        let cmd = CreateProduct {
            product_id,
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            category: "apparel".to_string(),
            base_price_cents: price,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap();
        product.apply(&events[0]);
        product
    }

    #[test]
    fn create_product_emits_product_created_event() {
        let product_id = test_product_id();
        let product = Product::empty(product_id);
        let cmd = CreateProduct {
            product_id,
            sku: "SKU-001".to_string(),
            name: "Test Product".to_string(),
            category: "apparel".to_string(),
            base_price_cents: 12_50,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };

        let events = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ProductEvent::ProductCreated(e) => {
                assert_eq!(e.product_id, product_id);
                assert_eq!(e.base_price_cents, 12_50);
                assert_eq!(e.category, "apparel");
            }
            _ => panic!("Expected ProductCreated event"),
        }
    }

    #[test]
    fn create_rejects_empty_sku() {
        let product_id = test_product_id();
        let product = Product::empty(product_id);
        let cmd = CreateProduct {
            product_id,
            sku: "  ".to_string(),
            name: "Test Product".to_string(),
            category: "apparel".to_string(),
            base_price_cents: 12_50,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };

        let err = product
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deactivate_then_reactivate_toggles_sellability() {
        let product_id = test_product_id();
        let mut product = created_product(product_id, 10_00);
        assert!(product.can_be_sold());

        let events = product
            .handle(&ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(!product.can_be_sold());

        let events = product
            .handle(&ProductCommand::ReactivateProduct(ReactivateProduct {
                product_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);
        assert!(product.can_be_sold());
    }

    #[test]
    fn deactivating_an_inactive_product_is_a_no_op() {
        let product_id = test_product_id();
        let mut product = created_product(product_id, 10_00);

        let events = product
            .handle(&ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);

        let events = product
            .handle(&ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn price_change_records_previous_value() {
        let product_id = test_product_id();
        let mut product = created_product(product_id, 10_00);

        let events = product
            .handle(&ProductCommand::ChangeBasePrice(ChangeBasePrice {
                product_id,
                base_price_cents: 15_00,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            ProductEvent::BasePriceChanged(e) => {
                assert_eq!(e.previous_cents, 10_00);
                assert_eq!(e.base_price_cents, 15_00);
            }
            _ => panic!("Expected BasePriceChanged event"),
        }

        product.apply(&events[0]);
        assert_eq!(product.base_price_cents(), 15_00);
    }

    #[test]
    fn same_price_change_is_a_no_op() {
        let product_id = test_product_id();
        let product = created_product(product_id, 10_00);

        let events = product
            .handle(&ProductCommand::ChangeBasePrice(ChangeBasePrice {
                product_id,
                base_price_cents: 10_00,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: handle is deterministic (same state + command = same events).
            #[test]
            fn handle_is_deterministic(
                sku in "[A-Z0-9-]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}",
                price in 1u64..1_000_000_00
            ) {
                let product_id = test_product_id();
                let product = Product::empty(product_id);
                let cmd = ProductCommand::CreateProduct(CreateProduct {
                    product_id,
                    sku,
                    name,
                    category: "apparel".to_string(),
                    base_price_cents: price,
                    actor_id: test_actor_id(),
                    occurred_at: test_time(),
                });

                let first = product.handle(&cmd).unwrap();
                let second = product.handle(&cmd).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
