//! Admin directory: the catalog, supplier, rule and manual-discount
//! operations that set the stage for the core flows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use emporium_catalog::{
    ChangeBasePrice, CreateProduct, DeactivateProduct, Product, ProductCommand, ProductId,
    ReactivateProduct,
};
use emporium_core::{ActorId, AggregateId, Percent};
use emporium_events::{EventBus, EventEnvelope};
use emporium_pricing::{
    ActivateRule, AssignManualDiscount, CreateRule, DeactivateRule, DeleteRule, DiscountCommand,
    DiscountRule, DiscountRuleId, EndDiscount, ProductDiscount, RuleCommand,
};
use emporium_suppliers::{
    ContactInfo, RegisterSupplier, ReinstateSupplier, Supplier, SupplierCommand, SupplierId,
    SuspendSupplier,
};

use crate::dispatcher::CommandDispatcher;
use crate::error::EngineError;
use crate::event_store::EventStore;
use crate::streams;

/// Thin command wrappers for operator actions.
///
/// These are deliberately mechanical: all invariants live in the aggregates,
/// and every operation records the acting user for the audit trail.
#[derive(Debug)]
pub struct DirectoryService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> DirectoryService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    pub fn create_product(
        &self,
        sku: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        base_price_cents: u64,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<ProductId, EngineError> {
        let product_id = ProductId::new(AggregateId::new());
        self.dispatcher.dispatch(
            actor_id,
            product_id.0,
            streams::PRODUCT,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                sku: sku.into(),
                name: name.into(),
                category: category.into(),
                base_price_cents,
                actor_id,
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(product_id)
    }

    pub fn change_base_price(
        &self,
        product_id: ProductId,
        base_price_cents: u64,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            product_id.0,
            streams::PRODUCT,
            ProductCommand::ChangeBasePrice(ChangeBasePrice {
                product_id,
                base_price_cents,
                actor_id,
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(())
    }

    pub fn deactivate_product(
        &self,
        product_id: ProductId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            product_id.0,
            streams::PRODUCT,
            ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                actor_id,
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(())
    }

    pub fn reactivate_product(
        &self,
        product_id: ProductId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            product_id.0,
            streams::PRODUCT,
            ProductCommand::ReactivateProduct(ReactivateProduct {
                product_id,
                actor_id,
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(())
    }

    pub fn register_supplier(
        &self,
        name: impl Into<String>,
        contact: ContactInfo,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<SupplierId, EngineError> {
        let supplier_id = SupplierId::new(AggregateId::new());
        self.dispatcher.dispatch(
            actor_id,
            supplier_id.0,
            streams::SUPPLIER,
            SupplierCommand::RegisterSupplier(RegisterSupplier {
                supplier_id,
                name: name.into(),
                contact,
                actor_id,
                occurred_at: now,
            }),
            |id| Supplier::empty(SupplierId::new(id)),
        )?;
        Ok(supplier_id)
    }

    pub fn suspend_supplier(
        &self,
        supplier_id: SupplierId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            supplier_id.0,
            streams::SUPPLIER,
            SupplierCommand::SuspendSupplier(SuspendSupplier {
                supplier_id,
                actor_id,
                occurred_at: now,
            }),
            |id| Supplier::empty(SupplierId::new(id)),
        )?;
        Ok(())
    }

    pub fn reinstate_supplier(
        &self,
        supplier_id: SupplierId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            supplier_id.0,
            streams::SUPPLIER,
            SupplierCommand::ReinstateSupplier(ReinstateSupplier {
                supplier_id,
                actor_id,
                occurred_at: now,
            }),
            |id| Supplier::empty(SupplierId::new(id)),
        )?;
        Ok(())
    }

    /// Create a discount rule from a wire-format condition payload.
    ///
    /// A payload that does not parse is stored anyway: the rule exists and
    /// simply matches zero candidates until it is fixed by recreation.
    #[allow(clippy::too_many_arguments)]
    pub fn create_rule(
        &self,
        name: impl Into<String>,
        rule_type: impl Into<String>,
        params: JsonValue,
        discount_percent: Percent,
        priority: i32,
        valid_until: Option<DateTime<Utc>>,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<DiscountRuleId, EngineError> {
        let rule_id = DiscountRuleId::new(AggregateId::new());
        self.dispatcher.dispatch(
            actor_id,
            rule_id.0,
            streams::RULE,
            RuleCommand::CreateRule(CreateRule {
                rule_id,
                name: name.into(),
                rule_type: rule_type.into(),
                params,
                discount_percent,
                priority,
                valid_until,
                actor_id,
                occurred_at: now,
            }),
            |id| DiscountRule::empty(DiscountRuleId::new(id)),
        )?;
        Ok(rule_id)
    }

    pub fn activate_rule(
        &self,
        rule_id: DiscountRuleId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            rule_id.0,
            streams::RULE,
            RuleCommand::ActivateRule(ActivateRule {
                rule_id,
                actor_id,
                occurred_at: now,
            }),
            |id| DiscountRule::empty(DiscountRuleId::new(id)),
        )?;
        Ok(())
    }

    pub fn deactivate_rule(
        &self,
        rule_id: DiscountRuleId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            rule_id.0,
            streams::RULE,
            RuleCommand::DeactivateRule(DeactivateRule {
                rule_id,
                actor_id,
                occurred_at: now,
            }),
            |id| DiscountRule::empty(DiscountRuleId::new(id)),
        )?;
        Ok(())
    }

    /// Delete a rule. Discounts it already created stay in place.
    pub fn delete_rule(
        &self,
        rule_id: DiscountRuleId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            rule_id.0,
            streams::RULE,
            RuleCommand::DeleteRule(DeleteRule {
                rule_id,
                actor_id,
                occurred_at: now,
            }),
            |id| DiscountRule::empty(DiscountRuleId::new(id)),
        )?;
        Ok(())
    }

    /// Manually assign a discount to a product (priority 0; any rule beats it).
    pub fn assign_discount(
        &self,
        product_id: ProductId,
        percent: Percent,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            product_id.0,
            streams::DISCOUNT,
            DiscountCommand::AssignManualDiscount(AssignManualDiscount {
                product_id,
                percent,
                starts_at,
                ends_at,
                actor_id,
                occurred_at: now,
            }),
            |id| ProductDiscount::empty(ProductId::new(id)),
        )?;
        Ok(())
    }

    /// Soft-remove a product's discount by stamping its end date to now.
    pub fn end_discount(
        &self,
        product_id: ProductId,
        actor_id: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.dispatcher.dispatch_with_retry(
            actor_id,
            product_id.0,
            streams::DISCOUNT,
            DiscountCommand::EndDiscount(EndDiscount {
                product_id,
                actor_id,
                occurred_at: now,
            }),
            |id| ProductDiscount::empty(ProductId::new(id)),
        )?;
        Ok(())
    }
}
