//! The pricing snapshot service.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use emporium_catalog::ProductId;
use emporium_pricing::effective_unit_price;

use crate::error::EngineError;
use crate::projections::ProjectionHub;

/// Computes the effective unit price of a product at a point in time.
///
/// Checkout calls this once per order line and freezes the result into the
/// line snapshot; nothing here is ever recomputed for an existing line.
#[derive(Debug, Clone)]
pub struct PricingService {
    hub: Arc<ProjectionHub>,
}

impl PricingService {
    pub fn new(hub: Arc<ProjectionHub>) -> Self {
        Self { hub }
    }

    /// Base price combined with the product's active discount, if any.
    pub fn effective_price(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        let product = self
            .hub
            .products()
            .get(&product_id)
            .ok_or(EngineError::NotFound)?;
        let discount = self.hub.discounts().active(&product_id, now);

        Ok(effective_unit_price(
            product.base_price_cents,
            discount.as_ref(),
            now,
        ))
    }
}
