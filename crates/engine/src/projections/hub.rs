use std::sync::Arc;

use serde_json::Value as JsonValue;

use emporium_catalog::ProductId;
use emporium_events::EventEnvelope;
use emporium_purchasing::PurchaseOrderId;

use super::catalog::{ProductDirectoryProjection, ProductReadModel};
use super::change_feed::ChangeFeedProjection;
use super::discounts::{DiscountBoardProjection, DiscountReadModel};
use super::stock::{StockLevelsProjection, StockReadModel};
use super::supplier_stats::{PurchaseOrderRecord, SupplierStatsProjection};
use super::ProjectionError;
use crate::read_model::InMemoryReadModelStore;
use crate::streams;

type Shared<K, V> = Arc<InMemoryReadModelStore<K, V>>;

/// All of the engine's read models behind one envelope-routing front.
///
/// The hub applies each published envelope to the projections interested in
/// its stream type. Applied synchronously from the publish path, the read
/// models are consistent with the store the moment a dispatch returns.
#[derive(Debug)]
pub struct ProjectionHub {
    products: ProductDirectoryProjection<Shared<ProductId, ProductReadModel>>,
    stock: StockLevelsProjection<Shared<ProductId, StockReadModel>>,
    discounts: DiscountBoardProjection<Shared<ProductId, DiscountReadModel>>,
    supplier_stats: SupplierStatsProjection<Shared<PurchaseOrderId, PurchaseOrderRecord>>,
    change_feed: ChangeFeedProjection,
}

impl ProjectionHub {
    pub fn new() -> Self {
        Self {
            products: ProductDirectoryProjection::new(Arc::new(InMemoryReadModelStore::new())),
            stock: StockLevelsProjection::new(Arc::new(InMemoryReadModelStore::new())),
            discounts: DiscountBoardProjection::new(Arc::new(InMemoryReadModelStore::new())),
            supplier_stats: SupplierStatsProjection::new(Arc::new(InMemoryReadModelStore::new())),
            change_feed: ChangeFeedProjection::new(),
        }
    }

    pub fn products(&self) -> &ProductDirectoryProjection<Shared<ProductId, ProductReadModel>> {
        &self.products
    }

    pub fn stock(&self) -> &StockLevelsProjection<Shared<ProductId, StockReadModel>> {
        &self.stock
    }

    pub fn discounts(&self) -> &DiscountBoardProjection<Shared<ProductId, DiscountReadModel>> {
        &self.discounts
    }

    pub fn supplier_stats(
        &self,
    ) -> &SupplierStatsProjection<Shared<PurchaseOrderId, PurchaseOrderRecord>> {
        &self.supplier_stats
    }

    pub fn change_feed(&self) -> &ChangeFeedProjection {
        &self.change_feed
    }

    /// Route one published envelope to the interested projections.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            streams::PRODUCT => self.products.apply_envelope(envelope),
            streams::STOCK => {
                self.stock.apply_envelope(envelope)?;
                self.change_feed.apply_stock_envelope(envelope)
            }
            streams::DISCOUNT => {
                self.discounts.apply_envelope(envelope)?;
                self.change_feed.apply_discount_envelope(envelope)
            }
            streams::PURCHASE_ORDER => self.supplier_stats.apply_envelope(envelope),
            // Rules, sales orders and suppliers are served straight from
            // their streams; no read model to maintain.
            _ => Ok(()),
        }
    }
}

impl Default for ProjectionHub {
    fn default() -> Self {
        Self::new()
    }
}
