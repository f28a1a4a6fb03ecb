//! Read-model projections.
//!
//! Projections consume published envelopes and maintain queryable views.
//! They are idempotent for at-least-once delivery: each tracks a per-stream
//! sequence cursor and ignores replays at or below it.

pub mod catalog;
pub mod change_feed;
pub mod cursor;
pub mod discounts;
pub mod hub;
pub mod stock;
pub mod supplier_stats;

use thiserror::Error;

pub use catalog::{ProductDirectoryProjection, ProductReadModel};
pub use change_feed::{ChangeFeedProjection, Notice};
pub use discounts::{DiscountBoardProjection, DiscountReadModel};
pub use hub::ProjectionHub;
pub use stock::{StockLevelsProjection, StockReadModel};
pub use supplier_stats::{PurchaseOrderRecord, SupplierStats, SupplierStatsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("event does not match envelope aggregate: {0}")]
    AggregateMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection storage unavailable: {0}")]
    Storage(String),
}
