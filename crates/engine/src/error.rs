//! Engine-level error taxonomy.

use thiserror::Error;

use emporium_catalog::ProductId;

use crate::dispatcher::DispatchError;

/// One product that could not cover a requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

/// Error surface of the engine's services.
///
/// Recoverable, user-facing outcomes (`InsufficientStock`, `InvalidItem`,
/// `InvalidTransition`) are structured so the caller can report the specific
/// products or edges involved; infrastructure failures stay wrapped.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Demand exceeded stock; every short-falling product is listed.
    #[error("insufficient stock for {0} product(s)", .shortfalls.len())]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    /// A requested order line referenced an unknown or unsellable product.
    #[error("invalid item {product_id}: {reason}")]
    InvalidItem {
        product_id: ProductId,
        reason: String,
    },

    /// Attempted status change that is not a legal lifecycle edge.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("not found")]
    NotFound,

    /// A concurrent writer won; the operation was not applied.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Infrastructure failure in the dispatch pipeline.
    #[error("dispatch failed: {0:?}")]
    Dispatch(DispatchError),
}

impl From<DispatchError> for EngineError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => EngineError::Validation(msg),
            DispatchError::InvariantViolation(msg) => EngineError::Validation(msg),
            DispatchError::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
            DispatchError::NotFound => EngineError::NotFound,
            DispatchError::Concurrency(msg) => EngineError::Conflict(msg),
            // InsufficientStock is converted by the ledger, which still has
            // the product context; everything else stays wrapped.
            other => EngineError::Dispatch(other),
        }
    }
}
