//! Service layer: the operations collaborators call.
//!
//! Each service composes the dispatcher and the read models into one of the
//! engine's contracts. Checkout talks to [`SalesOrderService`], staff status
//! changes go through it and [`ProcurementService`], rule application runs
//! through [`RuleResolver`], and [`DirectoryService`] carries the admin
//! operations that set the stage.

pub mod directory;
pub mod ledger;
pub mod orders;
pub mod pricing;
pub mod procurement;
pub mod resolver;

pub use directory::DirectoryService;
pub use ledger::StockLedger;
pub use orders::{OrderReceipt, SalesOrderService};
pub use pricing::PricingService;
pub use procurement::{ProcurementService, PurchaseOrderReceipt};
pub use resolver::{PreviewLine, RuleApplication, RulePreview, RuleResolver};

/// Outcome of a status-change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was recorded; old and new status for the caller.
    Applied { from: String, to: String },
    /// The order was already in the requested state; nothing was recorded.
    NoChange { status: String },
}
