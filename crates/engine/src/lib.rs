//! `emporium-engine`: infrastructure and orchestration for the
//! inventory-consistency core.
//!
//! The engine supplies everything around the pure domain crates:
//!
//! - the append-only [`event_store`] (which doubles as the audit trail),
//! - the [`dispatcher`] running the load → decide → append → publish pipeline
//!   with optimistic concurrency,
//! - disposable [`projections`] (read models) fed synchronously from the
//!   publish path,
//! - and the [`services`] implementing the operations collaborators call:
//!   stock ledger, checkout and sales transitions, procurement, rule
//!   resolution, pricing, and the admin directory.

pub mod app;
pub mod dispatcher;
pub mod error;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod streams;


pub use app::Emporium;
pub use dispatcher::{CommandDispatcher, DispatchError};
pub use error::{EngineError, Shortfall};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use services::{
    DirectoryService, OrderReceipt, PreviewLine, PricingService, ProcurementService,
    PurchaseOrderReceipt, RuleApplication, RulePreview, RuleResolver, SalesOrderService,
    StockLedger, TransitionOutcome,
};
