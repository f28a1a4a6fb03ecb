//! `emporium-purchasing`: the supplier purchase order aggregate.
//!
//! Purchase orders walk a delivery lifecycle in which `Received` is the only
//! stock-affecting state and `Cancelled` is terminal. The stock effects of
//! entering or leaving `Received` are orchestrated by the engine crate.

pub mod order;

pub use order::{
    ChangeDeliveryStatus, CreatePurchaseOrder, DeliveryStatus, DeliveryStatusChanged,
    NewPurchaseLine, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderCreated,
    PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderLine,
};
