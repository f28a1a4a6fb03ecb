//! `emporium-sales`: the customer sales order aggregate.
//!
//! Orders are created at checkout with price snapshots already frozen into
//! their lines; the status lifecycle (Pending → Confirmed → Cancelled) is the
//! only thing that moves afterwards. Stock effects of a transition are
//! orchestrated by the engine crate, not here.

pub mod order;

pub use order::{
    ChangeStatus, CreateOrder, NewOrderLine, OrderCreated, OrderLine, OrderStatusChanged,
    SalesOrder, SalesOrderCommand, SalesOrderEvent, SalesOrderId, SalesOrderStatus,
};
