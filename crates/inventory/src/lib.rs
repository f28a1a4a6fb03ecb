//! `emporium-inventory`: the stock ledger's per-product counter.
//!
//! One `StockRecord` stream per product. The reserve operation is the single
//! check-and-decrement point for sales commitments; releases and receipts are
//! its reversals. Streams are created lazily: a product with no stock events
//! simply has zero on hand.

pub mod stock;

pub use stock::{
    AdjustStock, ReleaseStock, ReserveStock, StockAdjusted, StockCause, StockCommand, StockEvent,
    StockRecord, StockReleased, StockReserved,
};
