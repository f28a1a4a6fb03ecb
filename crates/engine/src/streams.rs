//! Aggregate stream type identifiers.
//!
//! Every stream in the event store is tagged with one of these; the
//! projection hub routes published envelopes on them.

pub const PRODUCT: &str = "catalog.product";
pub const STOCK: &str = "inventory.stock";
pub const DISCOUNT: &str = "pricing.discount";
pub const RULE: &str = "pricing.rule";
pub const SALES_ORDER: &str = "sales.order";
pub const PURCHASE_ORDER: &str = "purchasing.order";
pub const SUPPLIER: &str = "suppliers.supplier";
